//! Drives the JSON-RPC wallet and contract clients against a small fake node
//! served by axum on an ephemeral port.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use nftunes_core::abi::{self, SEL_BUY_TRACK, SEL_CAN_ACCESS, SEL_GET_ALL_TRACKS};
use nftunes_core::catalog::{load_snapshot, CatalogSource, CatalogStore};
use nftunes_core::chain::{Address, ChainError, ChainTrack, TrackContract, WalletProvider};
use nftunes_core::reconcile::{self, FallbackPolicy};
use nftunes_core::rpc::{JsonRpcClient, RpcContract, RpcWallet};
use nftunes_core::track::Wei;

const ACCOUNT_A: &str = "0x00000000000000000000000000000000000000a1";
const ACCOUNT_B: &str = "0x00000000000000000000000000000000000000b2";
const CONTRACT: &str = "0x5095d3313c76e8d29163e40a0223a5816a8037d8";

#[derive(Default)]
struct FakeNode {
    tracks: Vec<ChainTrack>,
    granted: Mutex<HashSet<u64>>,
    /// Reply to eth_requestAccounts with "method not found".
    no_request_accounts: bool,
    /// Reply to eth_sendTransaction with a 4001 user rejection.
    reject_sends: bool,
    receipt_status: &'static str,
    sent: Mutex<Vec<Value>>,
    receipt_polls: Mutex<u32>,
}

fn ok(id: &Value, result: Value) -> Json<Value> {
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn err(id: &Value, code: i64, message: &str) -> Json<Value> {
    Json(json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } }))
}

fn word_to_u64(word: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..32]);
    u64::from_be_bytes(buf)
}

async fn handle(State(node): State<Arc<FakeNode>>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let params = req["params"].clone();
    match req["method"].as_str().unwrap_or_default() {
        "eth_requestAccounts" if node.no_request_accounts => err(&id, -32601, "method not found"),
        "eth_requestAccounts" | "eth_accounts" => ok(&id, json!([ACCOUNT_A, ACCOUNT_B])),
        "eth_chainId" => ok(&id, json!("0x7a69")),
        "eth_call" => {
            assert_eq!(params[0]["to"], CONTRACT);
            assert_eq!(params[1], "latest");
            let data = abi::from_hex_data(params[0]["data"].as_str().unwrap()).unwrap();
            let sel: [u8; 4] = data[..4].try_into().unwrap();
            if sel == SEL_GET_ALL_TRACKS {
                ok(&id, json!(abi::to_hex_data(&abi::encode_track_array(&node.tracks))))
            } else if sel == SEL_CAN_ACCESS {
                let track = word_to_u64(&data[4..36]);
                let granted = node.granted.lock().unwrap().contains(&track);
                ok(&id, json!(abi::to_hex_data(&abi::encode_bool(granted))))
            } else {
                err(&id, -32000, "execution reverted")
            }
        }
        "eth_sendTransaction" => {
            if node.reject_sends {
                return err(&id, 4001, "User denied transaction signature.");
            }
            let tx = params[0].clone();
            let data = abi::from_hex_data(tx["data"].as_str().unwrap()).unwrap();
            assert_eq!(&data[..4], &SEL_BUY_TRACK);
            node.granted.lock().unwrap().insert(word_to_u64(&data[4..36]));
            node.sent.lock().unwrap().push(tx);
            ok(&id, json!(format!("0x{}", "ab".repeat(32))))
        }
        "eth_getTransactionReceipt" => {
            let mut polls = node.receipt_polls.lock().unwrap();
            *polls += 1;
            if *polls < 2 {
                ok(&id, Value::Null)
            } else {
                ok(&id, json!({ "status": node.receipt_status }))
            }
        }
        _ => err(&id, -32601, "method not found"),
    }
}

async fn spawn_node(node: FakeNode) -> (String, Arc<FakeNode>) {
    let node = Arc::new(node);
    let app = Router::new()
        .route("/", post(handle))
        .with_state(Arc::clone(&node));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), node)
}

fn chain_tracks() -> Vec<ChainTrack> {
    let artist: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
    vec![
        ChainTrack {
            name: "Not Like Us".into(),
            audio_cid: "QmNotLikeUs".into(),
            price: Wei(10_000_000_000_000_000),
            artist,
        },
        ChainTrack {
            name: "Night Drive".into(),
            audio_cid: "QmNightDrive".into(),
            price: Wei(5_000_000_000_000_000),
            artist,
        },
    ]
}

fn contract(url: &str) -> RpcContract {
    RpcContract::new(
        JsonRpcClient::new(url),
        CONTRACT.parse().unwrap(),
        Duration::from_millis(10),
    )
}

#[tokio::test]
async fn wallet_falls_back_to_eth_accounts_and_orders_preferred() {
    let (url, _node) = spawn_node(FakeNode {
        no_request_accounts: true,
        ..FakeNode::default()
    })
    .await;
    let wallet = RpcWallet::new(JsonRpcClient::new(&url), Some(ACCOUNT_B.parse().unwrap()));

    let accounts = wallet.request_accounts().await.unwrap();
    assert_eq!(accounts[0].to_string(), ACCOUNT_B);
    assert_eq!(accounts.len(), 2);
    assert_eq!(wallet.chain_id().await.unwrap(), 31337);
}

#[tokio::test]
async fn catalog_loads_from_contract_and_reconciles() {
    let node = FakeNode {
        tracks: chain_tracks(),
        ..FakeNode::default()
    };
    node.granted.lock().unwrap().insert(1);
    let (url, _node) = spawn_node(node).await;
    let c = contract(&url);

    let snapshot = load_snapshot(Some(&c as &dyn TrackContract), true, "audio").await;
    assert_eq!(snapshot.source, CatalogSource::Chain);
    assert_eq!(snapshot.tracks.len(), 2);
    assert_eq!(snapshot.tracks[1].audio_src, "audio/QmNightDrive");
    assert_eq!(snapshot.tracks[1].artist, "0x1111...1111");

    let mut store = CatalogStore::new(snapshot);
    let outcome = reconcile::reconcile(
        &store.ids(),
        Some(ACCOUNT_A.parse().unwrap()),
        Some(&c as &dyn TrackContract),
        true,
        &FallbackPolicy::disabled(),
        1,
    )
    .await
    .unwrap();
    reconcile::apply(&mut store, &outcome);
    let mine = store.unlocked_view();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title, "Night Drive");
}

#[tokio::test]
async fn purchase_sends_exact_price_and_waits_for_receipt() {
    let (url, node) = spawn_node(FakeNode {
        tracks: chain_tracks(),
        receipt_status: "0x1",
        ..FakeNode::default()
    })
    .await;
    let c = contract(&url);
    let from: Address = ACCOUNT_A.parse().unwrap();

    let tx = c.buy_track(from, 0, Wei(10_000_000_000_000_000)).await.unwrap();
    c.wait_for_receipt(&tx).await.unwrap();

    let sent = node.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["value"], "0x2386f26fc10000");
    assert_eq!(sent[0]["from"], ACCOUNT_A);
    assert!(c.can_access(0, from).await.unwrap());
    assert!(*node.receipt_polls.lock().unwrap() >= 2);
}

#[tokio::test]
async fn reverted_receipt_is_an_error() {
    let (url, _node) = spawn_node(FakeNode {
        receipt_status: "0x0",
        ..FakeNode::default()
    })
    .await;
    let c = contract(&url);
    let tx = c
        .buy_track(ACCOUNT_A.parse().unwrap(), 3, Wei(1))
        .await
        .unwrap();
    assert!(matches!(
        c.wait_for_receipt(&tx).await,
        Err(ChainError::Reverted(_))
    ));
}

#[tokio::test]
async fn user_rejection_is_reported_as_rejected() {
    let (url, node) = spawn_node(FakeNode {
        reject_sends: true,
        ..FakeNode::default()
    })
    .await;
    let err = contract(&url)
        .buy_track(ACCOUNT_A.parse().unwrap(), 0, Wei(1))
        .await
        .unwrap_err();
    assert!(err.is_user_rejection());
    assert!(node.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_contract_falls_back_to_bundled() {
    let (url, _node) = spawn_node(FakeNode::default()).await;
    let c = contract(&url);
    let snapshot = load_snapshot(Some(&c as &dyn TrackContract), true, "audio").await;
    assert_eq!(snapshot.source, CatalogSource::Bundled);
    assert_eq!(snapshot.tracks.len(), 8);
}
