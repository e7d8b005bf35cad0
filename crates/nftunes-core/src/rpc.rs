//! JSON-RPC implementations of [`WalletProvider`] and [`TrackContract`]
//! against an Ethereum node (the local development node by default).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::abi;
use crate::chain::{Address, ChainError, ChainTrack, TrackContract, TxHash, WalletProvider};
use crate::track::{TrackId, Wei};

/// Thin JSON-RPC 2.0 client.  Cheap to clone.
#[derive(Clone)]
pub struct JsonRpcClient {
    url: String,
    http: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        debug!("rpc → {} id={}", method, id);

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ChainError::Unavailable(self.url.clone())
                } else {
                    ChainError::Transport(e.to_string())
                }
            })?;
        if !resp.status().is_success() {
            return Err(ChainError::Transport(format!("HTTP {}", resp.status())));
        }
        let mut reply: Value = resp
            .json()
            .await
            .map_err(|e| ChainError::Decode(e.to_string()))?;

        if let Some(err) = reply.get("error") {
            let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            debug!("rpc ← {} id={} error {}: {}", method, id, code, message);
            return Err(ChainError::Rpc { code, message });
        }
        match reply.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(ChainError::Decode(format!("{} reply has no result", method))),
        }
    }
}

fn parse_quantity(v: &Value) -> Result<u64, ChainError> {
    let s = v
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex quantity, got {}", v)))?;
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode(format!("quantity without 0x: {}", s)))?;
    u64::from_str_radix(body, 16).map_err(|e| ChainError::Decode(format!("{}: {}", s, e)))
}

fn parse_accounts(v: Value) -> Result<Vec<Address>, ChainError> {
    let list = v
        .as_array()
        .ok_or_else(|| ChainError::Decode("accounts reply is not an array".into()))?;
    list.iter()
        .map(|a| {
            a.as_str()
                .ok_or_else(|| ChainError::Decode("account is not a string".into()))?
                .parse::<Address>()
                .map_err(|e| ChainError::Decode(e.to_string()))
        })
        .collect()
}

// ── Wallet ────────────────────────────────────────────────────────────────────

/// Node-managed accounts standing in for a browser wallet.
pub struct RpcWallet {
    client: JsonRpcClient,
    /// Preferred account, moved to the front of the list when exposed.
    preferred: Option<Address>,
}

impl RpcWallet {
    pub fn new(client: JsonRpcClient, preferred: Option<Address>) -> Self {
        Self { client, preferred }
    }

    fn order(&self, mut accounts: Vec<Address>) -> Vec<Address> {
        if let Some(p) = self.preferred {
            if let Some(pos) = accounts.iter().position(|a| *a == p) {
                let a = accounts.remove(pos);
                accounts.insert(0, a);
            }
        }
        accounts
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ChainError> {
        let accounts = match self.client.request("eth_requestAccounts", json!([])).await {
            Ok(v) => parse_accounts(v)?,
            // Plain nodes don't implement the EIP-1102 method.
            Err(ChainError::Rpc { code: -32601, .. }) => {
                parse_accounts(self.client.request("eth_accounts", json!([])).await?)?
            }
            Err(ChainError::Rpc { code: 4001, message }) => {
                return Err(ChainError::Rejected(message))
            }
            Err(e) => return Err(e),
        };
        if accounts.is_empty() {
            return Err(ChainError::NoAccounts);
        }
        Ok(self.order(accounts))
    }

    async fn list_accounts(&self) -> Result<Vec<Address>, ChainError> {
        let accounts = parse_accounts(self.client.request("eth_accounts", json!([])).await?)?;
        Ok(self.order(accounts))
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        parse_quantity(&self.client.request("eth_chainId", json!([])).await?)
    }
}

// ── Contract ──────────────────────────────────────────────────────────────────

pub struct RpcContract {
    client: JsonRpcClient,
    address: Address,
    receipt_poll: Duration,
}

impl RpcContract {
    pub fn new(client: JsonRpcClient, address: Address, receipt_poll: Duration) -> Self {
        Self {
            client,
            address,
            receipt_poll,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        let params = json!([
            { "to": self.address.to_string(), "data": abi::to_hex_data(&data) },
            "latest"
        ]);
        let result = self.client.request("eth_call", params).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_call result is not a string".into()))?;
        Ok(abi::from_hex_data(hex)?)
    }
}

#[async_trait]
impl TrackContract for RpcContract {
    async fn get_all_tracks(&self) -> Result<Vec<ChainTrack>, ChainError> {
        let data = self.call(abi::encode_get_all_tracks()).await?;
        let tracks = abi::decode_track_array(&data)?;
        info!("contract: getAllTracks returned {} tracks", tracks.len());
        Ok(tracks)
    }

    async fn can_access(&self, track_id: TrackId, account: Address) -> Result<bool, ChainError> {
        let data = self.call(abi::encode_can_access(track_id, &account)).await?;
        Ok(abi::decode_bool(&data)?)
    }

    async fn buy_track(
        &self,
        from: Address,
        track_id: TrackId,
        value: Wei,
    ) -> Result<TxHash, ChainError> {
        let params = json!([{
            "from": from.to_string(),
            "to": self.address.to_string(),
            "data": abi::to_hex_data(&abi::encode_buy_track(track_id)),
            "value": value.to_quantity(),
        }]);
        let result = match self.client.request("eth_sendTransaction", params).await {
            Err(ChainError::Rpc { code: 4001, message }) => {
                return Err(ChainError::Rejected(message))
            }
            other => other?,
        };
        let hash = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("transaction hash is not a string".into()))?;
        info!("contract: buyTrack({}) submitted as {}", track_id, hash);
        Ok(TxHash(hash.to_string()))
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<(), ChainError> {
        loop {
            let receipt = self
                .client
                .request("eth_getTransactionReceipt", json!([tx.0]))
                .await?;
            if !receipt.is_null() {
                let status = receipt.get("status").map(parse_quantity).transpose()?;
                return match status {
                    Some(1) => {
                        info!("contract: {} confirmed", tx);
                        Ok(())
                    }
                    other => {
                        warn!("contract: {} failed with status {:?}", tx, other);
                        Err(ChainError::Reverted(tx.clone()))
                    }
                };
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x7a69")).unwrap(), 31337);
        assert!(parse_quantity(&json!("7a69")).is_err());
        assert!(parse_quantity(&json!(5)).is_err());
    }

    #[test]
    fn test_parse_accounts() {
        let v = json!(["0x00000000000000000000000000000000000000a1"]);
        let accounts = parse_accounts(v).unwrap();
        assert_eq!(accounts.len(), 1);
        assert!(parse_accounts(json!("nope")).is_err());
    }

    #[test]
    fn test_preferred_account_moves_first() {
        let a: Address = "0x00000000000000000000000000000000000000a1".parse().unwrap();
        let b: Address = "0x00000000000000000000000000000000000000b2".parse().unwrap();
        let wallet = RpcWallet::new(JsonRpcClient::new("http://127.0.0.1:1"), Some(b));
        assert_eq!(wallet.order(vec![a, b]), vec![b, a]);
        assert_eq!(wallet.order(vec![a]), vec![a]);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_unavailable() {
        let client = JsonRpcClient::new("http://127.0.0.1:1");
        let err = client.request("eth_chainId", json!([])).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Unavailable(_) | ChainError::Transport(_)
        ));
    }
}
