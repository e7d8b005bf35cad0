use crate::core::StoreEvent;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use nftunes_core::projection::{DisplayItem, ViewKind};
use nftunes_core::protocol::Command;
use nftunes_core::purchase::PurchaseState;
use nftunes_core::state::StateManager;
use nftunes_core::track::TrackId;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    state_manager: StateManager,
    event_tx: mpsc::Sender<StoreEvent>,
}

#[derive(Serialize)]
struct ApiState {
    account: Option<String>,
    chain_id: Option<u64>,
    correct_network: bool,
    source: &'static str,
    track_count: usize,
    unlocked_count: usize,
    purchase: PurchaseState,
    now_playing: Option<TrackId>,
    banner: Option<String>,
}

#[derive(Serialize)]
struct ApiView {
    view: &'static str,
    items: Vec<DisplayItem>,
    /// Set when `items` is empty.
    placeholder: Option<&'static str>,
}

#[derive(Deserialize, Default)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub fn router(state_manager: StateManager, event_tx: mpsc::Sender<StoreEvent>) -> Router {
    let app_state = HttpState {
        state_manager,
        event_tx,
    };
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/tracks", get(get_tracks))
        .route("/api/unlocked", get(get_unlocked))
        .route("/api/reconcile", post(reconcile))
        .route("/api/play/:id", post(play_track))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state_manager: StateManager,
    event_tx: mpsc::Sender<StoreEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state_manager, event_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    let snap = state.state_manager.get_state().await;
    Json(ApiState {
        account: snap.session.account.map(|a| a.to_string()),
        chain_id: snap.session.chain_id,
        correct_network: snap.session.is_correct_network(),
        source: snap.source.label(),
        track_count: snap.tracks.len(),
        unlocked_count: snap.unlocked_ids().len(),
        purchase: snap.purchase,
        now_playing: snap.player.current,
        banner: snap.banner,
    })
}

async fn view(state: &HttpState, kind: ViewKind, term: &str) -> ApiView {
    let projection = state.state_manager.get_state().await.project(term);
    ApiView {
        view: kind.title(),
        placeholder: projection.placeholder(kind),
        items: projection.view(kind).to_vec(),
    }
}

async fn get_tracks(
    State(state): State<HttpState>,
    Query(query): Query<SearchQuery>,
) -> Json<ApiView> {
    Json(view(&state, ViewKind::AllSongs, &query.q).await)
}

async fn get_unlocked(
    State(state): State<HttpState>,
    Query(query): Query<SearchQuery>,
) -> Json<ApiView> {
    Json(view(&state, ViewKind::MySongs, &query.q).await)
}

async fn send(state: &HttpState, cmd: Command) -> StatusCode {
    if state.event_tx.send(StoreEvent::Command(cmd)).await.is_err() {
        error!("HTTP API: store core is gone");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::ACCEPTED
}

async fn reconcile(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Reconcile");
    send(&state, Command::Reconcile).await
}

async fn play_track(State(state): State<HttpState>, Path(id): Path<TrackId>) -> StatusCode {
    info!("HTTP API: Play track {}", id);
    let snap = state.state_manager.get_state().await;
    match snap.track(id) {
        None => StatusCode::NOT_FOUND,
        Some(t) if !t.unlocked => StatusCode::FORBIDDEN,
        Some(_) => send(&state, Command::Play { track_id: id }).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftunes_core::catalog::bundled_tracks;
    use nftunes_core::state::StoreSnapshot;
    use serde_json::Value;

    async fn serve() -> (String, mpsc::Receiver<StoreEvent>) {
        let mut tracks = bundled_tracks("audio");
        tracks[3].unlocked = true;
        let state_manager = StateManager::new(StoreSnapshot {
            tracks,
            ..StoreSnapshot::default()
        });
        let (tx, rx) = mpsc::channel(8);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state_manager, tx);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), rx)
    }

    #[tokio::test]
    async fn test_views_follow_the_projection() {
        let (base, _rx) = serve().await;
        let all: Value = reqwest::get(format!("{}/api/tracks?q=swif", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(all["view"], "All Songs");
        assert_eq!(all["items"].as_array().unwrap().len(), 1);
        assert_eq!(all["items"][0]["title"], "Tailor Swif");

        let mine: Value = reqwest::get(format!("{}/api/unlocked?q=zzz", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(mine["items"].as_array().unwrap().is_empty());
        assert_eq!(mine["placeholder"], nftunes_core::projection::NO_UNLOCKED_SONGS);

        let state: Value = reqwest::get(format!("{}/api/state", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(state["track_count"], 8);
        assert_eq!(state["unlocked_count"], 1);
        assert_eq!(state["purchase"]["state"], "idle");
    }

    #[tokio::test]
    async fn test_play_checks_unlock_before_forwarding() {
        let (base, mut rx) = serve().await;
        let client = reqwest::Client::new();

        let locked = client
            .post(format!("{}/api/play/0", base))
            .send()
            .await
            .unwrap();
        assert_eq!(locked.status().as_u16(), 403);
        let missing = client
            .post(format!("{}/api/play/42", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        let ok = client
            .post(format!("{}/api/play/3", base))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status().as_u16(), 202);
        match rx.recv().await {
            Some(StoreEvent::Command(Command::Play { track_id })) => assert_eq!(track_id, 3),
            other => panic!("unexpected {:?}", other),
        }
    }
}
