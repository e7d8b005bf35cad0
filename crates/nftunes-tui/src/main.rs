mod action;
mod app;
mod app_state;
mod component;
mod components;
mod core;
mod http;
mod mpv;
mod player;
mod theme;
mod widgets;

use tokio::sync::{broadcast, mpsc};

/// What the StoreCore broadcasts to the UI.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// A new snapshot was published; receivers should fetch from StateManager.
    StateUpdated,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = nftunes_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = nftunes_core::platform::log_file();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; default keeps HTTP client internals quiet.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("nftunes log: {}", log_path.display());

    tracing::info!("nftunes starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match nftunes_core::config::Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("config load failed, using defaults: {}", e);
            nftunes_core::config::Config::default()
        }
    };

    // ── Broadcast channel (StoreCore → TUI) ─────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);

    // ── StoreEvent channel (TUI/HTTP → StoreCore) ───────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<core::StoreEvent>(1024);

    let store_core = core::StoreCore::from_config(config.clone(), broadcast_tx.clone(), event_tx.clone());
    let state_manager = store_core.state_manager();

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            state_manager.clone(),
            event_tx.clone(),
        );
    }

    // The broadcast channel only carries deltas, so push one StateUpdated now
    // for the bundled catalog to show up before the first event.
    let _ = broadcast_tx.send(BroadcastMessage::StateUpdated);

    // ── Spawn StoreCore event loop ───────────────────────────────────────────
    let core_handle = tokio::spawn(store_core.run(event_rx));

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(state_manager, event_tx.clone(), log_path);
    let result = app.run(broadcast_rx).await;

    // mpv is a child process; give the core a chance to kill it.
    let _ = event_tx.send(core::StoreEvent::Shutdown).await;
    if let Err(e) = core_handle.await {
        tracing::error!("StoreCore task failed: {}", e);
    }

    tracing::info!("nftunes exiting");
    result
}
