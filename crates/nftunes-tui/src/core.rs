//! StoreCore: single-owner event loop for all mutable storefront state.
//!
//! The catalog, the wallet session, the purchase flow and the player are
//! owned here and nowhere else.  Wallet and contract calls run in spawned
//! tasks that report back as `StoreEvent`s tagged with the session epoch (or
//! a per-kind counter) so results of superseded work are dropped.
//!
//! After each event the core publishes a `StoreSnapshot` through the
//! `StateManager` and broadcasts `BroadcastMessage::StateUpdated`.
use std::path::PathBuf;
use std::sync::Arc;

use nftunes_core::catalog::{load_snapshot, CatalogSnapshot, CatalogStore};
use nftunes_core::chain::{
    spawn_wallet_watcher, Address, ChainError, TrackContract, TxHash, WalletEvent, WalletProvider,
};
use nftunes_core::config::Config;
use nftunes_core::playback::{next_in, prev_in, PlayerState, PlayerStatus};
use nftunes_core::prefs::Preferences;
use nftunes_core::protocol::Command;
use nftunes_core::purchase::{PendingPurchase, PurchaseFlow};
use nftunes_core::reconcile::{self, fallback_outcome, ReconcileGuard, ReconcileOutcome};
use nftunes_core::rpc::{JsonRpcClient, RpcContract, RpcWallet};
use nftunes_core::session::Session;
use nftunes_core::state::{StateManager, StoreSnapshot};
use nftunes_core::track::TrackId;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::mpv::{MpvEvent, OBS_CORE_IDLE, OBS_DURATION, OBS_PAUSE, OBS_TIME_POS};
use crate::player::{MediaBackend, MediaError, MediaSession};
use crate::BroadcastMessage;

// ── StoreEvent ────────────────────────────────────────────────────────────────

/// All inputs into the StoreCore loop.
#[derive(Debug)]
pub enum StoreEvent {
    /// A command from the TUI or HTTP API.
    Command(Command),
    /// Account or chain change reported by the wallet watcher.
    Wallet(WalletEvent),
    /// Result of a connect attempt.  `interactive` attempts surface errors.
    Connected {
        interactive: bool,
        result: Result<(Vec<Address>, u64), String>,
    },
    CatalogLoaded {
        token: u64,
        snapshot: CatalogSnapshot,
    },
    ReconcileFinished {
        pass: u64,
        epoch: u64,
        outcome: Option<ReconcileOutcome>,
    },
    PurchaseSubmitted {
        epoch: u64,
        track_id: TrackId,
        tx: TxHash,
    },
    PurchaseSettled {
        epoch: u64,
        track_id: TrackId,
    },
    PurchaseFailed {
        epoch: u64,
        track_id: TrackId,
        reason: String,
    },
    /// Close a settled purchase modal after the configured delay.
    PurchaseAutoClose { track_id: TrackId },
    /// Raw mpv event (forwarded from the media session).
    Media(MpvEvent),
    /// The loading indicator for play request `token` ran out.
    LoadingTimeout { token: u64 },
    Shutdown,
}

/// Banner text for a failed connect.
fn connect_error_message(e: &ChainError, rpc_url: &str) -> String {
    if e.is_user_rejection() {
        return "Wallet connection was rejected.".to_string();
    }
    match e {
        ChainError::Unavailable(_) | ChainError::Transport(_) => {
            format!("No wallet provider available at {}.", rpc_url)
        }
        ChainError::NoAccounts => "No accounts available.".to_string(),
        other => format!("Error connecting to wallet: {}", other),
    }
}

fn purchase_error_message(e: &ChainError) -> String {
    if e.is_user_rejection() {
        "Transaction rejected in wallet.".to_string()
    } else {
        e.to_string()
    }
}

// ── StoreCore ─────────────────────────────────────────────────────────────────

pub struct StoreCore {
    config: Config,
    state_manager: StateManager,
    wallet: Arc<dyn WalletProvider>,
    contract: Option<Arc<dyn TrackContract>>,
    media: Box<dyn MediaBackend>,
    event_tx: mpsc::Sender<StoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,

    session: Session,
    catalog: CatalogStore,
    purchase: PurchaseFlow,
    player: PlayerState,
    banner: Option<String>,
    connecting: bool,
    prefs: Preferences,
    prefs_path: PathBuf,

    guard: ReconcileGuard,
    /// Bumped for every pass started and every abort; stale results are dropped.
    reconcile_pass: u64,
    catalog_load: u64,
    loading_token: u64,

    watcher: Option<JoinHandle<()>>,
    catalog_task: Option<AbortHandle>,
    reconcile_task: Option<AbortHandle>,
    purchase_task: Option<AbortHandle>,

    /// Last values pushed by mpv property observation.
    obs_pause: Option<bool>,
    obs_core_idle: Option<bool>,
}

impl StoreCore {
    pub fn new(
        config: Config,
        wallet: Arc<dyn WalletProvider>,
        contract: Option<Arc<dyn TrackContract>>,
        media: Box<dyn MediaBackend>,
        prefs_path: PathBuf,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<StoreEvent>,
    ) -> Self {
        let mut prefs = Preferences::load_from(&prefs_path);
        if !prefs_path.exists() {
            prefs.volume = config.player.default_volume.min(100);
        }
        let session = Session::new(config.chain.chain_id);
        let catalog = CatalogStore::new(CatalogSnapshot::bundled(&config.catalog.audio_base));
        let player = PlayerState::with_volume(prefs.volume);

        let state_manager = StateManager::new(StoreSnapshot {
            session: session.clone(),
            source: catalog.source(),
            tracks: catalog.tracks().to_vec(),
            player: player.clone(),
            theme: prefs.theme,
            ..StoreSnapshot::default()
        });

        Self {
            config,
            state_manager,
            wallet,
            contract,
            media,
            event_tx,
            broadcast_tx,
            session,
            catalog,
            purchase: PurchaseFlow::new(),
            player,
            banner: None,
            connecting: false,
            prefs,
            prefs_path,
            guard: ReconcileGuard::default(),
            reconcile_pass: 0,
            catalog_load: 0,
            loading_token: 0,
            watcher: None,
            catalog_task: None,
            reconcile_task: None,
            purchase_task: None,
            obs_pause: None,
            obs_core_idle: None,
        }
    }

    /// Wire the JSON-RPC wallet and contract and the mpv media session.
    pub fn from_config(
        config: Config,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<StoreEvent>,
    ) -> Self {
        let client = JsonRpcClient::new(config.chain.rpc_url.clone());
        let wallet: Arc<dyn WalletProvider> = Arc::new(RpcWallet::new(
            client.clone(),
            config.chain.preferred_account(),
        ));
        let contract: Option<Arc<dyn TrackContract>> = match config.chain.contract_address() {
            Ok(address) => Some(Arc::new(RpcContract::new(
                client,
                address,
                config.chain.receipt_poll(),
            ))),
            Err(e) => {
                warn!("StoreCore: contract disabled: {}", e);
                None
            }
        };
        let prefs_path = Preferences::default_path();
        let volume = Preferences::load_from(&prefs_path).volume;
        let media = Box::new(MediaSession::new(volume, event_tx.clone()));
        Self::new(
            config,
            wallet,
            contract,
            media,
            prefs_path,
            broadcast_tx,
            event_tx,
        )
    }

    pub fn state_manager(&self) -> StateManager {
        self.state_manager.clone()
    }

    /// Run the event loop until `Shutdown` or until every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<StoreEvent>) {
        info!("StoreCore: starting event loop");
        self.start();
        self.publish().await;

        loop {
            match event_rx.recv().await {
                None => {
                    info!("StoreCore: event channel closed, shutting down");
                    break;
                }
                Some(StoreEvent::Shutdown) => {
                    info!("StoreCore: shutdown requested");
                    break;
                }
                Some(evt) => {
                    self.handle_event(evt).await;
                    self.publish().await;
                }
            }
        }

        self.cleanup().await;
    }

    fn start(&mut self) {
        let (wallet_tx, mut wallet_rx) = mpsc::channel::<WalletEvent>(16);
        self.watcher = Some(spawn_wallet_watcher(
            Arc::clone(&self.wallet),
            self.config.chain.watch_interval(),
            wallet_tx,
        ));
        let forward = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = wallet_rx.recv().await {
                if forward.send(StoreEvent::Wallet(evt)).await.is_err() {
                    break;
                }
            }
        });

        // reuse an already-authorized account without prompting
        self.spawn_connect(false);
        self.request_reconcile();
    }

    async fn cleanup(&mut self) {
        if let Some(w) = self.watcher.take() {
            w.abort();
        }
        self.abort_catalog();
        self.abort_reconcile();
        self.abort_purchase();
        self.media.shutdown().await;
    }

    async fn publish(&mut self) {
        let snapshot = StoreSnapshot {
            rev: 0,
            session: self.session.clone(),
            source: self.catalog.source(),
            tracks: self.catalog.tracks().to_vec(),
            purchase: self.purchase.state().clone(),
            player: self.player.clone(),
            banner: self.banner.clone(),
            connecting: self.connecting,
            reconciling: self.guard.is_running(),
            theme: self.prefs.theme,
        };
        self.state_manager.publish(snapshot).await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    async fn handle_event(&mut self, evt: StoreEvent) {
        match evt {
            StoreEvent::Command(cmd) => {
                info!("StoreCore: command {:?}", cmd);
                self.handle_command(cmd).await;
            }

            StoreEvent::Wallet(WalletEvent::AccountsChanged(accounts)) => {
                self.on_account(accounts.first().copied()).await;
            }

            StoreEvent::Wallet(WalletEvent::ChainChanged(id)) => {
                self.on_chain(id).await;
            }

            StoreEvent::Connected {
                interactive,
                result,
            } => {
                self.connecting = false;
                match result {
                    Ok((accounts, chain_id)) => {
                        info!(
                            "StoreCore: wallet reports {} account(s) on chain {}",
                            accounts.len(),
                            chain_id
                        );
                        self.on_chain(chain_id).await;
                        self.on_account(accounts.first().copied()).await;
                        if interactive {
                            self.banner = None;
                        }
                    }
                    Err(msg) if interactive => {
                        warn!("StoreCore: connect failed: {}", msg);
                        self.banner = Some(msg);
                    }
                    Err(msg) => debug!("StoreCore: silent connect failed: {}", msg),
                }
            }

            StoreEvent::CatalogLoaded { token, snapshot } => {
                if token != self.catalog_load {
                    debug!("StoreCore: dropping stale catalog load {}", token);
                    return;
                }
                self.catalog_task = None;
                info!(
                    "StoreCore: catalog replaced ({} tracks, {})",
                    snapshot.tracks.len(),
                    snapshot.source.label()
                );
                self.catalog.replace(snapshot);
                self.abort_reconcile();
                self.stop_if_locked().await;
                self.request_reconcile();
            }

            StoreEvent::ReconcileFinished {
                pass,
                epoch,
                outcome,
            } => {
                if pass != self.reconcile_pass {
                    debug!("StoreCore: dropping stale reconcile pass {}", pass);
                    return;
                }
                self.reconcile_task = None;
                if epoch == self.session.epoch {
                    if let Some(outcome) = outcome {
                        reconcile::apply(&mut self.catalog, &outcome);
                        self.stop_if_locked().await;
                    }
                } else {
                    debug!("StoreCore: reconcile result from epoch {} dropped", epoch);
                }
                if self.guard.finish() {
                    self.start_reconcile_pass();
                }
            }

            StoreEvent::PurchaseSubmitted {
                epoch,
                track_id,
                tx,
            } => {
                if self.purchase_matches(epoch, track_id) {
                    info!("StoreCore: purchase of {} submitted as {}", track_id, tx);
                    if let Err(e) = self.purchase.submitted(tx) {
                        warn!("StoreCore: {}", e);
                    }
                }
            }

            StoreEvent::PurchaseSettled { epoch, track_id } => {
                if !self.purchase_matches(epoch, track_id) {
                    return;
                }
                self.purchase_task = None;
                match self.purchase.settle(&mut self.catalog) {
                    Ok(id) => {
                        // a pass already in flight read access before the
                        // purchase was mined; drop it and ask again
                        self.abort_reconcile();
                        self.request_reconcile();
                        let delay = self.config.purchase.settle_close_delay();
                        let tx = self.event_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = tx.send(StoreEvent::PurchaseAutoClose { track_id: id }).await;
                        });
                    }
                    Err(e) => warn!("StoreCore: settle: {}", e),
                }
            }

            StoreEvent::PurchaseFailed {
                epoch,
                track_id,
                reason,
            } => {
                if !self.purchase_matches(epoch, track_id) {
                    return;
                }
                self.purchase_task = None;
                let unlock_anyway = self.config.test_mode.unlock_failed_purchases();
                match self
                    .purchase
                    .fail(reason.clone(), &mut self.catalog, unlock_anyway)
                {
                    Ok(()) => self.banner = Some(format!("Purchase failed: {}", reason)),
                    Err(e) => warn!("StoreCore: fail: {}", e),
                }
            }

            StoreEvent::PurchaseAutoClose { track_id } => {
                if self.purchase.dismiss_settled(track_id) {
                    debug!("StoreCore: purchase modal for {} closed", track_id);
                }
            }

            StoreEvent::Media(evt) => self.handle_media_event(evt).await,

            StoreEvent::LoadingTimeout { token } => {
                if token == self.loading_token && self.player.status == PlayerStatus::Loading {
                    info!("StoreCore: no playback confirmation, showing paused");
                    self.player.status = PlayerStatus::Paused;
                }
            }

            StoreEvent::Shutdown => {}
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::ConnectWallet => {
                if self.connecting {
                    return;
                }
                self.connecting = true;
                self.spawn_connect(true);
            }
            Command::Reconcile => self.request_reconcile(),
            Command::Reload => {
                let chain_id = self.session.chain_id;
                self.full_reload(chain_id).await;
            }

            Command::RequestPurchase { track_id } => {
                let Some(track) = self.catalog.get(track_id) else {
                    self.banner = Some(format!("Unknown track {}.", track_id));
                    return;
                };
                if let Err(e) = self.purchase.request(track, &self.session) {
                    self.banner = Some(e.to_string());
                }
            }
            Command::ConfirmPurchase => match self.purchase.confirm(&self.session) {
                Ok(pending) => self.spawn_purchase(pending),
                Err(e) => self.banner = Some(e.to_string()),
            },
            Command::CancelPurchase => {
                if let Err(e) = self.purchase.cancel() {
                    debug!("StoreCore: cancel ignored: {}", e);
                }
            }

            Command::Play { track_id } => self.play(track_id).await,
            Command::TogglePause => self.toggle_pause().await,
            Command::Next => {
                let ids = self.catalog.unlocked_ids();
                if let Some(id) = next_in(&ids, self.player.current) {
                    self.play(id).await;
                }
            }
            Command::Prev => {
                let ids = self.catalog.unlocked_ids();
                if let Some(id) = prev_in(&ids, self.player.current) {
                    self.play(id).await;
                }
            }
            Command::SeekRelative { seconds } => {
                if self.player.current.is_some() {
                    if let Err(e) = self.media.seek_relative(seconds).await {
                        warn!("StoreCore: seek failed: {}", e);
                    }
                }
            }
            Command::SeekPercent { percent } => {
                if self.player.current.is_some() {
                    if let Err(e) = self.media.seek_percent(percent).await {
                        warn!("StoreCore: seek failed: {}", e);
                    }
                }
            }
            Command::Volume { value } => self.set_volume(value).await,
            Command::VolumeDelta { delta } => {
                let value = self.player.volume as i32 + delta;
                self.set_volume(value).await;
            }
            Command::ClosePlayer => self.close_player().await,

            Command::DismissBanner => self.banner = None,
            Command::ToggleTheme => {
                self.prefs.theme = self.prefs.theme.toggle();
                info!("StoreCore: theme now {}", self.prefs.theme.label());
                self.save_prefs();
            }
        }
    }

    // ── session ───────────────────────────────────────────────────────────────

    fn spawn_connect(&self, interactive: bool) {
        let wallet = Arc::clone(&self.wallet);
        let tx = self.event_tx.clone();
        let rpc_url = self.config.chain.rpc_url.clone();
        tokio::spawn(async move {
            let result = async {
                let accounts = if interactive {
                    wallet.request_accounts().await?
                } else {
                    wallet.list_accounts().await?
                };
                let chain_id = wallet.chain_id().await?;
                Ok::<_, ChainError>((accounts, chain_id))
            }
            .await
            .map_err(|e| connect_error_message(&e, &rpc_url));
            let _ = tx
                .send(StoreEvent::Connected {
                    interactive,
                    result,
                })
                .await;
        });
    }

    async fn on_account(&mut self, account: Option<Address>) {
        if !self.session.set_account(account) {
            return;
        }
        match account {
            Some(a) => info!("StoreCore: account now {}", a.short()),
            None => info!("StoreCore: wallet disconnected"),
        }
        self.catalog.clear_unlocked();
        self.abort_purchase();
        self.purchase.reset();
        self.abort_reconcile();
        self.stop_if_locked().await;
        self.request_reconcile();
    }

    async fn on_chain(&mut self, chain_id: u64) {
        match self.session.chain_id {
            Some(prev) if prev == chain_id => {}
            Some(prev) => {
                warn!("StoreCore: chain changed {} → {}, reloading", prev, chain_id);
                self.full_reload(Some(chain_id)).await;
            }
            None => {
                self.session.set_chain_id(Some(chain_id));
                if !self.session.is_correct_network() {
                    warn!(
                        "StoreCore: wallet on chain {}, expected {}",
                        chain_id, self.session.expected_chain_id
                    );
                }
                self.load_catalog();
            }
        }
    }

    /// Forget everything account-relative and start over.
    async fn full_reload(&mut self, chain_id: Option<u64>) {
        self.abort_catalog();
        self.abort_reconcile();
        self.abort_purchase();
        self.purchase.reset();
        self.catalog.clear_unlocked();
        self.stop_player().await;
        self.session.reset();
        self.session.set_chain_id(chain_id);
        self.spawn_connect(false);
        self.load_catalog();
    }

    // ── catalog + reconcile ───────────────────────────────────────────────────

    fn load_catalog(&mut self) {
        self.abort_catalog();
        self.catalog_load += 1;
        let token = self.catalog_load;
        let contract = self.contract.clone();
        let network_ok = self.session.is_correct_network();
        let audio_base = self.config.catalog.audio_base.clone();
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            let snapshot = load_snapshot(contract.as_deref(), network_ok, &audio_base).await;
            let _ = tx.send(StoreEvent::CatalogLoaded { token, snapshot }).await;
        });
        self.catalog_task = Some(task.abort_handle());
    }

    fn can_reconcile(&self) -> bool {
        self.session.account.is_some()
            && self.contract.is_some()
            && self.session.is_correct_network()
    }

    fn request_reconcile(&mut self) {
        if !self.can_reconcile() {
            let policy = self.config.test_mode.fallback_policy();
            if let Some(outcome) = fallback_outcome(&self.catalog.ids(), &policy, self.session.epoch)
            {
                info!("StoreCore: test mode unlocks {:?}", outcome.unlocked);
                reconcile::apply(&mut self.catalog, &outcome);
            }
            return;
        }
        if self.guard.begin() {
            self.start_reconcile_pass();
        } else {
            debug!("StoreCore: reconcile already running, queued");
        }
    }

    /// Start a pass.  The guard is already held.
    fn start_reconcile_pass(&mut self) {
        let (Some(account), Some(contract)) = (self.session.account, self.contract.clone()) else {
            self.guard.reset();
            return;
        };
        self.reconcile_pass += 1;
        let pass = self.reconcile_pass;
        let epoch = self.session.epoch;
        let ids = self.catalog.ids();
        let network_ok = self.session.is_correct_network();
        let policy = self.config.test_mode.fallback_policy();
        let tx = self.event_tx.clone();
        debug!("StoreCore: reconcile pass {} over {} tracks", pass, ids.len());
        let task = tokio::spawn(async move {
            let outcome = reconcile::reconcile(
                &ids,
                Some(account),
                Some(contract.as_ref()),
                network_ok,
                &policy,
                epoch,
            )
            .await;
            let _ = tx
                .send(StoreEvent::ReconcileFinished {
                    pass,
                    epoch,
                    outcome,
                })
                .await;
        });
        self.reconcile_task = Some(task.abort_handle());
    }

    fn abort_catalog(&mut self) {
        if let Some(h) = self.catalog_task.take() {
            h.abort();
        }
    }

    fn abort_reconcile(&mut self) {
        if let Some(h) = self.reconcile_task.take() {
            h.abort();
        }
        self.guard.reset();
        self.reconcile_pass += 1;
    }

    // ── purchase ──────────────────────────────────────────────────────────────

    fn purchase_matches(&self, epoch: u64, track_id: TrackId) -> bool {
        epoch == self.session.epoch
            && self.purchase.state().pending().map(|p| p.track_id) == Some(track_id)
    }

    fn spawn_purchase(&mut self, pending: PendingPurchase) {
        let epoch = self.session.epoch;
        let track_id = pending.track_id;
        let (Some(account), Some(contract)) = (self.session.account, self.contract.clone()) else {
            let reason = "No contract configured.".to_string();
            if self.purchase.fail(reason.clone(), &mut self.catalog, false).is_ok() {
                self.banner = Some(format!("Purchase failed: {}", reason));
            }
            return;
        };
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            let hash = match contract.buy_track(account, track_id, pending.price).await {
                Ok(hash) => hash,
                Err(e) => {
                    let reason = purchase_error_message(&e);
                    let _ = tx
                        .send(StoreEvent::PurchaseFailed {
                            epoch,
                            track_id,
                            reason,
                        })
                        .await;
                    return;
                }
            };
            let _ = tx
                .send(StoreEvent::PurchaseSubmitted {
                    epoch,
                    track_id,
                    tx: hash.clone(),
                })
                .await;
            let evt = match contract.wait_for_receipt(&hash).await {
                Ok(()) => StoreEvent::PurchaseSettled { epoch, track_id },
                Err(e) => StoreEvent::PurchaseFailed {
                    epoch,
                    track_id,
                    reason: purchase_error_message(&e),
                },
            };
            let _ = tx.send(evt).await;
        });
        self.purchase_task = Some(task.abort_handle());
    }

    fn abort_purchase(&mut self) {
        if let Some(h) = self.purchase_task.take() {
            h.abort();
        }
    }

    // ── player ────────────────────────────────────────────────────────────────

    async fn play(&mut self, track_id: TrackId) {
        let Some(track) = self.catalog.get(track_id) else {
            self.banner = Some(format!("Unknown track {}.", track_id));
            return;
        };
        if !track.unlocked {
            self.banner = Some(format!("\"{}\" is locked. Unlock it to listen.", track.title));
            return;
        }
        let path = track.audio_src.clone();
        info!("StoreCore: playing \"{}\" from {}", track.title, path);

        self.player.start(track_id);
        self.obs_core_idle = None;
        self.obs_pause = Some(false);
        self.loading_token += 1;
        let token = self.loading_token;
        let timeout = self.config.player.loading_timeout();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(StoreEvent::LoadingTimeout { token }).await;
        });

        if let Err(e) = self.media.subscribe().await {
            self.media_failed(e);
            return;
        }
        if let Err(e) = self.media.load(&path, self.player.volume).await {
            self.media_failed(e);
        }
    }

    fn media_failed(&mut self, e: MediaError) {
        error!("StoreCore: media error: {}", e);
        self.player.status = PlayerStatus::Error(e.to_string());
        self.banner = Some(format!("Error playing audio: {}", e));
    }

    async fn toggle_pause(&mut self) {
        let Some(current) = self.player.current else {
            return;
        };
        let pause = match self.player.status {
            PlayerStatus::Paused => false,
            PlayerStatus::Error(_) | PlayerStatus::Idle => {
                self.play(current).await;
                return;
            }
            PlayerStatus::Playing | PlayerStatus::Loading => true,
        };
        if !self.player.visible {
            if let Err(e) = self.media.subscribe().await {
                self.media_failed(e);
                return;
            }
        }
        match self.media.set_pause(pause).await {
            Ok(()) => {
                self.obs_pause = Some(pause);
                self.player.status = if pause {
                    PlayerStatus::Paused
                } else {
                    PlayerStatus::Playing
                };
                self.player.visible = true;
            }
            Err(e) => self.media_failed(e),
        }
    }

    async fn set_volume(&mut self, value: i32) {
        let volume = self.player.set_volume(value);
        if let Err(e) = self.media.set_volume(volume).await {
            warn!("StoreCore: set volume failed: {}", e);
        }
        if self.prefs.volume != volume {
            self.prefs.volume = volume;
            self.save_prefs();
        }
    }

    /// Hide the popup and pause; the track stays selected.
    async fn close_player(&mut self) {
        if self.player.current.is_some() && self.player.status != PlayerStatus::Paused {
            if let Err(e) = self.media.set_pause(true).await {
                warn!("StoreCore: pause on close failed: {}", e);
            }
            self.player.status = PlayerStatus::Paused;
        }
        if let Err(e) = self.media.unsubscribe().await {
            warn!("StoreCore: unsubscribe failed: {}", e);
        }
        self.player.visible = false;
    }

    async fn stop_player(&mut self) {
        if self.player.current.is_none() {
            return;
        }
        if let Err(e) = self.media.set_pause(true).await {
            warn!("StoreCore: pause on stop failed: {}", e);
        }
        if let Err(e) = self.media.unsubscribe().await {
            warn!("StoreCore: unsubscribe failed: {}", e);
        }
        self.player.stop();
        self.loading_token += 1;
    }

    /// Stop playback if the current track is no longer playable.
    async fn stop_if_locked(&mut self) {
        let Some(current) = self.player.current else {
            return;
        };
        let playable = self.catalog.get(current).is_some_and(|t| t.unlocked);
        if !playable {
            info!("StoreCore: track {} no longer unlocked, stopping", current);
            self.stop_player().await;
        }
    }

    async fn handle_media_event(&mut self, evt: MpvEvent) {
        if self.player.current.is_none() {
            return;
        }

        if let Some((obs_id, data)) = evt.as_property_change() {
            match obs_id {
                OBS_PAUSE => {
                    self.obs_pause = data.as_bool();
                    self.derive_status();
                }
                OBS_CORE_IDLE => {
                    self.obs_core_idle = data.as_bool();
                    self.derive_status();
                }
                OBS_TIME_POS => {
                    if let Some(pos) = data.as_f64() {
                        self.player.time_pos_secs = Some(pos);
                    }
                }
                OBS_DURATION => self.player.duration_secs = data.as_f64(),
                _ => {}
            }
            return;
        }

        match evt.event_name() {
            Some("playback-restart") => {
                if self.player.status == PlayerStatus::Loading {
                    self.player.status = if self.obs_pause == Some(true) {
                        PlayerStatus::Paused
                    } else {
                        PlayerStatus::Playing
                    };
                }
            }
            Some("end-file") => match evt.end_reason() {
                Some("eof") => {
                    let ids = self.catalog.unlocked_ids();
                    match next_in(&ids, self.player.current) {
                        Some(id) => {
                            debug!("StoreCore: end of file, advancing to {}", id);
                            self.play(id).await;
                        }
                        None => self.stop_player().await,
                    }
                }
                Some("error") => {
                    let reason = evt.file_error().unwrap_or("unknown error").to_string();
                    warn!("StoreCore: mpv could not play file: {}", reason);
                    self.banner = Some(format!("Error playing audio: {}", reason));
                    self.player.status = PlayerStatus::Error(reason);
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn derive_status(&mut self) {
        if matches!(self.player.status, PlayerStatus::Error(_) | PlayerStatus::Idle) {
            return;
        }
        self.player.status = match (self.obs_pause, self.obs_core_idle) {
            (Some(true), _) => PlayerStatus::Paused,
            (_, Some(false)) => PlayerStatus::Playing,
            _ => return,
        };
    }

    fn save_prefs(&self) {
        if let Err(e) = self.prefs.save_to(&self.prefs_path) {
            warn!("StoreCore: could not save preferences: {}", e);
        }
    }
}
