//! App: component-based event loop.
//!
//! - `App` owns all components and `AppState` (shared read-only data for components).
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background tasks.
//! - The event loop draws a frame whenever something changed, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Commands to the store core flow out through `event_tx`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use nftunes_core::projection::ViewKind;
use nftunes_core::protocol::Command;
use nftunes_core::purchase::PurchaseState;
use nftunes_core::state::{StateManager, StoreSnapshot};

use crate::core::StoreEvent;
use crate::BroadcastMessage;
use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    components::{
        header::Header, help_overlay::HelpOverlay, player_bar::PlayerBar,
        purchase_modal::PurchaseModal, track_list::TrackList,
    },
    widgets::{
        banner::draw_banner,
        status_bar::{self, InputMode},
        toast::ToastManager,
    },
};

const SEEK_STEP_SECS: f64 = 10.0;
const SEEK_LONG_STEP_SECS: f64 = 60.0;
const VOLUME_STEP: i32 = 5;

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    StateUpdated(StoreSnapshot),
}

/// Screen rects from the last draw, for mouse hit-testing.
#[derive(Default, Clone, Copy)]
struct PaneAreas {
    track_list: Rect,
    player_bar: Rect,
}

pub struct App {
    state: AppState,
    state_manager: StateManager,
    event_tx: mpsc::Sender<StoreEvent>,
    log_path: PathBuf,

    header: Header,
    track_list: TrackList,
    player_bar: PlayerBar,
    purchase_modal: PurchaseModal,
    help_overlay: HelpOverlay,
    toast: ToastManager,

    pane_areas: PaneAreas,
    should_quit: bool,
}

impl App {
    pub fn new(
        state_manager: StateManager,
        event_tx: mpsc::Sender<StoreEvent>,
        log_path: PathBuf,
    ) -> Self {
        let mut app = Self {
            state: AppState::new(StoreSnapshot::default()),
            state_manager,
            event_tx,
            log_path,
            header: Header::new(),
            track_list: TrackList::new(),
            player_bar: PlayerBar::new(),
            purchase_modal: PurchaseModal::new(),
            help_overlay: HelpOverlay::new(),
            toast: ToastManager::new(),
            pane_areas: PaneAreas::default(),
            should_quit: false,
        };
        app.track_list.sync(&app.state);
        app
    }

    pub async fn run(mut self, mut broadcast_rx: broadcast::Receiver<BroadcastMessage>) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // Pick up whatever the core published before we subscribed.
        let initial = self.state_manager.get_state().await;
        self.on_snapshot(initial);
        self.toast.info(format!("log: {}", self.log_path.display()));

        // ── Background task: keyboard/mouse events ────────────────────────────
        let input_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if input_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: broadcast receiver (StoreCore → AppMessage) ──────
        let bc_tx = tx.clone();
        let bc_state_manager = self.state_manager.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(BroadcastMessage::StateUpdated) => {
                        let state = bc_state_manager.get_state().await;
                        if bc_tx.send(AppMessage::StateUpdated(state)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // the next StateUpdated carries the full snapshot anyway
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Toast expiry + progress refresh.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(250));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else { break };
                        drained += 1;
                        redraw |= self.handle_message(next).await;
                    }
                    needs_redraw = redraw;
                }

                _ = ui_tick.tick() => {
                    let had_toasts = !self.toast.is_empty();
                    self.toast.tick();
                    needs_redraw = had_toasts || self.state.snapshot.player.visible;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        info!("TUI closed");

        Ok(())
    }

    // ── Message handling ──────────────────────────────────────────────────────

    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(ev) => match ev {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        return false;
                    }
                    for a in self.handle_key(key) {
                        self.dispatch(a).await;
                    }
                    true
                }
                Event::Mouse(mouse) => {
                    let actions = self.handle_mouse(mouse);
                    let changed = !actions.is_empty()
                        || matches!(
                            mouse.kind,
                            MouseEventKind::Down(_)
                                | MouseEventKind::ScrollUp
                                | MouseEventKind::ScrollDown
                        );
                    for a in actions {
                        self.dispatch(a).await;
                    }
                    changed
                }
                Event::Resize(..) => true,
                _ => false,
            },
            AppMessage::StateUpdated(snapshot) => {
                self.on_snapshot(snapshot);
                true
            }
        }
    }

    /// Take a new store snapshot and react to what changed since the last one.
    fn on_snapshot(&mut self, snapshot: StoreSnapshot) {
        if snapshot.rev < self.state.snapshot.rev {
            debug!(
                "dropping stale snapshot rev {} (have {})",
                snapshot.rev, self.state.snapshot.rev
            );
            return;
        }
        let prev_purchase = self.state.snapshot.purchase.clone();
        let prev_account = self.state.snapshot.session.account;

        if let PurchaseState::Settled { pending } = &snapshot.purchase {
            if !matches!(prev_purchase, PurchaseState::Settled { .. }) {
                self.toast
                    .success(format!("\"{}\" unlocked", pending.title));
            }
        }
        // the settled modal closing hands over to My Songs
        let reveal = match (&prev_purchase, &snapshot.purchase) {
            (PurchaseState::Settled { pending }, PurchaseState::Idle)
                if snapshot.session.account == prev_account =>
            {
                Some(pending.track_id)
            }
            _ => None,
        };
        if snapshot.session.account != prev_account {
            if let Some(account) = &snapshot.session.account {
                self.toast.info(format!("account {}", account.short()));
            }
        }

        self.state.set_snapshot(snapshot);
        self.refresh();
        if let Some(id) = reveal {
            self.reveal(ViewKind::MySongs, id);
        }
    }

    /// Re-derive component state that follows `AppState`.
    fn refresh(&mut self) {
        self.track_list.sync(&self.state);
        self.state.input_mode = if PurchaseModal::is_open(&self.state) {
            InputMode::Modal
        } else if self.track_list.filter_input.is_active() {
            InputMode::Filter
        } else {
            InputMode::Normal
        };
    }

    fn reveal(&mut self, view: ViewKind, id: nftunes_core::track::TrackId) {
        self.state.view = view;
        self.track_list.sync(&self.state);
        if !self.track_list.select_track(id) {
            debug!("reveal: track {} not listed in {}", id, view.title());
        }
    }

    // ── Key handling ──────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }

        // Help overlay captures all keys when visible
        if self.help_overlay.visible {
            let actions = self.help_overlay.handle_key(key, &self.state);
            if !actions.is_empty() {
                return actions;
            }
            return vec![Action::ToggleHelp];
        }

        // The purchase modal owns the keyboard while open
        if PurchaseModal::is_open(&self.state) {
            let actions = self.purchase_modal.handle_key(key, &self.state);
            if actions.is_empty() && key.code == KeyCode::Esc {
                self.toast.warning("Transaction in progress");
            }
            return actions;
        }

        if self.state.input_mode == InputMode::Filter {
            match key.code {
                KeyCode::Tab | KeyCode::BackTab => {
                    return vec![Action::CloseFilter, Action::SwitchView];
                }
                _ => return self.track_list.handle_key(key, &self.state),
            }
        }

        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char('q') => return vec![Action::Quit],
            KeyCode::Char('?') => return vec![Action::ToggleHelp],
            KeyCode::Tab | KeyCode::BackTab => return vec![Action::SwitchView],
            KeyCode::Char(' ') => return vec![Action::TogglePause],
            KeyCode::Char('n') => return vec![Action::Next],
            KeyCode::Char('p') => return vec![Action::Prev],
            KeyCode::Char(',') => {
                let secs = if shift { SEEK_LONG_STEP_SECS } else { SEEK_STEP_SECS };
                return vec![Action::SeekRelative(-secs)];
            }
            KeyCode::Char('.') => {
                let secs = if shift { SEEK_LONG_STEP_SECS } else { SEEK_STEP_SECS };
                return vec![Action::SeekRelative(secs)];
            }
            KeyCode::Char('<') => return vec![Action::SeekRelative(-SEEK_LONG_STEP_SECS)],
            KeyCode::Char('>') => return vec![Action::SeekRelative(SEEK_LONG_STEP_SECS)],
            KeyCode::Char('+') | KeyCode::Char('=') => return vec![Action::VolumeDelta(VOLUME_STEP)],
            KeyCode::Char('-') => return vec![Action::VolumeDelta(-VOLUME_STEP)],
            KeyCode::Char('c') => return vec![Action::ConnectWallet],
            KeyCode::Char('r') => return vec![Action::Reload],
            KeyCode::Char('x') => return vec![Action::DismissBanner],
            KeyCode::Char('t') => return vec![Action::ToggleTheme],
            KeyCode::Char('y') => return vec![Action::CopyAccount],
            KeyCode::Char('K') => return vec![Action::ToggleKeys],
            KeyCode::Esc if self.state.snapshot.player.visible => {
                return vec![Action::ClosePlayer];
            }
            _ => {}
        }

        self.track_list.handle_key(key, &self.state)
    }

    // ── Mouse handling ────────────────────────────────────────────────────────

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        if self.help_overlay.visible || PurchaseModal::is_open(&self.state) {
            return vec![];
        }
        fn hit(r: Rect, col: u16, row: u16) -> bool {
            r.width > 0
                && r.height > 0
                && col >= r.x
                && col < r.x + r.width
                && row >= r.y
                && row < r.y + r.height
        }

        let areas = self.pane_areas;
        if hit(areas.player_bar, event.column, event.row) {
            return self
                .player_bar
                .handle_mouse(event, areas.player_bar, &self.state);
        }
        if hit(areas.track_list, event.column, event.row) {
            return self
                .track_list
                .handle_mouse(event, areas.track_list, &self.state);
        }
        vec![]
    }

    // ── Action dispatcher ─────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        // Let components react first
        let secondary: Vec<Action> = {
            let s = &self.state;
            let mut out = Vec::new();
            out.extend(self.track_list.on_action(&action, s));
            out.extend(self.help_overlay.on_action(&action, s));
            out
        };

        self.apply_action(action).await;

        for a in secondary {
            self.apply_action(a).await;
        }
        self.refresh();
    }

    async fn apply_action(&mut self, action: Action) {
        debug!("apply_action: {:?}", action);
        match action {
            // ── Storefront ────────────────────────────────────────────────────
            Action::Activate(id) => match self.state.snapshot.track(id) {
                Some(t) if t.unlocked => self.send_cmd(Command::Play { track_id: id }).await,
                Some(_) => {
                    self.send_cmd(Command::RequestPurchase { track_id: id })
                        .await
                }
                None => self.toast.warning(format!("Unknown track {}", id)),
            },
            Action::ConfirmPurchase => self.send_cmd(Command::ConfirmPurchase).await,
            Action::CancelPurchase => self.send_cmd(Command::CancelPurchase).await,
            Action::ConnectWallet => self.send_cmd(Command::ConnectWallet).await,
            Action::Reload => {
                self.toast.info("Reloading catalog…");
                self.send_cmd(Command::Reload).await;
            }
            Action::DismissBanner => self.send_cmd(Command::DismissBanner).await,

            // ── Player ────────────────────────────────────────────────────────
            Action::TogglePause => self.send_cmd(Command::TogglePause).await,
            Action::Next => self.send_cmd(Command::Next).await,
            Action::Prev => self.send_cmd(Command::Prev).await,
            Action::SeekRelative(seconds) => {
                self.send_cmd(Command::SeekRelative { seconds }).await
            }
            Action::SeekPercent(percent) => {
                self.send_cmd(Command::SeekPercent { percent }).await
            }
            Action::VolumeDelta(delta) => self.send_cmd(Command::VolumeDelta { delta }).await,
            Action::ClosePlayer => self.send_cmd(Command::ClosePlayer).await,

            // ── Navigation ────────────────────────────────────────────────────
            Action::SwitchView => {
                self.state.view = self.state.view.toggle();
                self.track_list.sync(&self.state);
                self.track_list.list.select_first();
            }

            // ── Filter ────────────────────────────────────────────────────────
            Action::OpenFilter | Action::CloseFilter => {}
            Action::FilterChanged(q) => self.state.set_search(&q),

            // ── UI ────────────────────────────────────────────────────────────
            Action::ToggleHelp => {}
            Action::ToggleKeys => self.state.show_keys_bar = !self.state.show_keys_bar,
            Action::ToggleTheme => self.send_cmd(Command::ToggleTheme).await,
            Action::CopyAccount => self.copy_account(),

            Action::Quit => self.should_quit = true,
        }
    }

    async fn send_cmd(&mut self, cmd: Command) {
        if let Err(e) = self.event_tx.send(StoreEvent::Command(cmd)).await {
            error!("store core is gone: {}", e);
            self.toast.error("store core stopped");
        }
    }

    fn copy_account(&mut self) {
        let Some(account) = self.state.snapshot.session.account else {
            self.toast.warning("Not connected");
            return;
        };
        let text = account.to_string();
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text)) {
            Ok(()) => self.toast.success(format!("copied: {}", account.short())),
            Err(e) => {
                warn!("clipboard error: {}", e);
                self.toast.error(format!("clipboard error: {}", e));
            }
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        use ratatui::widgets::Block;
        let p = self.state.palette();
        let area = frame.area();

        frame.render_widget(
            Block::default().style(ratatui::style::Style::default().bg(p.bg)),
            area,
        );

        // ── Outer layout: header | banner | body | player | statusbar ────────
        let banner_h = if self.state.snapshot.banner.is_some() { 1 } else { 0 };
        let player_h = if PlayerBar::is_visible(&self.state) {
            PlayerBar::HEIGHT
        } else {
            0
        };
        let status_h = if self.state.show_keys_bar { 1 } else { 0 };

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(banner_h),
                Constraint::Min(0),
                Constraint::Length(player_h),
                Constraint::Length(status_h),
            ])
            .split(area);

        self.header.draw(frame, outer[0], false, &self.state);

        if let Some(msg) = &self.state.snapshot.banner {
            draw_banner(frame, outer[1], msg, p);
        }

        let list_focused =
            !self.help_overlay.visible && !PurchaseModal::is_open(&self.state);
        self.track_list.sync(&self.state);
        self.track_list
            .draw(frame, outer[2], list_focused, &self.state);
        self.pane_areas.track_list = outer[2];

        if player_h > 0 {
            self.player_bar.draw(frame, outer[3], false, &self.state);
            self.pane_areas.player_bar = outer[3];
        } else {
            self.pane_areas.player_bar = Rect::default();
        }

        if self.state.show_keys_bar {
            status_bar::draw_keys_bar(
                frame,
                outer[4],
                self.state.input_mode,
                self.state.view,
                p,
            );
        }

        // ── Overlays (on top of everything) ──────────────────────────────────
        self.purchase_modal.draw(frame, area, true, &self.state);
        self.help_overlay.draw(frame, area, false, &self.state);

        // ── Toast notifications (topmost layer) ──────────────────────────────
        self.toast.draw(frame, area, p);
    }
}
