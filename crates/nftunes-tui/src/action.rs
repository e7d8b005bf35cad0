//! Action enum: all user-initiated intents and internal events.

use nftunes_core::track::TrackId;

/// Unique identifier for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Header,
    TrackList,
    PlayerBar,
    PurchaseModal,
    HelpOverlay,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Storefront ───────────────────────────────────────────────────────────
    /// Play when unlocked, otherwise open the purchase modal.
    Activate(TrackId),
    ConfirmPurchase,
    CancelPurchase,
    ConnectWallet,
    Reload,
    DismissBanner,

    // ── Player ───────────────────────────────────────────────────────────────
    TogglePause,
    Next,
    Prev,
    SeekRelative(f64),
    SeekPercent(f64),
    VolumeDelta(i32),
    ClosePlayer,

    // ── Navigation ───────────────────────────────────────────────────────────
    SwitchView,

    // ── Filter/search ────────────────────────────────────────────────────────
    OpenFilter,
    CloseFilter,
    FilterChanged(String),

    // ── UI toggles ───────────────────────────────────────────────────────────
    ToggleHelp,
    ToggleKeys,
    ToggleTheme,
    CopyAccount,

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
}
