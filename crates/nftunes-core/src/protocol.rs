use serde::{Deserialize, Serialize};

use crate::track::TrackId;

/// Requests into the store core, from the TUI or the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    ConnectWallet,
    Reconcile,
    /// Full reload: reconnect, reload the catalog, reconcile.
    Reload,
    RequestPurchase { track_id: TrackId },
    ConfirmPurchase,
    CancelPurchase,
    Play { track_id: TrackId },
    TogglePause,
    Next,
    Prev,
    SeekRelative { seconds: f64 },
    SeekPercent { percent: f64 },
    /// Absolute volume, clamped to 0..=100.
    Volume { value: i32 },
    VolumeDelta { delta: i32 },
    ClosePlayer,
    DismissBanner,
    ToggleTheme,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let json = serde_json::to_string(&Command::Play { track_id: 3 }).unwrap();
        assert_eq!(json, r#"{"cmd":"Play","track_id":3}"#);
        let back: Command = serde_json::from_str(r#"{"cmd":"Reconcile"}"#).unwrap();
        assert_eq!(back, Command::Reconcile);
    }
}
