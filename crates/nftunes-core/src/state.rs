use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::CatalogSource;
use crate::playback::PlayerState;
use crate::prefs::Theme;
use crate::projection::{project, Projection};
use crate::purchase::PurchaseState;
use crate::session::Session;
use crate::track::{Track, TrackId};

/// Everything the UI and the HTTP API render from.  `rev` is a monotonically
/// increasing counter bumped on every publish.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub rev: u64,
    pub session: Session,
    pub source: CatalogSource,
    pub tracks: Vec<Track>,
    pub purchase: PurchaseState,
    pub player: PlayerState,
    /// Single dismissible error message.
    pub banner: Option<String>,
    /// A wallet connect request is outstanding.
    #[serde(default)]
    pub connecting: bool,
    /// A reconcile pass is running.
    #[serde(default)]
    pub reconciling: bool,
    #[serde(default)]
    pub theme: Theme,
}

impl StoreSnapshot {
    pub fn project(&self, term: &str) -> Projection {
        project(&self.tracks, term)
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn unlocked_ids(&self) -> Vec<TrackId> {
        self.tracks
            .iter()
            .filter(|t| t.unlocked)
            .map(|t| t.id)
            .collect()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.player.current.and_then(|id| self.track(id))
    }
}

/// Shared read side of the store.  Only the core writes.
#[derive(Clone)]
pub struct StateManager {
    state: Arc<RwLock<StoreSnapshot>>,
}

impl StateManager {
    pub fn new(initial: StoreSnapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreSnapshot { rev: 1, ..initial })),
        }
    }

    pub fn arc(&self) -> Arc<RwLock<StoreSnapshot>> {
        Arc::clone(&self.state)
    }

    pub async fn get_state(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    /// Replace the snapshot and bump `rev`.  Returns the new revision.
    pub async fn publish(&self, snapshot: StoreSnapshot) -> u64 {
        let mut state = self.state.write().await;
        let rev = state.rev + 1;
        *state = StoreSnapshot { rev, ..snapshot };
        rev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::bundled_tracks;

    #[tokio::test]
    async fn test_publish_bumps_rev() {
        let sm = StateManager::new(StoreSnapshot::default());
        assert_eq!(sm.get_state().await.rev, 1);

        let mut next = sm.get_state().await;
        next.tracks = bundled_tracks("audio");
        next.rev = 0;
        assert_eq!(sm.publish(next).await, 2);

        let got = sm.get_state().await;
        assert_eq!(got.rev, 2);
        assert_eq!(got.tracks.len(), 8);
    }

    #[test]
    fn test_snapshot_helpers() {
        let mut snap = StoreSnapshot {
            tracks: bundled_tracks("audio"),
            ..StoreSnapshot::default()
        };
        snap.tracks[5].unlocked = true;
        snap.player.current = Some(5);
        assert_eq!(snap.unlocked_ids(), vec![5]);
        assert_eq!(snap.current_track().map(|t| t.title.as_str()), Some("Fevicol Se"));
        assert_eq!(snap.project("").mine.len(), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = StoreSnapshot::default();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["purchase"]["state"], "idle");
        assert_eq!(json["source"], "Bundled");
    }
}
