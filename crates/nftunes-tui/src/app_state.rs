//! AppState: read-only data passed to all components during render/event.
//!
//! The App event loop is the only writer.  The store snapshot is replaced
//! wholesale on every `StateUpdated`; the projection is rebuilt whenever the
//! snapshot or the search term changes.

use nftunes_core::projection::{DisplayItem, Projection, ViewKind};
use nftunes_core::state::StoreSnapshot;

use crate::theme::{palette, Palette};
use crate::widgets::status_bar::InputMode;

pub struct AppState {
    pub snapshot: StoreSnapshot,
    pub view: ViewKind,
    pub search: String,
    pub projection: Projection,
    pub input_mode: InputMode,
    pub show_keys_bar: bool,
}

impl AppState {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        let projection = snapshot.project("");
        Self {
            snapshot,
            view: ViewKind::AllSongs,
            search: String::new(),
            projection,
            input_mode: InputMode::Normal,
            show_keys_bar: true,
        }
    }

    pub fn set_snapshot(&mut self, snapshot: StoreSnapshot) {
        self.snapshot = snapshot;
        self.projection = self.snapshot.project(&self.search);
    }

    pub fn set_search(&mut self, term: &str) {
        if self.search == term {
            return;
        }
        self.search = term.to_string();
        self.projection = self.snapshot.project(&self.search);
    }

    /// Rows of the active view.
    pub fn items(&self) -> &[DisplayItem] {
        self.projection.view(self.view)
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        self.projection.placeholder(self.view)
    }

    pub fn palette(&self) -> &'static Palette {
        palette(self.snapshot.theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftunes_core::catalog::bundled_tracks;
    use nftunes_core::projection::{NO_SONGS_FOUND, NO_UNLOCKED_SONGS};

    fn state() -> AppState {
        let mut tracks = bundled_tracks("audio");
        tracks[2].unlocked = true;
        tracks[5].unlocked = true;
        AppState::new(StoreSnapshot {
            tracks,
            ..StoreSnapshot::default()
        })
    }

    #[test]
    fn test_views_share_the_search_term() {
        let mut s = state();
        assert_eq!(s.items().len(), 8);
        s.view = ViewKind::MySongs;
        let ids: Vec<u64> = s.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 5]);

        s.set_search("zzz-no-match");
        assert!(s.items().is_empty());
        assert_eq!(s.placeholder(), Some(NO_UNLOCKED_SONGS));
        s.view = ViewKind::AllSongs;
        assert!(s.items().is_empty());
        assert_eq!(s.placeholder(), Some(NO_SONGS_FOUND));
    }

    #[test]
    fn test_new_snapshot_is_reprojected() {
        let mut s = state();
        s.view = ViewKind::MySongs;
        let mut snap = s.snapshot.clone();
        for t in &mut snap.tracks {
            t.unlocked = false;
        }
        s.set_snapshot(snap);
        assert!(s.items().is_empty());
        assert_eq!(s.placeholder(), Some(NO_UNLOCKED_SONGS));
    }
}
