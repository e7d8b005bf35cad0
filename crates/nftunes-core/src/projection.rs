//! Render projection: turns the catalog into the rows both views display.
//!
//! Pure.  Nothing here touches the store; callers hand in the current tracks
//! and the active search term.

use serde::{Deserialize, Serialize};

use crate::track::{Track, TrackId, Wei};

pub const NO_SONGS_FOUND: &str = "No songs found.";
pub const NO_UNLOCKED_SONGS: &str =
    "You haven't unlocked any songs yet. Purchase songs to listen to them!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Locked,
    Unlocked,
}

impl TrackStatus {
    pub fn label(self) -> &'static str {
        match self {
            TrackStatus::Locked => "Locked",
            TrackStatus::Unlocked => "Unlocked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackAction {
    Play,
    Unlock { price: Wei },
}

impl TrackAction {
    pub fn label(&self) -> String {
        match self {
            TrackAction::Play => "Play".to_string(),
            TrackAction::Unlock { price } => format!("Unlock ({} ETH)", price.format_ether()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayItem {
    pub id: TrackId,
    pub image: String,
    pub title: String,
    pub artist: String,
    pub status: TrackStatus,
    pub action: TrackAction,
}

impl DisplayItem {
    pub fn from_track(track: &Track) -> Self {
        let (status, action) = if track.unlocked {
            (TrackStatus::Unlocked, TrackAction::Play)
        } else {
            (
                TrackStatus::Locked,
                TrackAction::Unlock { price: track.price },
            )
        };
        Self {
            id: track.id,
            image: track.image_src.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            status,
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    AllSongs,
    MySongs,
}

impl ViewKind {
    pub fn title(self) -> &'static str {
        match self {
            ViewKind::AllSongs => "All Songs",
            ViewKind::MySongs => "My Songs",
        }
    }

    pub fn empty_message(self) -> &'static str {
        match self {
            ViewKind::AllSongs => NO_SONGS_FOUND,
            ViewKind::MySongs => NO_UNLOCKED_SONGS,
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            ViewKind::AllSongs => ViewKind::MySongs,
            ViewKind::MySongs => ViewKind::AllSongs,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub all: Vec<DisplayItem>,
    pub mine: Vec<DisplayItem>,
}

impl Projection {
    pub fn view(&self, kind: ViewKind) -> &[DisplayItem] {
        match kind {
            ViewKind::AllSongs => &self.all,
            ViewKind::MySongs => &self.mine,
        }
    }

    /// Placeholder for `kind` when it has no rows.
    pub fn placeholder(&self, kind: ViewKind) -> Option<&'static str> {
        self.view(kind).is_empty().then(|| kind.empty_message())
    }
}

/// Build both views for `term`.  My Songs keeps catalog order.
pub fn project(tracks: &[Track], term: &str) -> Projection {
    let all: Vec<DisplayItem> = tracks
        .iter()
        .filter(|t| t.matches(term))
        .map(DisplayItem::from_track)
        .collect();
    let mine = all
        .iter()
        .filter(|item| item.status == TrackStatus::Unlocked)
        .cloned()
        .collect();
    Projection { all, mine }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSnapshot, CatalogStore};

    fn store() -> CatalogStore {
        CatalogStore::new(CatalogSnapshot::bundled("audio"))
    }

    #[test]
    fn test_locked_rows_offer_unlock_with_price() {
        let st = store();
        let p = project(st.tracks(), "");
        assert_eq!(p.all.len(), 8);
        let first = &p.all[0];
        assert_eq!(first.status, TrackStatus::Locked);
        assert_eq!(
            first.action.label(),
            format!("Unlock ({} ETH)", st.tracks()[0].price.format_ether())
        );
        assert!(p.mine.is_empty());
        assert_eq!(p.placeholder(ViewKind::MySongs), Some(NO_UNLOCKED_SONGS));
        assert_eq!(p.placeholder(ViewKind::AllSongs), None);
    }

    #[test]
    fn test_unlocked_rows_play() {
        let mut st = store();
        st.set_unlocked(3, true);
        let p = project(st.tracks(), "");
        assert_eq!(p.mine.len(), 1);
        assert_eq!(p.mine[0].title, "FE!N");
        assert_eq!(p.mine[0].action, TrackAction::Play);
        assert_eq!(p.mine[0].action.label(), "Play");
        assert_eq!(p.all[3].status.label(), "Unlocked");
    }

    #[test]
    fn test_filter_applies_to_both_views() {
        let mut st = store();
        st.set_unlocked(1, true);
        st.set_unlocked(3, true);
        let p = project(st.tracks(), "swif");
        assert_eq!(p.all.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(p.mine.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1]);

        let none = project(st.tracks(), "zzzz-no-match");
        assert_eq!(none.placeholder(ViewKind::AllSongs), Some(NO_SONGS_FOUND));
    }

    #[test]
    fn test_projection_does_not_mutate() {
        let st = store();
        let before = st.tracks().to_vec();
        let _ = project(st.tracks(), "a");
        assert_eq!(st.tracks(), &before[..]);
    }

    #[test]
    fn test_view_toggle() {
        assert_eq!(ViewKind::AllSongs.toggle(), ViewKind::MySongs);
        assert_eq!(ViewKind::MySongs.title(), "My Songs");
    }
}
