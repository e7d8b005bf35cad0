//! Catalog store: the canonical track list and its unlock flags.
//!
//! A snapshot comes either from the bundled list or from the contract, never
//! a mix of both.  The unlocked view is derived from the flags in catalog
//! order, so it cannot hold duplicates.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chain::{ChainTrack, TrackContract};
use crate::track::{Track, TrackId, Wei};

pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/300x300?text=Music+NFT";

const COVER_BASE: &str = "https://i.scdn.co/image/ab67616d00001e";

/// (title, artist, audio file, price in wei, cover suffix)
const BUNDLED: [(&str, &str, &str, u128, &str); 8] = [
    (
        "Not Like Us",
        "Kendrick Lamar",
        "Not Like Us.mp3",
        10_000_000_000_000_000,
        "021ea0c62b2339cbf493a999ad",
    ),
    (
        "Tailor Swif",
        "A$AP Rocky",
        "Tailor Swif.mp3",
        15_000_000_000_000_000,
        "020dcf0f3680cff56fe5ff2288",
    ),
    (
        "Everyday Hustle",
        "Future, Metro Boomin, Rick Ross",
        "Everyday Hustle.mp3",
        20_000_000_000_000_000,
        "02a46b07c291e6dfdee13b3ee8",
    ),
    (
        "FE!N",
        "Travis Scott, Playboi Carti",
        "FEIN.mp3",
        25_000_000_000_000_000,
        "02881d8d8378cd01099babcd44",
    ),
    (
        "XO Tour Llif3",
        "Lil Uzi Vert",
        "XO Tour Lif3.mp3",
        10_000_000_000_000_000,
        "02aab4824c720639a6a2d7d932",
    ),
    (
        "Fevicol Se",
        "Mamta Sharma, Wajid",
        "Fevicol Se.mp3",
        15_000_000_000_000_000,
        "0205b3ca44c67b40e983179d1c",
    ),
    (
        "Munni Badnaam",
        "Mamta Sharma, Aishwarya",
        "Munni Badnaam.mp3",
        20_000_000_000_000_000,
        "026e28d74c8eddc32542ce8924",
    ),
    (
        "Chikni Chameli",
        "Ajay-Atul, Shreya Goshal",
        "Chikni Chameli.mp3",
        25_000_000_000_000_000,
        "02d54393280e88a142bf31265f",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CatalogSource {
    #[default]
    Bundled,
    Chain,
}

impl CatalogSource {
    pub fn label(self) -> &'static str {
        match self {
            CatalogSource::Bundled => "bundled",
            CatalogSource::Chain => "chain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub source: CatalogSource,
    pub tracks: Vec<Track>,
}

fn join_audio(base: &str, file: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", base, file)
    }
}

/// Cover art for a known title, or the placeholder.
pub fn image_for_title(title: &str) -> String {
    BUNDLED
        .iter()
        .find(|(t, ..)| *t == title)
        .map(|(.., cover)| format!("{}{}", COVER_BASE, cover))
        .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}

/// The fixed eight-track catalog used whenever the contract can't be read.
pub fn bundled_tracks(audio_base: &str) -> Vec<Track> {
    BUNDLED
        .iter()
        .enumerate()
        .map(|(i, (title, artist, file, price, cover))| Track {
            id: i as TrackId,
            title: title.to_string(),
            artist: artist.to_string(),
            audio_src: join_audio(audio_base, file),
            image_src: format!("{}{}", COVER_BASE, cover),
            price: Wei(*price),
            unlocked: false,
        })
        .collect()
}

/// Map contract tracks to catalog tracks.  Ids are the contract indices.
pub fn tracks_from_chain(chain: Vec<ChainTrack>, audio_base: &str) -> Vec<Track> {
    chain
        .into_iter()
        .enumerate()
        .map(|(i, t)| Track {
            id: i as TrackId,
            image_src: image_for_title(&t.name),
            audio_src: join_audio(audio_base, &t.audio_cid),
            artist: t.artist.short(),
            title: t.name,
            price: t.price,
            unlocked: false,
        })
        .collect()
}

impl CatalogSnapshot {
    pub fn bundled(audio_base: &str) -> Self {
        Self {
            source: CatalogSource::Bundled,
            tracks: bundled_tracks(audio_base),
        }
    }
}

/// Fetch the catalog from the contract when possible; on any failure fall
/// back to the bundled list.
pub async fn load_snapshot(
    contract: Option<&dyn TrackContract>,
    network_ok: bool,
    audio_base: &str,
) -> CatalogSnapshot {
    let Some(contract) = contract else {
        info!("catalog: no contract handle, using bundled tracks");
        return CatalogSnapshot::bundled(audio_base);
    };
    if !network_ok {
        info!("catalog: wrong network, using bundled tracks");
        return CatalogSnapshot::bundled(audio_base);
    }
    match contract.get_all_tracks().await {
        Ok(tracks) if !tracks.is_empty() => {
            info!("catalog: loaded {} tracks from contract", tracks.len());
            CatalogSnapshot {
                source: CatalogSource::Chain,
                tracks: tracks_from_chain(tracks, audio_base),
            }
        }
        Ok(_) => {
            info!("catalog: contract has no tracks, using bundled tracks");
            CatalogSnapshot::bundled(audio_base)
        }
        Err(e) => {
            warn!("catalog: getAllTracks failed ({}), using bundled tracks", e);
            CatalogSnapshot::bundled(audio_base)
        }
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CatalogStore {
    snapshot: CatalogSnapshot,
}

impl CatalogStore {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    /// Replace the whole snapshot (never merged with the previous one).
    pub fn replace(&mut self, snapshot: CatalogSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn source(&self) -> CatalogSource {
        self.snapshot.source
    }

    pub fn tracks(&self) -> &[Track] {
        &self.snapshot.tracks
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.snapshot.tracks.iter().find(|t| t.id == id)
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.snapshot.tracks.iter().map(|t| t.id).collect()
    }

    /// Set one track's flag.  Returns `true` if the flag changed; unknown ids
    /// are ignored.
    pub fn set_unlocked(&mut self, id: TrackId, value: bool) -> bool {
        match self.snapshot.tracks.iter_mut().find(|t| t.id == id) {
            Some(t) if t.unlocked != value => {
                t.unlocked = value;
                true
            }
            _ => false,
        }
    }

    pub fn clear_unlocked(&mut self) {
        for t in &mut self.snapshot.tracks {
            t.unlocked = false;
        }
    }

    pub fn unlocked_view(&self) -> Vec<&Track> {
        self.snapshot.tracks.iter().filter(|t| t.unlocked).collect()
    }

    pub fn unlocked_ids(&self) -> Vec<TrackId> {
        self.unlocked_view().iter().map(|t| t.id).collect()
    }

    /// `(all, unlocked)` restricted to tracks whose title or artist contains
    /// `term`, case-insensitively.
    pub fn filter(&self, term: &str) -> (Vec<&Track>, Vec<&Track>) {
        let all: Vec<&Track> = self
            .snapshot
            .tracks
            .iter()
            .filter(|t| t.matches(term))
            .collect();
        let unlocked = all.iter().copied().filter(|t| t.unlocked).collect();
        (all, unlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Address, ChainError};
    use crate::testing::MockContract;

    fn store() -> CatalogStore {
        CatalogStore::new(CatalogSnapshot::bundled("audio"))
    }

    #[test]
    fn test_bundled_catalog() {
        let tracks = bundled_tracks("audio");
        assert_eq!(tracks.len(), 8);
        assert_eq!(tracks.iter().map(|t| t.id).collect::<Vec<_>>(), (0..8).collect::<Vec<_>>());
        assert_eq!(tracks[3].title, "FE!N");
        assert_eq!(tracks[3].audio_src, "audio/FEIN.mp3");
        assert_eq!(tracks[1].price.format_ether(), "0.015");
        assert!(tracks.iter().all(|t| !t.unlocked));
        assert!(tracks[0].image_src.ends_with("1ea0c62b2339cbf493a999ad"));
    }

    #[test]
    fn test_image_lookup() {
        assert!(image_for_title("Munni Badnaam").starts_with(COVER_BASE));
        assert_eq!(image_for_title("Unknown Song"), PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_set_unlocked_is_idempotent() {
        let mut s = store();
        assert!(s.set_unlocked(2, true));
        let once = s.unlocked_ids();
        assert!(!s.set_unlocked(2, true));
        assert_eq!(s.unlocked_ids(), once);
        assert_eq!(once, vec![2]);
        assert!(!s.set_unlocked(99, true));
    }

    #[test]
    fn test_set_unlocked_touches_one_track() {
        let mut s = store();
        s.set_unlocked(5, true);
        let others: Vec<bool> = s.tracks().iter().filter(|t| t.id != 5).map(|t| t.unlocked).collect();
        assert!(others.iter().all(|u| !u));
    }

    #[test]
    fn test_unlocked_view_keeps_catalog_order() {
        let mut s = store();
        s.set_unlocked(6, true);
        s.set_unlocked(1, true);
        s.set_unlocked(4, true);
        assert_eq!(s.unlocked_ids(), vec![1, 4, 6]);
        s.clear_unlocked();
        assert!(s.unlocked_view().is_empty());
    }

    #[test]
    fn test_filter_empty_term_is_identity() {
        let mut s = store();
        s.set_unlocked(0, true);
        let (all, mine) = s.filter("");
        assert_eq!(all.len(), 8);
        assert_eq!(mine.len(), 1);
    }

    #[test]
    fn test_filter_matches_title_or_artist() {
        let mut s = store();
        s.set_unlocked(5, true);
        s.set_unlocked(6, true);
        let (all, mine) = s.filter("MAMTA");
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(mine.len(), 2);

        let (all, mine) = s.filter("swif");
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1]);
        assert!(mine.is_empty());

        for term in ["hustle", "lil", "zzz", "a"] {
            let (all, _) = s.filter(term);
            for t in all {
                assert!(
                    t.title.to_lowercase().contains(term) || t.artist.to_lowercase().contains(term)
                );
            }
        }
    }

    #[tokio::test]
    async fn test_load_snapshot_from_chain() {
        let artist: Address = "0x5095d3313C76E8d29163e40a0223A5816a8037D8".parse().unwrap();
        let contract = MockContract::with_tracks(vec![
            ChainTrack {
                name: "FE!N".into(),
                audio_cid: "QmFein".into(),
                price: Wei(1),
                artist,
            },
            ChainTrack {
                name: "Brand New".into(),
                audio_cid: "QmNew".into(),
                price: Wei(2),
                artist,
            },
        ]);
        let snap = load_snapshot(Some(&contract), true, "audio").await;
        assert_eq!(snap.source, CatalogSource::Chain);
        assert_eq!(snap.tracks.len(), 2);
        assert_eq!(snap.tracks[0].audio_src, "audio/QmFein");
        assert_eq!(snap.tracks[0].artist, "0x5095...37d8");
        assert!(snap.tracks[0].image_src.starts_with(COVER_BASE));
        assert_eq!(snap.tracks[1].image_src, PLACEHOLDER_IMAGE);
        assert_eq!(snap.tracks[1].id, 1);
    }

    #[tokio::test]
    async fn test_load_snapshot_falls_back() {
        let snap = load_snapshot(None, true, "audio").await;
        assert_eq!(snap.source, CatalogSource::Bundled);
        assert_eq!(snap.tracks.len(), 8);

        let empty = MockContract::with_tracks(vec![]);
        let snap = load_snapshot(Some(&empty), true, "audio").await;
        assert_eq!(snap.source, CatalogSource::Bundled);

        let failing = MockContract::failing(|| ChainError::Transport("down".into()));
        let snap = load_snapshot(Some(&failing), true, "audio").await;
        assert_eq!(snap.source, CatalogSource::Bundled);
        assert_eq!(snap.tracks.len(), 8);

        let chain = MockContract::with_tracks(vec![ChainTrack {
            name: "x".into(),
            audio_cid: "y".into(),
            price: Wei(1),
            artist: Address([0; 20]),
        }]);
        let snap = load_snapshot(Some(&chain), false, "audio").await;
        assert_eq!(snap.source, CatalogSource::Bundled);
    }

    #[test]
    fn test_replace_never_merges() {
        let mut s = store();
        s.set_unlocked(0, true);
        s.replace(CatalogSnapshot {
            source: CatalogSource::Chain,
            tracks: tracks_from_chain(
                vec![ChainTrack {
                    name: "Only".into(),
                    audio_cid: "cid".into(),
                    price: Wei(5),
                    artist: Address([1; 20]),
                }],
                "audio",
            ),
        });
        assert_eq!(s.tracks().len(), 1);
        assert_eq!(s.source(), CatalogSource::Chain);
        assert!(s.unlocked_view().is_empty());
    }
}
