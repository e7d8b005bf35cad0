use serde::{Deserialize, Serialize};

use crate::track::TrackId;

/// Playback status as observed from mpv.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    #[default]
    Idle, // nothing loaded
    Loading, // loadfile sent, waiting for mpv
    Playing,
    Paused,
    Error(String),
}

impl PlayerStatus {
    pub fn label(&self) -> &str {
        match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Loading => "loading",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
            PlayerStatus::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    pub current: Option<TrackId>,
    pub status: PlayerStatus,
    pub time_pos_secs: Option<f64>,
    pub duration_secs: Option<f64>,
    /// 0..=100
    pub volume: u8,
    /// Player popup shown.
    pub visible: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            current: None,
            status: PlayerStatus::Idle,
            time_pos_secs: None,
            duration_secs: None,
            volume: 70,
            visible: false,
        }
    }
}

impl PlayerState {
    pub fn with_volume(volume: u8) -> Self {
        Self {
            volume: volume.min(100),
            ..Self::default()
        }
    }

    /// Start loading `id` from the beginning.
    pub fn start(&mut self, id: TrackId) {
        self.current = Some(id);
        self.status = PlayerStatus::Loading;
        self.time_pos_secs = Some(0.0);
        self.duration_secs = None;
        self.visible = true;
    }

    pub fn stop(&mut self) {
        self.current = None;
        self.status = PlayerStatus::Idle;
        self.time_pos_secs = None;
        self.duration_secs = None;
        self.visible = false;
    }

    /// Fraction played, 0.0..=1.0.
    pub fn progress(&self) -> f64 {
        match (self.time_pos_secs, self.duration_secs) {
            (Some(pos), Some(dur)) if dur > 0.0 => (pos / dur).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    pub fn set_volume(&mut self, volume: i32) -> u8 {
        self.volume = volume.clamp(0, 100) as u8;
        self.volume
    }
}

/// Track after `current` in `ids`, wrapping to the first.  Without a current
/// track (or one no longer in `ids`) this is the first id.
pub fn next_in(ids: &[TrackId], current: Option<TrackId>) -> Option<TrackId> {
    if ids.is_empty() {
        return None;
    }
    let idx = current.and_then(|c| ids.iter().position(|&id| id == c));
    match idx {
        Some(i) => Some(ids[(i + 1) % ids.len()]),
        None => Some(ids[0]),
    }
}

/// Track before `current`, wrapping to the last.
pub fn prev_in(ids: &[TrackId], current: Option<TrackId>) -> Option<TrackId> {
    if ids.is_empty() {
        return None;
    }
    let idx = current.and_then(|c| ids.iter().position(|&id| id == c));
    match idx {
        Some(0) => ids.last().copied(),
        Some(i) => Some(ids[i - 1]),
        None => ids.last().copied(),
    }
}

/// Format seconds as `m:ss`.
pub fn fmt_time(secs: f64) -> String {
    let secs = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
    format!("{}:{:02}", secs / 60, secs % 60)
}
