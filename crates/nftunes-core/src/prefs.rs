use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

/// Local UI preferences, kept apart from `config.toml` because the app
/// rewrites them on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_volume")]
    pub volume: u8,
}

fn default_volume() -> u8 {
    70
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            volume: default_volume(),
        }
    }
}

impl Preferences {
    pub fn default_path() -> PathBuf {
        platform::data_dir().join("prefs.json")
    }

    /// Missing or unreadable files give defaults.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(mut p) => {
                p.volume = p.volume.min(100);
                p
            }
            Err(e) => {
                warn!("prefs: ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = Preferences::load_from(&dir.path().join("prefs.json"));
        assert_eq!(p, Preferences::default());
        assert_eq!(p.volume, 70);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let prefs = Preferences {
            theme: Theme::Light,
            volume: 35,
        };
        prefs.save_to(&path).unwrap();
        assert_eq!(Preferences::load_from(&path), prefs);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"light\""));
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Preferences::load_from(&path), Preferences::default());

        std::fs::write(&path, r#"{"theme":"light"}"#).unwrap();
        let p = Preferences::load_from(&path);
        assert_eq!(p.theme, Theme::Light);
        assert_eq!(p.volume, 70);
    }
}
