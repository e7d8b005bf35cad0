use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;
use crate::chain::{Address, AddressError, EXPECTED_CHAIN_ID};
use crate::reconcile::FallbackPolicy;
use crate::track::TrackId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub purchase: PurchaseConfig,
    #[serde(default)]
    pub test_mode: TestModeConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    /// Preferred account when the node exposes several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory or URL prefix audio files are resolved against.
    #[serde(default = "default_audio_base")]
    pub audio_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    #[serde(default = "default_loading_timeout_secs")]
    pub loading_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseConfig {
    #[serde(default = "default_settle_close_delay_ms")]
    pub settle_close_delay_ms: u64,
}

/// Demo overrides.  Everything here is off unless `enabled` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestModeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_force_unlock_ids")]
    pub force_unlock_ids: Vec<TrackId>,
    #[serde(default)]
    pub unlock_on_failed_purchase: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            contract_address: default_contract_address(),
            account: None,
            watch_interval_ms: default_watch_interval_ms(),
            receipt_poll_ms: default_receipt_poll_ms(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            audio_base: default_audio_base(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            loading_timeout_secs: default_loading_timeout_secs(),
        }
    }
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            settle_close_delay_ms: default_settle_close_delay_ms(),
        }
    }
}

impl Default for TestModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            force_unlock_ids: default_force_unlock_ids(),
            unlock_on_failed_purchase: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_chain_id() -> u64 {
    EXPECTED_CHAIN_ID
}

fn default_contract_address() -> String {
    "0x5095d3313C76E8d29163e40a0223A5816a8037D8".to_string()
}

fn default_watch_interval_ms() -> u64 {
    2000
}

fn default_receipt_poll_ms() -> u64 {
    500
}

fn default_audio_base() -> String {
    "audio".to_string()
}

fn default_volume() -> u8 {
    70
}

fn default_loading_timeout_secs() -> u64 {
    5
}

fn default_settle_close_delay_ms() -> u64 {
    2000
}

fn default_force_unlock_ids() -> Vec<TrackId> {
    vec![0, 2, 4]
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

impl ChainConfig {
    pub fn contract_address(&self) -> Result<Address, AddressError> {
        self.contract_address.parse()
    }

    /// The configured preferred account; an unparsable value is ignored.
    pub fn preferred_account(&self) -> Option<Address> {
        self.account.as_deref().and_then(|a| a.parse().ok())
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(100))
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms.max(50))
    }
}

impl PlayerConfig {
    pub fn loading_timeout(&self) -> Duration {
        Duration::from_secs(self.loading_timeout_secs)
    }
}

impl PurchaseConfig {
    pub fn settle_close_delay(&self) -> Duration {
        Duration::from_millis(self.settle_close_delay_ms)
    }
}

impl TestModeConfig {
    pub fn fallback_policy(&self) -> FallbackPolicy {
        FallbackPolicy {
            enabled: self.enabled,
            ids: self.force_unlock_ids.clone(),
        }
    }

    /// Failed purchases unlock only when test mode and the opt-in are both on.
    pub fn unlock_failed_purchases(&self) -> bool {
        self.enabled && self.unlock_on_failed_purchase
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read `path`, writing defaults there first if it doesn't exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chain.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.chain.chain_id, 31337);
        assert!(config.chain.contract_address().is_ok());
        assert_eq!(config.player.default_volume, 70);
        assert_eq!(config.player.loading_timeout(), Duration::from_secs(5));
        assert_eq!(config.purchase.settle_close_delay(), Duration::from_secs(2));
        assert!(!config.test_mode.enabled);
        assert!(!config.test_mode.fallback_policy().enabled);
        assert!(!config.test_mode.unlock_failed_purchases());
        assert!(!config.http.enabled);
        assert_eq!(config.http.port, 8990);
        assert!(Config::config_path().ends_with("nftunes/config.toml"));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.catalog.audio_base, "audio");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[chain]
rpc_url = "http://10.0.0.2:8545"
account = "0x00000000000000000000000000000000000000a1"

[test_mode]
enabled = true
unlock_on_failed_purchase = true
"#,
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.chain.rpc_url, "http://10.0.0.2:8545");
        assert_eq!(config.chain.chain_id, 31337);
        assert!(config.chain.preferred_account().is_some());
        let policy = config.test_mode.fallback_policy();
        assert!(policy.enabled);
        assert_eq!(policy.ids, vec![0, 2, 4]);
        assert!(config.test_mode.unlock_failed_purchases());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.http.enabled = true;
        config.save_to(&path).unwrap();
        assert!(Config::load_from(&path).unwrap().http.enabled);
    }
}
