//! Wallet and contract seams.
//!
//! The storefront only ever calls these two traits; `rpc` provides the
//! JSON-RPC implementations and tests substitute in-memory ones.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::track::{TrackId, Wei};

/// Chain id of the local development node the contract is deployed to.
pub const EXPECTED_CHAIN_ID: u64 = 31337;
pub const EXPECTED_NETWORK_NAME: &str = "Localhost";

// ── Address ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with 0x: {0:?}")]
    MissingPrefix(String),
    #[error("address must be 20 bytes: {0:?}")]
    BadLength(String),
    #[error("address is not hex: {0:?}")]
    NotHex(String),
}

impl Address {
    /// `0x1234...abcd`: first six characters and last four.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;
        if body.len() != 40 {
            return Err(AddressError::BadLength(s.to_string()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(body, &mut out).map_err(|_| AddressError::NotHex(s.to_string()))?;
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Transaction hash as returned by `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of `getAllTracks()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTrack {
    pub name: String,
    pub audio_cid: String,
    pub price: Wei,
    pub artist: Address,
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("wallet provider is not available at {0}")]
    Unavailable(String),
    #[error("request rejected by the wallet: {0}")]
    Rejected(String),
    #[error("no accounts available")]
    NoAccounts,
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
}

impl ChainError {
    /// EIP-1193 user rejection (code 4001) or an explicit `Rejected`.
    pub fn is_user_rejection(&self) -> bool {
        match self {
            ChainError::Rejected(_) => true,
            ChainError::Rpc { code, .. } => *code == 4001,
            _ => false,
        }
    }
}

impl From<crate::abi::AbiError> for ChainError {
    fn from(e: crate::abi::AbiError) -> Self {
        ChainError::Decode(e.to_string())
    }
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// Account and network management.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet to expose accounts (may prompt the user).
    async fn request_accounts(&self) -> Result<Vec<Address>, ChainError>;

    /// Accounts already exposed, without prompting.
    async fn list_accounts(&self) -> Result<Vec<Address>, ChainError>;

    async fn chain_id(&self) -> Result<u64, ChainError>;
}

/// The music-NFT contract.
#[async_trait]
pub trait TrackContract: Send + Sync {
    async fn get_all_tracks(&self) -> Result<Vec<ChainTrack>, ChainError>;

    async fn can_access(&self, track_id: TrackId, account: Address) -> Result<bool, ChainError>;

    /// Submit `buyTrack(track_id)` carrying exactly `value`.  Returns once the
    /// wallet has accepted the transaction.
    async fn buy_track(
        &self,
        from: Address,
        track_id: TrackId,
        value: Wei,
    ) -> Result<TxHash, ChainError>;

    /// Wait until the transaction is mined.  `Err(Reverted)` on a failed receipt.
    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<(), ChainError>;
}

// ── Wallet change notifications ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

/// Poll the provider and report account / chain changes.  Exits when the
/// receiving side is dropped.
pub fn spawn_wallet_watcher(
    wallet: std::sync::Arc<dyn WalletProvider>,
    interval: Duration,
    tx: mpsc::Sender<WalletEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_accounts: Option<Vec<Address>> = None;
        let mut last_chain: Option<u64> = None;
        // set while the provider is unreachable; the first answer after an
        // outage is reported even without a baseline to compare against
        let mut accounts_down = false;
        let mut chain_down = false;

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            match wallet.list_accounts().await {
                Ok(accounts) => {
                    let changed = match &last_accounts {
                        Some(prev) => *prev != accounts,
                        None => accounts_down,
                    };
                    accounts_down = false;
                    if changed {
                        info!("wallet: accounts changed ({} exposed)", accounts.len());
                        if tx
                            .send(WalletEvent::AccountsChanged(accounts.clone()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    last_accounts = Some(accounts);
                }
                Err(e) => {
                    accounts_down = true;
                    debug!("wallet watcher: eth_accounts failed: {}", e);
                }
            }

            match wallet.chain_id().await {
                Ok(id) => {
                    let changed = match last_chain {
                        Some(prev) => prev != id,
                        None => chain_down,
                    };
                    chain_down = false;
                    if changed {
                        match last_chain {
                            Some(prev) => warn!("wallet: chain changed {} → {}", prev, id),
                            None => info!("wallet: provider reachable on chain {}", id),
                        }
                        if tx.send(WalletEvent::ChainChanged(id)).await.is_err() {
                            break;
                        }
                    }
                    last_chain = Some(id);
                }
                Err(e) => {
                    chain_down = true;
                    debug!("wallet watcher: eth_chainId failed: {}", e);
                }
            }
        }
        debug!("wallet watcher: exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_and_short() {
        let a: Address = "0x5095d3313C76E8d29163e40a0223A5816a8037D8".parse().unwrap();
        assert_eq!(a.to_string(), "0x5095d3313c76e8d29163e40a0223a5816a8037d8");
        assert_eq!(a.short(), "0x5095...37d8");
    }

    #[test]
    fn test_address_errors() {
        assert!(matches!(
            "5095d3313C76E8d29163e40a0223A5816a8037D8".parse::<Address>(),
            Err(AddressError::MissingPrefix(_))
        ));
        assert!(matches!("0x1234".parse::<Address>(), Err(AddressError::BadLength(_))));
        assert!(matches!(
            "0xzz95d3313C76E8d29163e40a0223A5816a8037D8".parse::<Address>(),
            Err(AddressError::NotHex(_))
        ));
    }

    #[test]
    fn test_user_rejection() {
        assert!(ChainError::Rpc { code: 4001, message: "User denied".into() }.is_user_rejection());
        assert!(!ChainError::Transport("refused".into()).is_user_rejection());
    }

    #[tokio::test]
    async fn test_wallet_watcher_reports_changes() {
        use crate::testing::MockWallet;
        use std::sync::Arc;

        let alice: Address = "0x00000000000000000000000000000000000000a1".parse().unwrap();
        let wallet = Arc::new(MockWallet::new(vec![alice], EXPECTED_CHAIN_ID));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn_wallet_watcher(wallet.clone(), Duration::from_millis(10), tx);

        tokio::time::sleep(Duration::from_millis(30)).await;
        wallet.set_chain_id(1);
        let evt = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(evt, WalletEvent::ChainChanged(1));

        wallet.set_accounts(vec![]);
        let evt = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(evt, WalletEvent::AccountsChanged(vec![]));

        drop(rx);
        handle.abort();
    }

    #[tokio::test]
    async fn test_wallet_watcher_reports_provider_coming_up() {
        use crate::testing::MockWallet;
        use std::sync::Arc;

        let alice: Address = "0x00000000000000000000000000000000000000a1".parse().unwrap();
        let wallet = Arc::new(MockWallet::new(vec![alice], EXPECTED_CHAIN_ID));
        wallet.set_offline(true);
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn_wallet_watcher(wallet.clone(), Duration::from_millis(10), tx);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());

        wallet.set_offline(false);
        let evt = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(evt, WalletEvent::AccountsChanged(vec![alice]));
        let evt = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(evt, WalletEvent::ChainChanged(EXPECTED_CHAIN_ID));

        drop(rx);
        handle.abort();
    }
}
