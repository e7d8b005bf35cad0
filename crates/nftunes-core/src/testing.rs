//! In-memory wallet and contract for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::chain::{Address, ChainError, ChainTrack, TrackContract, TxHash, WalletProvider};
use crate::track::{TrackId, Wei};

pub struct MockWallet {
    accounts: Mutex<Vec<Address>>,
    chain_id: Mutex<u64>,
    reject: Mutex<bool>,
    offline: Mutex<bool>,
}

impl MockWallet {
    pub fn new(accounts: Vec<Address>, chain_id: u64) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            chain_id: Mutex::new(chain_id),
            reject: Mutex::new(false),
            offline: Mutex::new(false),
        }
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_chain_id(&self, id: u64) {
        *self.chain_id.lock().unwrap() = id;
    }

    /// Make `request_accounts` fail as if the user dismissed the prompt.
    pub fn set_reject(&self, reject: bool) {
        *self.reject.lock().unwrap() = reject;
    }

    /// Make every call fail as if the node were unreachable.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    fn check_online(&self) -> Result<(), ChainError> {
        if *self.offline.lock().unwrap() {
            return Err(ChainError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.check_online()?;
        if *self.reject.lock().unwrap() {
            return Err(ChainError::Rejected("User rejected the request.".into()));
        }
        let accounts = self.accounts.lock().unwrap().clone();
        if accounts.is_empty() {
            return Err(ChainError::NoAccounts);
        }
        Ok(accounts)
    }

    async fn list_accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.check_online()?;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.check_online()?;
        Ok(*self.chain_id.lock().unwrap())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReply {
    Grant,
    Deny,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyReply {
    Confirm,
    RejectSubmit,
    Revert,
}

pub struct MockContract {
    tracks: Vec<ChainTrack>,
    error: Option<fn() -> ChainError>,
    access: Mutex<HashMap<TrackId, AccessReply>>,
    default_access: AccessReply,
    buy_reply: Mutex<BuyReply>,
    receipt_delay: Duration,
    access_delay: Duration,
    access_calls: Mutex<Vec<TrackId>>,
    buys: Mutex<Vec<(Address, TrackId, Wei)>>,
}

impl MockContract {
    fn base(tracks: Vec<ChainTrack>) -> Self {
        Self {
            tracks,
            error: None,
            access: Mutex::new(HashMap::new()),
            default_access: AccessReply::Deny,
            buy_reply: Mutex::new(BuyReply::Confirm),
            receipt_delay: Duration::ZERO,
            access_delay: Duration::ZERO,
            access_calls: Mutex::new(Vec::new()),
            buys: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tracks(tracks: Vec<ChainTrack>) -> Self {
        Self::base(tracks)
    }

    /// Every call fails with the error produced by `make`.
    pub fn failing(make: fn() -> ChainError) -> Self {
        let mut c = Self::base(Vec::new());
        c.error = Some(make);
        c
    }

    /// `canAccess` answers `Grant` for exactly these ids and `Deny` otherwise.
    pub fn granting(ids: &[TrackId]) -> Self {
        let c = Self::base(Vec::new());
        {
            let mut access = c.access.lock().unwrap();
            for id in ids {
                access.insert(*id, AccessReply::Grant);
            }
        }
        c
    }

    pub fn set_access(&self, id: TrackId, reply: AccessReply) {
        self.access.lock().unwrap().insert(id, reply);
    }

    pub fn set_buy_reply(&self, reply: BuyReply) {
        *self.buy_reply.lock().unwrap() = reply;
    }

    pub fn with_receipt_delay(mut self, delay: Duration) -> Self {
        self.receipt_delay = delay;
        self
    }

    /// Each `canAccess` answer is read first and returned after `delay`.
    pub fn with_access_delay(mut self, delay: Duration) -> Self {
        self.access_delay = delay;
        self
    }

    pub fn access_calls(&self) -> Vec<TrackId> {
        self.access_calls.lock().unwrap().clone()
    }

    pub fn buys(&self) -> Vec<(Address, TrackId, Wei)> {
        self.buys.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackContract for MockContract {
    async fn get_all_tracks(&self) -> Result<Vec<ChainTrack>, ChainError> {
        if let Some(make) = self.error {
            return Err(make());
        }
        Ok(self.tracks.clone())
    }

    async fn can_access(&self, track_id: TrackId, _account: Address) -> Result<bool, ChainError> {
        self.access_calls.lock().unwrap().push(track_id);
        if let Some(make) = self.error {
            return Err(make());
        }
        let reply = self
            .access
            .lock()
            .unwrap()
            .get(&track_id)
            .copied()
            .unwrap_or(self.default_access);
        if !self.access_delay.is_zero() {
            tokio::time::sleep(self.access_delay).await;
        }
        match reply {
            AccessReply::Grant => Ok(true),
            AccessReply::Deny => Ok(false),
            AccessReply::Fail => Err(ChainError::Rpc {
                code: -32000,
                message: "execution reverted".into(),
            }),
        }
    }

    async fn buy_track(
        &self,
        from: Address,
        track_id: TrackId,
        value: Wei,
    ) -> Result<TxHash, ChainError> {
        if let Some(make) = self.error {
            return Err(make());
        }
        if *self.buy_reply.lock().unwrap() == BuyReply::RejectSubmit {
            return Err(ChainError::Rejected("User denied transaction signature.".into()));
        }
        let mut buys = self.buys.lock().unwrap();
        buys.push((from, track_id, value));
        Ok(TxHash(format!("0x{:064x}", buys.len())))
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<(), ChainError> {
        if !self.receipt_delay.is_zero() {
            tokio::time::sleep(self.receipt_delay).await;
        }
        if *self.buy_reply.lock().unwrap() == BuyReply::Revert {
            return Err(ChainError::Reverted(tx.clone()));
        }
        // a mined purchase grants access to the bought track
        let bought = self
            .buys
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .find(|(i, _)| format!("0x{:064x}", i + 1) == tx.0)
            .map(|(_, (_, id, _))| *id);
        if let Some(id) = bought {
            self.set_access(id, AccessReply::Grant);
        }
        Ok(())
    }
}
