use serde::{Deserialize, Serialize};

use crate::chain::{Address, EXPECTED_CHAIN_ID, EXPECTED_NETWORK_NAME};

/// Active wallet session.  `epoch` increases on every account or network
/// change so results of work started under an older session can be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub expected_chain_id: u64,
    pub epoch: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EXPECTED_CHAIN_ID)
    }
}

impl Session {
    pub fn new(expected_chain_id: u64) -> Self {
        Self {
            account: None,
            chain_id: None,
            expected_chain_id,
            epoch: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub fn is_correct_network(&self) -> bool {
        self.chain_id == Some(self.expected_chain_id)
    }

    pub fn can_transact(&self) -> bool {
        self.is_connected() && self.is_correct_network()
    }

    /// Switch account.  Returns `true` when it actually changed (and the
    /// epoch advanced).
    pub fn set_account(&mut self, account: Option<Address>) -> bool {
        if self.account == account {
            return false;
        }
        self.account = account;
        self.epoch += 1;
        true
    }

    pub fn set_chain_id(&mut self, chain_id: Option<u64>) -> bool {
        if self.chain_id == chain_id {
            return false;
        }
        self.chain_id = chain_id;
        self.epoch += 1;
        true
    }

    /// Forget account and network and start a new epoch.
    pub fn reset(&mut self) {
        self.account = None;
        self.chain_id = None;
        self.epoch += 1;
    }

    pub fn wallet_label(&self) -> String {
        match &self.account {
            Some(a) => format!("Connected: {}", a.short()),
            None => "Not connected".to_string(),
        }
    }

    pub fn network_label(&self) -> String {
        match self.chain_id {
            None => "Network: unknown".to_string(),
            Some(_) if self.is_correct_network() => format!(
                "Network: {} ({})",
                EXPECTED_NETWORK_NAME, self.expected_chain_id
            ),
            Some(_) => format!(
                "Wrong Network! Please switch to {} ({})",
                EXPECTED_NETWORK_NAME, self.expected_chain_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_advances_only_on_change() {
        let a: Address = "0x00000000000000000000000000000000000000a1".parse().unwrap();
        let mut s = Session::default();
        assert!(s.set_account(Some(a)));
        assert_eq!(s.epoch, 1);
        assert!(!s.set_account(Some(a)));
        assert_eq!(s.epoch, 1);
        assert!(s.set_chain_id(Some(31337)));
        assert_eq!(s.epoch, 2);
        s.reset();
        assert_eq!(s.epoch, 3);
        assert!(!s.is_connected());
    }

    #[test]
    fn test_labels() {
        let mut s = Session::default();
        assert_eq!(s.wallet_label(), "Not connected");
        s.set_account(Some("0x123400000000000000000000000000000000abcd".parse().unwrap()));
        assert_eq!(s.wallet_label(), "Connected: 0x1234...abcd");
        s.set_chain_id(Some(31337));
        assert_eq!(s.network_label(), "Network: Localhost (31337)");
        assert!(s.can_transact());
        s.set_chain_id(Some(1));
        assert_eq!(
            s.network_label(),
            "Wrong Network! Please switch to Localhost (31337)"
        );
        assert!(!s.can_transact());
    }
}
