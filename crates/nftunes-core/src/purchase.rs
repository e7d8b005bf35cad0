//! Purchase flow state machine.
//!
//! ```text
//!   Idle ──request──▶ Confirming ──confirm──▶ Submitting ──settle──▶ Settled
//!     ▲                  │                        │                     │
//!     └─────cancel───────┘                        └──fail──▶ Failed ────┘ dismiss/cancel
//!                                                   ▲          │
//!                                                   └─confirm──┘ (retry)
//! ```
//!
//! At most one purchase exists at a time.  The flow never talks to the chain
//! itself; the caller performs the `buyTrack` call for the pending purchase
//! returned by [`PurchaseFlow::confirm`] and reports the result back.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::chain::{TxHash, EXPECTED_NETWORK_NAME};
use crate::session::Session;
use crate::track::{Track, TrackId, Wei};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPurchase {
    pub track_id: TrackId,
    pub title: String,
    pub price: Wei,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PurchaseState {
    #[default]
    Idle,
    Confirming {
        pending: PendingPurchase,
    },
    Submitting {
        pending: PendingPurchase,
        tx: Option<TxHash>,
    },
    Settled {
        pending: PendingPurchase,
    },
    Failed {
        pending: PendingPurchase,
        reason: String,
    },
}

impl PurchaseState {
    pub fn pending(&self) -> Option<&PendingPurchase> {
        match self {
            PurchaseState::Idle => None,
            PurchaseState::Confirming { pending }
            | PurchaseState::Submitting { pending, .. }
            | PurchaseState::Settled { pending }
            | PurchaseState::Failed { pending, .. } => Some(pending),
        }
    }

    /// Modal status line.
    pub fn status_line(&self) -> &'static str {
        match self {
            PurchaseState::Idle => "",
            PurchaseState::Confirming { .. } => "Ready to purchase",
            PurchaseState::Submitting { tx: None, .. } => "Transaction in progress...",
            PurchaseState::Submitting { tx: Some(_), .. } => "Waiting for confirmation...",
            PurchaseState::Settled { .. } => "Transaction successful!",
            PurchaseState::Failed { .. } => "Transaction failed. Please try again.",
        }
    }

    pub fn is_modal_open(&self) -> bool {
        !matches!(self, PurchaseState::Idle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PurchaseError {
    #[error("Please connect your wallet first to unlock songs.")]
    NoAccount,
    #[error("Please switch to the {network} network (Chain ID: {chain_id}) to unlock songs.")]
    WrongNetwork { network: &'static str, chain_id: u64 },
    #[error("\"{0}\" is already unlocked.")]
    AlreadyUnlocked(String),
    #[error("Another purchase is already in progress.")]
    Busy,
    #[error("Unknown track {0}.")]
    UnknownTrack(TrackId),
    #[error("No purchase is waiting for confirmation.")]
    NotConfirming,
    #[error("No transaction is in flight.")]
    NotSubmitting,
}

fn check_session(session: &Session) -> Result<(), PurchaseError> {
    if !session.is_connected() {
        return Err(PurchaseError::NoAccount);
    }
    if !session.is_correct_network() {
        return Err(PurchaseError::WrongNetwork {
            network: EXPECTED_NETWORK_NAME,
            chain_id: session.expected_chain_id,
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct PurchaseFlow {
    state: PurchaseState,
}

impl PurchaseFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PurchaseState {
        &self.state
    }

    /// A purchase is waiting for the user or for the chain.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            PurchaseState::Confirming { .. } | PurchaseState::Submitting { .. }
        )
    }

    /// Open the confirmation step for `track`.
    pub fn request(&mut self, track: &Track, session: &Session) -> Result<(), PurchaseError> {
        check_session(session)?;
        if self.is_busy() {
            return Err(PurchaseError::Busy);
        }
        if track.unlocked {
            return Err(PurchaseError::AlreadyUnlocked(track.title.clone()));
        }
        info!("purchase: confirming \"{}\" for {}", track.title, track.price);
        self.state = PurchaseState::Confirming {
            pending: PendingPurchase {
                track_id: track.id,
                title: track.title.clone(),
                price: track.price,
            },
        };
        Ok(())
    }

    /// Close the modal.  Not allowed while a transaction is in flight.
    pub fn cancel(&mut self) -> Result<(), PurchaseError> {
        if let PurchaseState::Submitting { .. } = self.state {
            return Err(PurchaseError::Busy);
        }
        self.state = PurchaseState::Idle;
        Ok(())
    }

    /// Move to `Submitting` and hand back the purchase to submit.  Also used
    /// to retry from `Failed`.
    pub fn confirm(&mut self, session: &Session) -> Result<PendingPurchase, PurchaseError> {
        let pending = match &self.state {
            PurchaseState::Confirming { pending } | PurchaseState::Failed { pending, .. } => {
                pending.clone()
            }
            PurchaseState::Submitting { .. } => return Err(PurchaseError::Busy),
            _ => return Err(PurchaseError::NotConfirming),
        };
        check_session(session)?;
        info!("purchase: submitting buyTrack({})", pending.track_id);
        self.state = PurchaseState::Submitting {
            pending: pending.clone(),
            tx: None,
        };
        Ok(pending)
    }

    /// The wallet accepted the transaction.
    pub fn submitted(&mut self, hash: TxHash) -> Result<(), PurchaseError> {
        match &mut self.state {
            PurchaseState::Submitting { tx, .. } => {
                *tx = Some(hash);
                Ok(())
            }
            _ => Err(PurchaseError::NotSubmitting),
        }
    }

    /// The transaction was mined successfully; unlock the track.
    pub fn settle(&mut self, store: &mut CatalogStore) -> Result<TrackId, PurchaseError> {
        let pending = match &self.state {
            PurchaseState::Submitting { pending, .. } => pending.clone(),
            _ => return Err(PurchaseError::NotSubmitting),
        };
        store.set_unlocked(pending.track_id, true);
        info!("purchase: \"{}\" unlocked", pending.title);
        let id = pending.track_id;
        self.state = PurchaseState::Settled { pending };
        Ok(id)
    }

    /// The submission or confirmation failed.  Access is only granted when
    /// `unlock_anyway` is set (test mode).
    pub fn fail(
        &mut self,
        reason: impl Into<String>,
        store: &mut CatalogStore,
        unlock_anyway: bool,
    ) -> Result<(), PurchaseError> {
        let pending = match &self.state {
            PurchaseState::Submitting { pending, .. } => pending.clone(),
            _ => return Err(PurchaseError::NotSubmitting),
        };
        let reason = reason.into();
        warn!("purchase: \"{}\" failed: {}", pending.title, reason);
        if unlock_anyway {
            warn!("purchase: test mode unlocks \"{}\" despite failure", pending.title);
            store.set_unlocked(pending.track_id, true);
        }
        self.state = PurchaseState::Failed { pending, reason };
        Ok(())
    }

    /// Close a settled modal for `track_id`.  Returns `false` when the modal
    /// has moved on (another purchase, or already closed).
    pub fn dismiss_settled(&mut self, track_id: TrackId) -> bool {
        match &self.state {
            PurchaseState::Settled { pending } if pending.track_id == track_id => {
                self.state = PurchaseState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drop whatever is pending (network or account change).
    pub fn reset(&mut self) {
        if self.state != PurchaseState::Idle {
            info!("purchase: pending purchase dropped");
        }
        self.state = PurchaseState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::chain::{Address, EXPECTED_CHAIN_ID};

    fn session() -> Session {
        let mut s = Session::default();
        s.set_account(Some(
            "0x00000000000000000000000000000000000000a1".parse::<Address>().unwrap(),
        ));
        s.set_chain_id(Some(EXPECTED_CHAIN_ID));
        s
    }

    fn store() -> CatalogStore {
        CatalogStore::new(CatalogSnapshot::bundled("audio"))
    }

    #[test]
    fn test_request_denied_without_account() {
        let st = store();
        let mut flow = PurchaseFlow::new();
        let err = flow.request(&st.tracks()[0], &Session::default()).unwrap_err();
        assert_eq!(err, PurchaseError::NoAccount);
        assert_eq!(err.to_string(), "Please connect your wallet first to unlock songs.");
        assert_eq!(*flow.state(), PurchaseState::Idle);
    }

    #[test]
    fn test_request_denied_on_wrong_network() {
        let st = store();
        let mut s = session();
        s.set_chain_id(Some(1));
        let mut flow = PurchaseFlow::new();
        let err = flow.request(&st.tracks()[0], &s).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please switch to the Localhost network (Chain ID: 31337) to unlock songs."
        );
    }

    #[test]
    fn test_happy_path_unlocks_exactly_once() {
        let mut st = store();
        let s = session();
        let mut flow = PurchaseFlow::new();
        let track = st.tracks()[3].clone();

        flow.request(&track, &s).unwrap();
        assert_eq!(flow.state().status_line(), "Ready to purchase");
        let pending = flow.confirm(&s).unwrap();
        assert_eq!(pending.track_id, 3);
        assert_eq!(pending.price, track.price);
        assert_eq!(flow.state().status_line(), "Transaction in progress...");
        assert_eq!(flow.confirm(&s), Err(PurchaseError::Busy));

        flow.submitted(TxHash("0xabc".into())).unwrap();
        assert_eq!(flow.state().status_line(), "Waiting for confirmation...");
        assert_eq!(flow.settle(&mut st), Ok(3));
        assert_eq!(flow.state().status_line(), "Transaction successful!");
        assert_eq!(st.unlocked_ids(), vec![3]);

        // a second settlement for the same track adds nothing
        assert_eq!(flow.settle(&mut st), Err(PurchaseError::NotSubmitting));
        st.set_unlocked(3, true);
        assert_eq!(st.unlocked_ids(), vec![3]);

        assert!(flow.dismiss_settled(3));
        assert_eq!(*flow.state(), PurchaseState::Idle);
    }

    #[test]
    fn test_single_pending_purchase() {
        let st = store();
        let s = session();
        let mut flow = PurchaseFlow::new();
        flow.request(&st.tracks()[0], &s).unwrap();
        assert_eq!(flow.request(&st.tracks()[1], &s), Err(PurchaseError::Busy));
        assert_eq!(flow.state().pending().unwrap().track_id, 0);
    }

    #[test]
    fn test_already_unlocked_is_rejected() {
        let mut st = store();
        st.set_unlocked(2, true);
        let mut flow = PurchaseFlow::new();
        assert!(matches!(
            flow.request(&st.tracks()[2], &session()),
            Err(PurchaseError::AlreadyUnlocked(_))
        ));
    }

    #[test]
    fn test_cancel() {
        let st = store();
        let s = session();
        let mut flow = PurchaseFlow::new();
        flow.request(&st.tracks()[0], &s).unwrap();
        flow.cancel().unwrap();
        assert_eq!(*flow.state(), PurchaseState::Idle);

        flow.request(&st.tracks()[0], &s).unwrap();
        flow.confirm(&s).unwrap();
        assert_eq!(flow.cancel(), Err(PurchaseError::Busy));
    }

    #[test]
    fn test_failure_does_not_unlock_and_allows_retry() {
        let mut st = store();
        let s = session();
        let mut flow = PurchaseFlow::new();
        flow.request(&st.tracks()[1], &s).unwrap();
        flow.confirm(&s).unwrap();
        flow.fail("user rejected", &mut st, false).unwrap();
        assert!(st.unlocked_view().is_empty());
        assert_eq!(
            flow.state().status_line(),
            "Transaction failed. Please try again."
        );

        let retry = flow.confirm(&s).unwrap();
        assert_eq!(retry.track_id, 1);
        flow.settle(&mut st).unwrap();
        assert_eq!(st.unlocked_ids(), vec![1]);
    }

    #[test]
    fn test_failure_unlocks_only_in_test_mode() {
        let mut st = store();
        let s = session();
        let mut flow = PurchaseFlow::new();
        flow.request(&st.tracks()[4], &s).unwrap();
        flow.confirm(&s).unwrap();
        flow.fail("reverted", &mut st, true).unwrap();
        assert_eq!(st.unlocked_ids(), vec![4]);
    }

    #[test]
    fn test_dismiss_ignores_other_tracks() {
        let mut st = store();
        let s = session();
        let mut flow = PurchaseFlow::new();
        flow.request(&st.tracks()[0], &s).unwrap();
        flow.confirm(&s).unwrap();
        flow.settle(&mut st).unwrap();
        assert!(!flow.dismiss_settled(5));
        flow.reset();
        assert!(!flow.dismiss_settled(0));
    }
}
