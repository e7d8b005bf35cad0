//! Unlock reconciler: asks the contract which tracks the active account
//! may play and folds the answers into the catalog store.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::chain::{Address, TrackContract};
use crate::track::TrackId;

/// Forced unlocks for demos.  Only ever applied when `enabled`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FallbackPolicy {
    pub enabled: bool,
    pub ids: Vec<TrackId>,
}

impl FallbackPolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Fallback ids that exist in `track_ids`, in catalog order.
    fn select(&self, track_ids: &[TrackId]) -> Vec<TrackId> {
        track_ids
            .iter()
            .copied()
            .filter(|id| self.ids.contains(id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Session epoch the pass was started under.
    pub epoch: u64,
    pub account: Option<Address>,
    /// Every track the pass decided on; tracks not listed are left alone.
    pub checked: Vec<TrackId>,
    pub unlocked: Vec<TrackId>,
    pub failures: usize,
    pub used_fallback: bool,
}

/// One sequential pass of `canAccess` over `track_ids`.
///
/// Returns `None` (nothing to do) without an account, a contract, or the
/// expected network.  A failing query marks only that track locked.
pub async fn reconcile(
    track_ids: &[TrackId],
    account: Option<Address>,
    contract: Option<&dyn TrackContract>,
    network_ok: bool,
    fallback: &FallbackPolicy,
    epoch: u64,
) -> Option<ReconcileOutcome> {
    let account = account?;
    let contract = contract?;
    if !network_ok {
        debug!("reconcile: skipped, wrong network");
        return None;
    }

    let mut unlocked = Vec::new();
    let mut failures = 0usize;
    for &id in track_ids {
        match contract.can_access(id, account).await {
            Ok(true) => unlocked.push(id),
            Ok(false) => {}
            Err(e) => {
                failures += 1;
                warn!("reconcile: canAccess({}) failed: {}", id, e);
            }
        }
    }

    let mut used_fallback = false;
    if unlocked.is_empty() && fallback.enabled {
        unlocked = fallback.select(track_ids);
        used_fallback = true;
        info!("reconcile: nothing unlocked, test mode forces {:?}", unlocked);
    }

    info!(
        "reconcile: {} of {} unlocked for {} ({} failed)",
        unlocked.len(),
        track_ids.len(),
        account.short(),
        failures
    );

    Some(ReconcileOutcome {
        epoch,
        account: Some(account),
        checked: track_ids.to_vec(),
        unlocked,
        failures,
        used_fallback,
    })
}

/// Forced outcome used when there is no session to reconcile against and
/// test mode is on.
pub fn fallback_outcome(
    track_ids: &[TrackId],
    fallback: &FallbackPolicy,
    epoch: u64,
) -> Option<ReconcileOutcome> {
    if !fallback.enabled {
        return None;
    }
    Some(ReconcileOutcome {
        epoch,
        account: None,
        checked: track_ids.to_vec(),
        unlocked: fallback.select(track_ids),
        failures: 0,
        used_fallback: true,
    })
}

/// Write an outcome into the store.  Returns `true` if any flag changed.
pub fn apply(store: &mut CatalogStore, outcome: &ReconcileOutcome) -> bool {
    let mut changed = false;
    for &id in &outcome.checked {
        changed |= store.set_unlocked(id, outcome.unlocked.contains(&id));
    }
    changed
}

/// Serializes reconcile passes.  A request while a pass is running is
/// remembered and replayed once when it finishes.
#[derive(Debug, Default)]
pub struct ReconcileGuard {
    in_flight: bool,
    rerun: bool,
}

impl ReconcileGuard {
    /// `true` if the caller should start a pass now.
    pub fn begin(&mut self) -> bool {
        if self.in_flight {
            self.rerun = true;
            false
        } else {
            self.in_flight = true;
            true
        }
    }

    /// Mark the running pass done.  `true` if another pass was requested
    /// meanwhile and should start now (the guard stays held for it).
    pub fn finish(&mut self) -> bool {
        if std::mem::take(&mut self.rerun) {
            self.in_flight = true;
            true
        } else {
            self.in_flight = false;
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight
    }

    /// Drop all bookkeeping (the running pass was aborted).
    pub fn reset(&mut self) {
        self.in_flight = false;
        self.rerun = false;
    }
}
