//! Effect bundle shared by lifecycle handlers.

use accord_core::effects::{
    MembershipStoreEffects, PhysicalTimeEffects, TransactionLogEffects, UniquenessOracle,
};
use accord_core::{FinalizedTransaction, RecordId, TransactionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Collaborators every lifecycle flow needs to finalize a transition.
///
/// Cloning shares the underlying handlers.
#[derive(Clone)]
pub struct LifecycleEffects {
    /// Authoritative record store
    pub store: Arc<dyn MembershipStoreEffects>,
    /// Serialization point for concurrent transitions
    pub oracle: Arc<dyn UniquenessOracle>,
    /// Local history of finalized transactions
    pub ledger: Arc<dyn TransactionLogEffects>,
    pub clock: Arc<dyn PhysicalTimeEffects>,
    /// Accepted transitions whose local write has not landed yet
    pub unsettled: UnsettledWrites,
}

impl LifecycleEffects {
    pub fn new(
        store: Arc<dyn MembershipStoreEffects>,
        oracle: Arc<dyn UniquenessOracle>,
        ledger: Arc<dyn TransactionLogEffects>,
        clock: Arc<dyn PhysicalTimeEffects>,
    ) -> Self {
        Self {
            store,
            oracle,
            ledger,
            clock,
            unsettled: UnsettledWrites::default(),
        }
    }
}

/// Transitions the oracle accepted but the store or ledger has not taken.
///
/// At most one entry per record: a newer accepted version replaces an older
/// one, since the store keeps only the latest version anyway.
#[derive(Debug, Clone, Default)]
pub struct UnsettledWrites {
    pending: Arc<Mutex<HashMap<RecordId, FinalizedTransaction>>>,
}

impl UnsettledWrites {
    /// Pending transaction for `record_id`, if any.
    pub fn get(&self, record_id: &RecordId) -> Option<FinalizedTransaction> {
        self.pending.lock().get(record_id).cloned()
    }

    pub(crate) fn hold(&self, finalized: FinalizedTransaction) {
        let record_id = finalized.transition.successor.record_id;
        let mut pending = self.pending.lock();
        let modified = finalized.transition.successor.modified;
        match pending.get(&record_id) {
            Some(held) if held.transition.successor.modified >= modified => {}
            _ => {
                pending.insert(record_id, finalized);
            }
        }
    }

    /// Drop the entry for `record_id` if it is still transaction `id`.
    pub(crate) fn settle(&self, record_id: &RecordId, id: &TransactionId) {
        let mut pending = self.pending.lock();
        if pending.get(record_id).is_some_and(|held| held.id == *id) {
            pending.remove(record_id);
        }
    }
}
