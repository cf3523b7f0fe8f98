//! In-memory uniqueness oracle.

use accord_core::effects::{OracleVerdict, UniquenessOracle};
use accord_core::{Result, TransactionId, Transition, VersionRef};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fake notary enforcing "one accepted successor per consumed version".
///
/// The check-and-record step happens under a single lock, so concurrent
/// submissions against the same version race for exactly one acceptance.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOracle {
    consumed: Arc<Mutex<HashMap<VersionRef, TransactionId>>>,
    submissions: Arc<AtomicUsize>,
    latency: Arc<Mutex<Option<Duration>>>,
    stalled: Arc<AtomicBool>,
}

impl InMemoryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every verdict by `latency` before deciding.
    pub fn with_latency(latency: Duration) -> Self {
        let oracle = Self::new();
        *oracle.latency.lock() = Some(latency);
        oracle
    }

    /// Never return a verdict (simulates a partitioned notary).
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.stalled.store(false, Ordering::SeqCst);
    }

    /// Transaction that consumed `version`, if any.
    pub fn consumer_of(&self, version: &VersionRef) -> Option<TransactionId> {
        self.consumed.lock().get(version).copied()
    }

    /// Total submissions received, accepted or not.
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UniquenessOracle for InMemoryOracle {
    async fn submit(&self, transition: &Transition) -> Result<OracleVerdict> {
        self.submissions.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        while self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let id = transition.id()?;
        let consumed = transition.consumed_ref();
        let mut ledger = self.consumed.lock();
        match ledger.get(&consumed) {
            Some(existing) if *existing == id => Ok(OracleVerdict::Accepted { id }),
            Some(existing) => Ok(OracleVerdict::Rejected {
                consumed_by: *existing,
            }),
            None => {
                ledger.insert(consumed, id);
                Ok(OracleVerdict::Accepted { id })
            }
        }
    }
}
