//! Process-local transaction log.

use accord_core::effects::TransactionLogEffects;
use accord_core::{FinalizedTransaction, Result, TransactionId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory [`TransactionLogEffects`] keyed by transaction identity.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransactionLog {
    transactions: Arc<RwLock<BTreeMap<TransactionId, FinalizedTransaction>>>,
}

impl MemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: impl IntoIterator<Item = FinalizedTransaction>) -> Self {
        let log = Self::new();
        log.transactions
            .write()
            .extend(transactions.into_iter().map(|tx| (tx.id, tx)));
        log
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    /// Drop every transaction (simulates local data loss).
    pub fn clear(&self) {
        self.transactions.write().clear();
    }
}

#[async_trait]
impl TransactionLogEffects for MemoryTransactionLog {
    async fn transactions(&self) -> Result<Vec<FinalizedTransaction>> {
        Ok(self.transactions.read().values().cloned().collect())
    }

    async fn contains(&self, id: &TransactionId) -> Result<bool> {
        Ok(self.transactions.read().contains_key(id))
    }

    async fn insert(&self, transaction: FinalizedTransaction) -> Result<bool> {
        let mut transactions = self.transactions.write();
        if transactions.contains_key(&transaction.id) {
            return Ok(false);
        }
        transactions.insert(transaction.id, transaction);
        Ok(true)
    }
}
