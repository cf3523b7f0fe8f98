//! Local transaction history.

use crate::errors::Result;
use crate::identifiers::TransactionId;
use crate::transition::FinalizedTransaction;
use async_trait::async_trait;

/// A node's local store of finalized transactions.
#[async_trait]
pub trait TransactionLogEffects: Send + Sync {
    /// Every transaction held locally.
    async fn transactions(&self) -> Result<Vec<FinalizedTransaction>>;

    /// Whether a transaction is already held.
    async fn contains(&self, id: &TransactionId) -> Result<bool>;

    /// Store a transaction; returns `false` if it was already held.
    async fn insert(&self, transaction: FinalizedTransaction) -> Result<bool>;
}
