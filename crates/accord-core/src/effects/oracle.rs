//! Uniqueness oracle (notarisation) interface.

use crate::errors::Result;
use crate::identifiers::TransactionId;
use crate::transition::Transition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Verdict for one submitted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleVerdict {
    /// The transition is the one accepted successor of its predecessor
    Accepted {
        /// Identity of the accepted transaction
        id: TransactionId,
    },
    /// The predecessor was already consumed by another transition
    Rejected {
        /// Transaction that consumed the predecessor first
        consumed_by: TransactionId,
    },
}

/// External service that totally orders transitions per record version.
///
/// For any consumed version at most one submitted transition is ever
/// accepted. Resubmitting the accepted transition itself is answered with
/// `Accepted` again.
#[async_trait]
pub trait UniquenessOracle: Send + Sync {
    /// Submit `transition` and wait for the verdict on its consumed version.
    async fn submit(&self, transition: &Transition) -> Result<OracleVerdict>;
}
