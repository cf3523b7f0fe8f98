//! Co-signing of jointly signed transitions.

use crate::errors::Result;
use crate::identifiers::PartyId;
use crate::transition::Transition;
use async_trait::async_trait;

/// Counterparty signature collection for jointly signed transitions.
#[async_trait]
pub trait CosignEffects: Send + Sync {
    /// Ask the counterparty to co-sign; returns the identity that signed.
    async fn cosign(&self, transition: &Transition) -> Result<PartyId>;
}
