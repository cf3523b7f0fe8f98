//! Peer request/response transport used by reconciliation.

use crate::errors::Result;
use crate::identifiers::PartyId;
use crate::wire::{ReconcileRequest, ReconcileResponse};
use async_trait::async_trait;

/// Sends a reconciliation request to one peer.
///
/// An unreachable peer is reported as `MembershipError::UnreachablePeer`.
#[async_trait]
pub trait PeerTransportEffects: Send + Sync {
    /// Send `request` to `peer` and wait for its reply.
    async fn request_shared_history(
        &self,
        peer: PartyId,
        request: ReconcileRequest,
    ) -> Result<ReconcileResponse>;
}
