//! In-process peer mesh
//!
//! Routes reconciliation requests directly to registered responders. Each
//! peer can be toggled unreachable to exercise retry and fallback paths.

use crate::responder::ReconcileResponder;
use accord_core::effects::PeerTransportEffects;
use accord_core::{MembershipError, PartyId, ReconcileRequest, ReconcileResponse, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct PeerSlot {
    responder: ReconcileResponder,
    reachable: bool,
    requests: u32,
}

/// Loopback [`PeerTransportEffects`] shared by every simulated node.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    peers: Arc<RwLock<HashMap<PartyId, PeerSlot>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `responder` reachable under its identity.
    pub fn register(&self, responder: ReconcileResponder) {
        self.peers.write().insert(
            responder.identity(),
            PeerSlot {
                responder,
                reachable: true,
                requests: 0,
            },
        );
    }

    pub fn set_reachable(&self, peer: &PartyId, reachable: bool) {
        if let Some(slot) = self.peers.write().get_mut(peer) {
            slot.reachable = reachable;
        }
    }

    /// Requests routed to `peer` so far, including failed ones.
    pub fn request_count(&self, peer: &PartyId) -> u32 {
        self.peers.read().get(peer).map_or(0, |slot| slot.requests)
    }
}

#[async_trait]
impl PeerTransportEffects for LoopbackTransport {
    async fn request_shared_history(
        &self,
        peer: PartyId,
        request: ReconcileRequest,
    ) -> Result<ReconcileResponse> {
        let responder = {
            let mut peers = self.peers.write();
            let slot = peers
                .get_mut(&peer)
                .ok_or_else(|| MembershipError::unreachable(peer, 1, "unknown peer"))?;
            slot.requests += 1;
            if !slot.reachable {
                return Err(MembershipError::unreachable(peer, 1, "peer offline"));
            }
            slot.responder.clone()
        };
        responder.respond(&request).await
    }
}
