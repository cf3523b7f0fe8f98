//! Responder side of reconciliation
//!
//! A responder returns exactly the finalized transactions in which the
//! initiator, the counterpart and the responder itself all participate.
//! When the responder is the counterpart this is the pairwise slice; when it
//! is a fallback participant the predicate is stricter, so it never hands
//! out history it was not part of.

use accord_core::effects::TransactionLogEffects;
use accord_core::wire::WIRE_SCHEMA_VERSION;
use accord_core::{FinalizedTransaction, PartyId, ReconcileRequest, ReconcileResponse, Result};
use std::sync::Arc;

/// Transactions from `history` that `responder` may return for `request`.
pub fn shared_history(
    responder: &PartyId,
    request: &ReconcileRequest,
    history: Vec<FinalizedTransaction>,
) -> Vec<FinalizedTransaction> {
    let required = [request.initiator, request.counterpart, *responder];
    history
        .into_iter()
        .filter(|tx| tx.involves_all(required.iter()))
        .collect()
}

/// Serves reconciliation requests from a node's local ledger.
#[derive(Clone)]
pub struct ReconcileResponder {
    identity: PartyId,
    ledger: Arc<dyn TransactionLogEffects>,
}

impl ReconcileResponder {
    pub fn new(identity: PartyId, ledger: Arc<dyn TransactionLogEffects>) -> Self {
        Self { identity, ledger }
    }

    pub fn identity(&self) -> PartyId {
        self.identity
    }

    /// Answer one request.
    pub async fn respond(&self, request: &ReconcileRequest) -> Result<ReconcileResponse> {
        if request.schema_version != WIRE_SCHEMA_VERSION {
            tracing::warn!(
                initiator = %request.initiator,
                schema_version = request.schema_version,
                "Refusing reconciliation request with unsupported schema"
            );
            return Ok(ReconcileResponse::Refused {
                reason: format!("unsupported schema version {}", request.schema_version),
            });
        }
        if request.initiator == request.counterpart || request.initiator == self.identity {
            return Ok(ReconcileResponse::Refused {
                reason: "initiator must differ from counterpart and responder".to_string(),
            });
        }

        let history = self.ledger.transactions().await?;
        let total = history.len();
        let shared = shared_history(&self.identity, request, history);

        tracing::debug!(
            responder = %self.identity,
            initiator = %request.initiator,
            counterpart = %request.counterpart,
            total,
            shared = shared.len(),
            "Served reconciliation request"
        );
        Ok(ReconcileResponse::Transactions(shared))
    }
}
