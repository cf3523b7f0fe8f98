//! Initiator side of reconciliation
//!
//! Recovers the history this node shares with a counterpart and merges it
//! into the local ledger.
//!
//! ## Protocol
//! 1. Request `{initiator, counterpart}` from the counterpart, retrying up
//!    to `max_attempts` with a fixed backoff, each attempt bounded by
//!    `request_timeout`
//! 2. If the counterpart stays unreachable, ask each fallback participant
//!    in turn under the same retry policy
//! 3. Drop returned transactions whose content does not match their id or
//!    that fail the participation predicate
//! 4. Merge the rest keyed by transaction id; already-held entries are skipped
//!
//! When no source answers the run fails with `UnreachablePeer`. An answer
//! from a fallback never clears the counterpart's failure: the report stays
//! partial, since a fallback only holds transactions it participates in
//! itself. Nothing is ever synthesized locally.

use accord_core::effects::{PeerTransportEffects, TransactionLogEffects};
use accord_core::{
    FinalizedTransaction, MembershipError, PartyId, ReconcileConfig, ReconcileRequest,
    ReconcileResponse, Result,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome of reconciling with one counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub counterpart: PartyId,
    /// Peer that actually answered: the counterpart or a fallback participant
    pub source: PartyId,
    /// Requests sent across all sources
    pub attempts: u32,
    pub received: usize,
    pub merged: usize,
    pub already_held: usize,
    /// Transactions dropped as inconsistent or outside the shared slice
    pub rejected: usize,
    /// Why the counterpart itself could not answer, when a fallback did
    pub counterpart_failure: Option<MembershipError>,
}

impl ReconcileReport {
    pub fn used_fallback(&self) -> bool {
        self.source != self.counterpart
    }

    /// Whether history held only by the counterpart may still be missing.
    pub fn is_partial(&self) -> bool {
        self.counterpart_failure.is_some()
    }
}

/// Outcome of reconciling with a set of counterparts.
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub reports: Vec<ReconcileReport>,
    /// Counterparts that could not answer themselves
    pub failures: Vec<(PartyId, MembershipError)>,
}

impl ReconcileSummary {
    /// Whether every counterpart answered for its own history.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.reports.iter().any(ReconcileReport::is_partial)
    }

    pub fn merged(&self) -> usize {
        self.reports.iter().map(|report| report.merged).sum()
    }
}

/// Reconciliation initiator for one node.
#[derive(Clone)]
pub struct Reconciler {
    identity: PartyId,
    ledger: Arc<dyn TransactionLogEffects>,
    transport: Arc<dyn PeerTransportEffects>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        identity: PartyId,
        ledger: Arc<dyn TransactionLogEffects>,
        transport: Arc<dyn PeerTransportEffects>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            identity,
            ledger,
            transport,
            config,
        }
    }

    /// Reconcile with `counterpart` only.
    pub async fn reconcile(&self, counterpart: PartyId) -> Result<ReconcileReport> {
        self.reconcile_with_fallback(counterpart, &[]).await
    }

    /// Reconcile with `counterpart`, falling back to `alternates` if it is unreachable.
    pub async fn reconcile_with_fallback(
        &self,
        counterpart: PartyId,
        alternates: &[PartyId],
    ) -> Result<ReconcileReport> {
        let request = ReconcileRequest::new(self.identity, counterpart);
        let mut attempts = 0u32;
        let mut last_error = None;
        let mut counterpart_failure = None;

        let sources = std::iter::once(counterpart).chain(
            alternates
                .iter()
                .copied()
                .filter(|peer| *peer != counterpart && *peer != self.identity),
        );

        for source in sources {
            match self.fetch(source, &request, &mut attempts).await {
                Ok(transactions) => {
                    let mut report = self.merge(counterpart, source, attempts, transactions).await?;
                    report.counterpart_failure = counterpart_failure;
                    if report.is_partial() {
                        tracing::warn!(
                            counterpart = %counterpart,
                            source = %source,
                            attempts,
                            merged = report.merged,
                            "Reconciliation answered by fallback only"
                        );
                    } else {
                        tracing::info!(
                            counterpart = %counterpart,
                            source = %source,
                            attempts,
                            merged = report.merged,
                            already_held = report.already_held,
                            rejected = report.rejected,
                            "Reconciliation complete"
                        );
                    }
                    return Ok(report);
                }
                Err(MembershipError::UnreachablePeer { reason, .. }) => {
                    tracing::warn!(
                        counterpart = %counterpart,
                        source = %source,
                        reason = %reason,
                        "Reconciliation source unavailable"
                    );
                    if source == counterpart {
                        counterpart_failure = Some(MembershipError::unreachable(
                            counterpart,
                            attempts,
                            reason.clone(),
                        ));
                    }
                    last_error = Some(reason);
                }
                Err(err) => return Err(err),
            }
        }

        Err(MembershipError::unreachable(
            counterpart,
            attempts,
            last_error.unwrap_or_else(|| "no source available".to_string()),
        ))
    }

    /// Reconcile with every peer.
    ///
    /// Fallbacks for a counterpart are the listed peers known, from the
    /// local ledger, to share transactions with both this node and the
    /// counterpart. Per-peer failures are collected, never fatal to the run;
    /// a counterpart answered for only by a fallback is also listed as failed.
    pub async fn reconcile_all(&self, peers: &[PartyId]) -> ReconcileSummary {
        let held = match self.ledger.transactions().await {
            Ok(held) => held,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Local ledger unavailable; reconciling without fallbacks"
                );
                Vec::new()
            }
        };

        let mut summary = ReconcileSummary::default();
        let counterparts = peers.iter().copied().filter(|peer| *peer != self.identity);
        for counterpart in counterparts {
            let alternates = co_participants(&held, self.identity, counterpart, peers);
            match self.reconcile_with_fallback(counterpart, &alternates).await {
                Ok(report) => {
                    if let Some(failure) = &report.counterpart_failure {
                        summary.failures.push((counterpart, failure.clone()));
                    }
                    summary.reports.push(report);
                }
                Err(err) => summary.failures.push((counterpart, err)),
            }
        }

        if !summary.is_complete() {
            tracing::warn!(
                reconciled = summary.reports.len(),
                failed = summary.failures.len(),
                "Reconciliation run finished with partial failures"
            );
        }
        summary
    }

    /// Ask one source, retrying retryable failures.
    async fn fetch(
        &self,
        source: PartyId,
        request: &ReconcileRequest,
        attempts: &mut u32,
    ) -> Result<Vec<FinalizedTransaction>> {
        let mut reason = String::from("no attempt made");
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_backoff()).await;
            }
            *attempts += 1;

            let outcome = tokio::time::timeout(
                self.config.request_timeout(),
                self.transport.request_shared_history(source, request.clone()),
            )
            .await;

            match outcome {
                Ok(Ok(ReconcileResponse::Transactions(transactions))) => return Ok(transactions),
                Ok(Ok(ReconcileResponse::Refused { reason })) => {
                    return Err(MembershipError::unreachable(
                        source,
                        attempt,
                        format!("refused: {reason}"),
                    ));
                }
                Ok(Err(err)) if err.is_retryable() => {
                    tracing::debug!(
                        source = %source,
                        attempt,
                        error = %err,
                        "Reconciliation request failed"
                    );
                    reason = err.to_string();
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    tracing::debug!(source = %source, attempt, "Reconciliation request timed out");
                    reason = "request timed out".to_string();
                }
            }
        }
        Err(MembershipError::unreachable(
            source,
            self.config.max_attempts,
            reason,
        ))
    }

    async fn merge(
        &self,
        counterpart: PartyId,
        source: PartyId,
        attempts: u32,
        transactions: Vec<FinalizedTransaction>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport {
            counterpart,
            source,
            attempts,
            received: transactions.len(),
            merged: 0,
            already_held: 0,
            rejected: 0,
            counterpart_failure: None,
        };
        let required = [self.identity, counterpart, source];

        for tx in transactions {
            if !tx.is_consistent() || !tx.involves_all(required.iter()) {
                tracing::warn!(
                    source = %source,
                    tx = %tx.id.short(),
                    "Dropping transaction outside the shared history"
                );
                report.rejected += 1;
                continue;
            }
            if self.ledger.insert(tx).await? {
                report.merged += 1;
            } else {
                report.already_held += 1;
            }
        }
        Ok(report)
    }
}

/// Listed peers that share at least one held transaction with both `identity`
/// and `counterpart`.
fn co_participants(
    held: &[FinalizedTransaction],
    identity: PartyId,
    counterpart: PartyId,
    peers: &[PartyId],
) -> Vec<PartyId> {
    let listed: BTreeSet<PartyId> = peers.iter().copied().collect();
    let mut found = BTreeSet::new();
    let shared = held
        .iter()
        .filter(|tx| tx.involves_all([&identity, &counterpart]));
    for tx in shared {
        found.extend(tx.participants.iter().copied().filter(|party| {
            *party != identity && *party != counterpart && listed.contains(party)
        }));
    }
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_testkit::fixtures::party;

    fn report(counterpart: u8, source: u8) -> ReconcileReport {
        ReconcileReport {
            counterpart: party(counterpart),
            source: party(source),
            attempts: 1,
            received: 0,
            merged: 0,
            already_held: 0,
            rejected: 0,
            counterpart_failure: None,
        }
    }

    #[test]
    fn partial_report_keeps_summary_incomplete() {
        let mut fallback = report(0, 2);
        fallback.counterpart_failure = Some(MembershipError::unreachable(party(0), 3, "down"));
        assert!(fallback.used_fallback());
        assert!(fallback.is_partial());

        let summary = ReconcileSummary {
            reports: vec![report(3, 3), fallback],
            failures: Vec::new(),
        };
        assert!(!summary.is_complete());

        let summary = ReconcileSummary {
            reports: vec![report(3, 3)],
            failures: Vec::new(),
        };
        assert!(summary.is_complete());
    }

    #[test]
    fn two_party_history_offers_no_fallback() {
        use accord_testkit::fixtures::{request, RecordBuilder};

        let pending = RecordBuilder::new(party(1), party(0)).build();
        let held = vec![FinalizedTransaction::new(request(&pending)).unwrap()];
        let peers = [party(0), party(2)];

        for counterpart in [party(0), party(2)] {
            assert!(co_participants(&held, party(1), counterpart, &peers).is_empty());
        }
    }
}
