//! Authority orchestrator
//!
//! The network authority is the only identity that drives `Activate` and
//! `Revoke`. Each operation:
//!
//! 1. verifies the caller is the record's authority
//! 2. builds the successor with a monotonic `modified` stamp
//! 3. validates the transition
//! 4. submits it to the uniqueness oracle, bounded by `oracle_timeout`
//! 5. persists the finalized version and transaction
//! 6. updates the local cache and fans out notifications on a detached task
//!
//! Step 6 is fire-and-forget. A timeout at step 4 leaves the outcome
//! unknown; callers resolve it with [`AuthorityOrchestrator::current_version`].
//! A version accepted at step 4 but not written at step 5 is still announced,
//! and `current_version` resolves to it until the write lands.

use crate::authority::{find_record, verify_authority};
use crate::commit::{finalize, settle};
use crate::dispatch::spawn_notifications;
use crate::effects::LifecycleEffects;
use crate::validation::validate_transition;
use accord_cache::MembershipCache;
use accord_core::effects::{CosignEffects, NotificationEffects};
use accord_core::{
    MembershipError, MembershipNotification, MembershipRecord, MembershipStatus,
    OrchestratorConfig, PartyId, RecordId, Result, Transition, TransitionKind,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Authority-side lifecycle service.
pub struct AuthorityOrchestrator {
    identity: PartyId,
    effects: LifecycleEffects,
    notifier: Arc<dyn NotificationEffects>,
    cache: Option<Arc<MembershipCache>>,
    config: OrchestratorConfig,
}

impl AuthorityOrchestrator {
    /// Create an orchestrator acting as `identity`.
    pub fn new(
        identity: PartyId,
        effects: LifecycleEffects,
        notifier: Arc<dyn NotificationEffects>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            identity,
            effects,
            notifier,
            cache: None,
            config,
        }
    }

    /// Use `cache` for member lookups and keep it current after each transition.
    pub fn with_cache(mut self, cache: Arc<MembershipCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn identity(&self) -> PartyId {
        self.identity
    }

    /// Activate a pending or revoked record version.
    pub async fn activate(&self, record: &MembershipRecord) -> Result<MembershipRecord> {
        self.drive(TransitionKind::Activate, record).await
    }

    /// Revoke a record version.
    pub async fn revoke(&self, record: &MembershipRecord) -> Result<MembershipRecord> {
        self.drive(TransitionKind::Revoke, record).await
    }

    /// Look up `member`'s current record and activate it.
    pub async fn activate_for_member(&self, member: &PartyId) -> Result<MembershipRecord> {
        let record = self.find(member).await?;
        self.activate(&record).await
    }

    /// Look up `member`'s current record and revoke it.
    pub async fn revoke_for_member(&self, member: &PartyId) -> Result<MembershipRecord> {
        let record = self.find(member).await?;
        self.revoke(&record).await
    }

    /// Authoritative current version of a record.
    ///
    /// Used to resolve an `OracleTimeout` or to re-read after an
    /// `OracleRejection` before deciding whether to retry.
    pub async fn current_version(&self, record_id: &RecordId) -> Result<Option<MembershipRecord>> {
        if let Some(record) = settle(&self.effects, record_id).await {
            return Ok(Some(record));
        }
        self.effects.store.record(record_id).await
    }

    async fn find(&self, member: &PartyId) -> Result<MembershipRecord> {
        let record = find_record(member, self.cache.as_deref(), self.effects.store.as_ref())
            .await?;
        Ok(settle(&self.effects, &record.record_id)
            .await
            .unwrap_or(record))
    }

    async fn drive(
        &self,
        kind: TransitionKind,
        record: &MembershipRecord,
    ) -> Result<MembershipRecord> {
        verify_authority(&self.identity, record)?;

        let status = match kind {
            TransitionKind::Activate => MembershipStatus::Active,
            TransitionKind::Revoke => MembershipStatus::Revoked,
            other => return Err(MembershipError::UnsupportedTransition(other.to_string())),
        };

        let now = self.effects.clock.physical_time().await;
        let successor = record.with_status(status, record.next_modified(now));
        let transition = Transition::new(kind, Some(record.clone()), successor, [self.identity]);

        match finalize(&self.effects, transition, &self.config).await {
            Ok(finalized) => {
                let successor = finalized.transition.successor;
                self.publish(kind, &successor).await;
                Ok(successor)
            }
            Err(MembershipError::Unpersisted { record, message }) => {
                // Final at the oracle, so peers must still hear about it.
                self.publish(kind, &record).await;
                Err(MembershipError::Unpersisted { record, message })
            }
            Err(err) => Err(err),
        }
    }

    /// Apply a finalized version locally, then announce it.
    async fn publish(&self, kind: TransitionKind, successor: &MembershipRecord) {
        if let Some(cache) = &self.cache {
            match kind {
                TransitionKind::Revoke => {
                    cache.apply_revocation_of(successor);
                }
                _ => {
                    cache.apply_activation(successor);
                }
            }
        }
        self.announce(kind, successor).await;
    }

    /// Notify every known active member plus the subject of the change.
    async fn announce(&self, kind: TransitionKind, record: &MembershipRecord) {
        let listing = self.effects.store.all_active_records().await;
        let mut recipients: BTreeSet<PartyId> = match listing {
            Ok(records) => records.into_iter().map(|r| r.member).collect(),
            Err(err) => {
                // Fall back to the local view; delivery is best-effort anyway.
                tracing::warn!(
                    error = %err,
                    "Active member listing unavailable for notification"
                );
                self.cache
                    .as_ref()
                    .map(|cache| cache.active_members().into_iter().collect())
                    .unwrap_or_default()
            }
        };
        recipients.insert(record.member);
        recipients.remove(&self.identity);

        spawn_notifications(
            self.notifier.clone(),
            recipients,
            MembershipNotification::new(kind, record.clone()),
        );
    }
}

#[async_trait]
impl CosignEffects for AuthorityOrchestrator {
    /// Co-sign a member-initiated `Request` or `Amend`.
    ///
    /// Refuses authority-only kinds, records managed by another authority
    /// and transitions that would not validate once co-signed.
    async fn cosign(&self, transition: &Transition) -> Result<PartyId> {
        if transition.kind.is_authority_only() {
            return Err(MembershipError::UnsupportedTransition(format!(
                "{} cannot be co-signed",
                transition.kind
            )));
        }
        verify_authority(&self.identity, &transition.successor)?;

        let signed = transition.clone().sign(self.identity);
        validate_transition(&signed)?;

        tracing::debug!(
            record = %transition.successor.record_id,
            member = %transition.successor.member,
            kind = %transition.kind,
            "Co-signed member transition"
        );
        Ok(self.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_core::effects::{MembershipStoreEffects, OracleVerdict, UniquenessOracle};
    use accord_core::TransactionId;
    use accord_effects::{MemoryMembershipStore, MemoryTransactionLog};
    use accord_testkit::fixtures::{party, RecordBuilder};
    use accord_testkit::{InMemoryOracle, ManualClock, RecordingNotifier};
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Harness {
        store: MemoryMembershipStore,
        ledger: MemoryTransactionLog,
        oracle: InMemoryOracle,
        notifier: RecordingNotifier,
        cache: Arc<MembershipCache>,
        orchestrator: AuthorityOrchestrator,
    }

    fn harness(records: Vec<MembershipRecord>) -> Harness {
        let store = MemoryMembershipStore::with_records(records);
        let ledger = MemoryTransactionLog::new();
        let oracle = InMemoryOracle::new();
        let notifier = RecordingNotifier::new();
        let cache = Arc::new(MembershipCache::new());
        let effects = LifecycleEffects::new(
            Arc::new(store.clone()),
            Arc::new(oracle.clone()),
            Arc::new(ledger.clone()),
            Arc::new(ManualClock::new(5_000)),
        );
        let orchestrator = AuthorityOrchestrator::new(
            party(0),
            effects,
            Arc::new(notifier.clone()),
            OrchestratorConfig::default(),
        )
        .with_cache(cache.clone());
        Harness {
            store,
            ledger,
            oracle,
            notifier,
            cache,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn activate_finalizes_and_notifies() {
        let pending = RecordBuilder::new(party(1), party(0)).build();
        let bystander = RecordBuilder::new(party(2), party(0)).active().build();
        let h = harness(vec![pending.clone(), bystander]);

        let active = h.orchestrator.activate(&pending).await.unwrap();
        assert_eq!(active.status, MembershipStatus::Active);
        assert_eq!(active.metadata, pending.metadata);
        assert_eq!(active.modified.ts_ms, 5_000);

        assert_eq!(
            h.store.record(&pending.record_id).await.unwrap(),
            Some(active.clone())
        );
        assert_eq!(h.ledger.len(), 1);
        assert_eq!(h.cache.lookup(&party(1)), Some(active));

        assert!(h.notifier.wait_for(2, Duration::from_secs(1)).await);
        let recipients = h.notifier.recipients();
        assert!(recipients.contains(&party(1)));
        assert!(recipients.contains(&party(2)));
        assert!(!recipients.contains(&party(0)));
    }

    #[tokio::test]
    async fn non_authority_cannot_activate() {
        let pending = RecordBuilder::new(party(1), party(9)).build();
        let h = harness(vec![pending.clone()]);

        assert_matches!(
            h.orchestrator.activate(&pending).await,
            Err(MembershipError::NotAuthority { authority, .. }) if authority == party(9)
        );
        assert_eq!(h.oracle.submission_count(), 0);
        assert!(h.ledger.is_empty());
    }

    #[tokio::test]
    async fn validation_failure_is_surfaced_before_submission() {
        let active = RecordBuilder::new(party(1), party(0)).active().build();
        let h = harness(vec![active.clone()]);

        assert_matches!(
            h.orchestrator.activate(&active).await,
            Err(MembershipError::Validation(_))
        );
        assert_eq!(h.oracle.submission_count(), 0);
    }

    #[tokio::test]
    async fn stale_version_is_rejected_by_oracle() {
        let pending = RecordBuilder::new(party(1), party(0)).build();
        let h = harness(vec![pending.clone()]);

        h.orchestrator.activate(&pending).await.unwrap();
        // Same predecessor again: revoke competes with the finalized activation.
        assert_matches!(
            h.orchestrator.revoke(&pending).await,
            Err(MembershipError::OracleRejection { consumed, .. })
                if consumed == pending.version_ref()
        );
    }

    #[tokio::test]
    async fn revoke_for_member_removes_from_cache() {
        let active = RecordBuilder::new(party(1), party(0)).active().build();
        let h = harness(vec![active.clone()]);
        h.cache.load(vec![active.clone()], None);

        let revoked = h.orchestrator.revoke_for_member(&party(1)).await.unwrap();
        assert_eq!(revoked.status, MembershipStatus::Revoked);
        assert_eq!(h.cache.lookup(&party(1)), None);
    }

    #[tokio::test]
    async fn unknown_member_is_not_found() {
        let h = harness(Vec::new());
        assert_matches!(
            h.orchestrator.activate_for_member(&party(4)).await,
            Err(MembershipError::MembershipNotFound(p)) if p == party(4)
        );
    }

    #[tokio::test]
    async fn oracle_timeout_is_resolved_by_rereading() {
        let pending = RecordBuilder::new(party(1), party(0)).build();
        let store = MemoryMembershipStore::with_records(vec![pending.clone()]);
        let oracle = InMemoryOracle::new();
        oracle.stall();
        let orchestrator = AuthorityOrchestrator::new(
            party(0),
            LifecycleEffects::new(
                Arc::new(store),
                Arc::new(oracle.clone()),
                Arc::new(MemoryTransactionLog::new()),
                Arc::new(ManualClock::new(5_000)),
            ),
            Arc::new(RecordingNotifier::new()),
            OrchestratorConfig {
                oracle_timeout_ms: 20,
                ..OrchestratorConfig::default()
            },
        );

        let err = orchestrator.activate(&pending).await.unwrap_err();
        assert_matches!(err, MembershipError::OracleTimeout { timeout_ms: 20, .. });
        assert!(err.is_retryable());

        let current = orchestrator
            .current_version(&pending.record_id)
            .await
            .unwrap();
        assert_eq!(current, Some(pending));
    }

    /// Store whose next `failures` appends fail.
    #[derive(Clone)]
    struct FlakyStore {
        inner: MemoryMembershipStore,
        failures: Arc<AtomicU32>,
    }

    #[async_trait]
    impl MembershipStoreEffects for FlakyStore {
        async fn current_record(&self, member: &PartyId) -> Result<Option<MembershipRecord>> {
            self.inner.current_record(member).await
        }

        async fn record(&self, record_id: &RecordId) -> Result<Option<MembershipRecord>> {
            self.inner.record(record_id).await
        }

        async fn all_active_records(&self) -> Result<Vec<MembershipRecord>> {
            self.inner.all_active_records().await
        }

        async fn append(&self, record: MembershipRecord) -> Result<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(MembershipError::store("disk full"));
            }
            self.inner.append(record).await
        }
    }

    fn flaky_harness(records: Vec<MembershipRecord>, failures: u32) -> (Harness, FlakyStore) {
        let store = MemoryMembershipStore::with_records(records);
        let flaky = FlakyStore {
            inner: store.clone(),
            failures: Arc::new(AtomicU32::new(failures)),
        };
        let ledger = MemoryTransactionLog::new();
        let oracle = InMemoryOracle::new();
        let notifier = RecordingNotifier::new();
        let cache = Arc::new(MembershipCache::new());
        let orchestrator = AuthorityOrchestrator::new(
            party(0),
            LifecycleEffects::new(
                Arc::new(flaky.clone()),
                Arc::new(oracle.clone()),
                Arc::new(ledger.clone()),
                Arc::new(ManualClock::new(5_000)),
            ),
            Arc::new(notifier.clone()),
            OrchestratorConfig {
                persist_attempts: 3,
                persist_backoff_ms: 1,
                ..OrchestratorConfig::default()
            },
        )
        .with_cache(cache.clone());
        let harness = Harness {
            store,
            ledger,
            oracle,
            notifier,
            cache,
            orchestrator,
        };
        (harness, flaky)
    }

    #[tokio::test]
    async fn transient_store_failure_after_acceptance_is_retried() {
        let pending = RecordBuilder::new(party(1), party(0)).build();
        let (h, _flaky) = flaky_harness(vec![pending.clone()], 1);

        let active = h.orchestrator.activate(&pending).await.unwrap();
        assert_eq!(
            h.store.record(&pending.record_id).await.unwrap(),
            Some(active)
        );
        assert_eq!(h.ledger.len(), 1);
        assert_eq!(h.oracle.submission_count(), 1);
    }

    #[tokio::test]
    async fn unwritten_acceptance_resolves_through_current_version() {
        let pending = RecordBuilder::new(party(1), party(0)).build();
        let (h, flaky) = flaky_harness(vec![pending.clone()], 10);

        let err = h.orchestrator.activate(&pending).await.unwrap_err();
        let active = assert_matches!(err, MembershipError::Unpersisted { record, .. } => *record);
        assert_eq!(active.status, MembershipStatus::Active);
        assert_eq!(
            h.store.record(&pending.record_id).await.unwrap(),
            Some(pending.clone())
        );

        // Final at the oracle, so it is applied and announced anyway.
        assert_eq!(h.cache.lookup(&party(1)), Some(active.clone()));
        assert!(h.notifier.wait_for(1, Duration::from_secs(1)).await);

        // Still failing: the accepted version is reported, not the stored one.
        assert_eq!(
            h.orchestrator.current_version(&pending.record_id).await.unwrap(),
            Some(active.clone())
        );

        flaky.failures.store(0, Ordering::SeqCst);
        assert_eq!(
            h.orchestrator.current_version(&pending.record_id).await.unwrap(),
            Some(active.clone())
        );
        assert_eq!(
            h.store.record(&pending.record_id).await.unwrap(),
            Some(active)
        );
        assert_eq!(h.ledger.len(), 1);

        let revoked = h.orchestrator.revoke_for_member(&party(1)).await.unwrap();
        assert_eq!(revoked.status, MembershipStatus::Revoked);
    }

    /// Oracle that accepts some other transaction for every version.
    struct ForeignAcceptance;

    #[async_trait]
    impl UniquenessOracle for ForeignAcceptance {
        async fn submit(&self, _transition: &Transition) -> Result<OracleVerdict> {
            Ok(OracleVerdict::Accepted {
                id: TransactionId::digest(b"another transaction"),
            })
        }
    }

    #[tokio::test]
    async fn acceptance_naming_another_transaction_is_a_rejection() {
        let pending = RecordBuilder::new(party(1), party(0)).build();
        let store = MemoryMembershipStore::with_records(vec![pending.clone()]);
        let ledger = MemoryTransactionLog::new();
        let orchestrator = AuthorityOrchestrator::new(
            party(0),
            LifecycleEffects::new(
                Arc::new(store.clone()),
                Arc::new(ForeignAcceptance),
                Arc::new(ledger.clone()),
                Arc::new(ManualClock::new(5_000)),
            ),
            Arc::new(RecordingNotifier::new()),
            OrchestratorConfig::default(),
        );

        assert_matches!(
            orchestrator.activate(&pending).await,
            Err(MembershipError::OracleRejection { consumed_by, .. })
                if consumed_by == TransactionId::digest(b"another transaction")
        );
        assert!(ledger.is_empty());
        assert_eq!(
            store.record(&pending.record_id).await.unwrap(),
            Some(pending)
        );
    }

    #[tokio::test]
    async fn notification_failures_do_not_fail_the_operation() {
        let pending = RecordBuilder::new(party(1), party(0)).build();
        let h = harness(vec![pending.clone()]);
        h.notifier.set_unreachable(party(1));

        let active = h.orchestrator.activate(&pending).await.unwrap();
        assert_eq!(active.status, MembershipStatus::Active);
    }

    #[tokio::test]
    async fn cosign_rules() {
        let pending = RecordBuilder::new(party(1), party(0)).build();
        let h = harness(Vec::new());

        let proposal = Transition::new(TransitionKind::Request, None, pending.clone(), [party(1)]);
        assert_eq!(h.orchestrator.cosign(&proposal).await.unwrap(), party(0));

        let foreign = RecordBuilder::new(party(1), party(7)).build();
        let proposal = Transition::new(TransitionKind::Request, None, foreign, [party(1)]);
        assert_matches!(
            h.orchestrator.cosign(&proposal).await,
            Err(MembershipError::NotAuthority { .. })
        );

        let activation = accord_testkit::fixtures::activate(&pending, 2_000);
        assert_matches!(
            h.orchestrator.cosign(&activation).await,
            Err(MembershipError::UnsupportedTransition(_))
        );
    }
}
