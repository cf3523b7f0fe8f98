//! Orchestration against in-memory collaborators.

use accord_cache::MembershipCache;
use accord_core::effects::{MembershipStoreEffects, TransactionLogEffects};
use accord_core::{MembershipError, MembershipStatus, OrchestratorConfig};
use accord_effects::{MemoryMembershipStore, MemoryTransactionLog};
use accord_lifecycle::{AuthorityOrchestrator, LifecycleEffects};
use accord_testkit::fixtures::{party, RecordBuilder};
use accord_testkit::{init_test_tracing, InMemoryOracle, ManualClock, RecordingNotifier};
use assert_matches::assert_matches;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn concurrent_transitions_on_one_version_have_a_single_winner() {
    init_test_tracing();

    let active = RecordBuilder::new(party(1), party(0)).active().build();
    let store = MemoryMembershipStore::with_records(vec![active.clone()]);
    let ledger = MemoryTransactionLog::new();
    // Latency keeps both submissions in flight at the same time.
    let oracle = InMemoryOracle::with_latency(Duration::from_millis(10));
    let effects = LifecycleEffects::new(
        Arc::new(store.clone()),
        Arc::new(oracle.clone()),
        Arc::new(ledger.clone()),
        Arc::new(ManualClock::new(5_000)),
    );

    let first = AuthorityOrchestrator::new(
        party(0),
        effects.clone(),
        Arc::new(RecordingNotifier::new()),
        OrchestratorConfig::default(),
    );
    // A different clock makes the competing transition distinct.
    let second = AuthorityOrchestrator::new(
        party(0),
        LifecycleEffects {
            clock: Arc::new(ManualClock::new(5_001)),
            ..effects
        },
        Arc::new(RecordingNotifier::new()),
        OrchestratorConfig::default(),
    );

    let (a, b) = tokio::join!(first.revoke(&active), second.revoke(&active));
    let outcomes = [a, b];

    let accepted: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    let rejected: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert_matches!(
        rejected[0],
        MembershipError::OracleRejection { consumed, .. } if *consumed == active.version_ref()
    );

    assert_eq!(ledger.transactions().await.unwrap().len(), 1);
    assert_eq!(
        store.record(&active.record_id).await.unwrap().map(|r| r.status),
        Some(MembershipStatus::Revoked)
    );
}

#[tokio::test]
async fn loser_rereads_and_retries() {
    let pending = RecordBuilder::new(party(1), party(0)).build();
    let store = MemoryMembershipStore::with_records(vec![pending.clone()]);
    let clock = ManualClock::new(2_000);
    let orchestrator = AuthorityOrchestrator::new(
        party(0),
        LifecycleEffects::new(
            Arc::new(store),
            Arc::new(InMemoryOracle::new()),
            Arc::new(MemoryTransactionLog::new()),
            Arc::new(clock.clone()),
        ),
        Arc::new(RecordingNotifier::new()),
        OrchestratorConfig::default(),
    )
    .with_cache(Arc::new(MembershipCache::new()));

    orchestrator.activate(&pending).await.unwrap();
    let err = orchestrator.revoke(&pending).await.unwrap_err();
    assert!(err.is_retryable());

    clock.advance_ms(1);
    let current = orchestrator
        .current_version(&pending.record_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.status, MembershipStatus::Active);
    let revoked = orchestrator.revoke(&current).await.unwrap();
    assert_eq!(revoked.status, MembershipStatus::Revoked);
    assert!(revoked.modified > current.modified);
}

#[tokio::test]
async fn reactivation_after_revocation() {
    let active = RecordBuilder::new(party(1), party(0)).active().build();
    let cache = Arc::new(MembershipCache::new());
    cache.load(vec![active.clone()], None);
    let orchestrator = AuthorityOrchestrator::new(
        party(0),
        LifecycleEffects::new(
            Arc::new(MemoryMembershipStore::with_records(vec![active.clone()])),
            Arc::new(InMemoryOracle::new()),
            Arc::new(MemoryTransactionLog::new()),
            Arc::new(ManualClock::new(3_000)),
        ),
        Arc::new(RecordingNotifier::new()),
        OrchestratorConfig::default(),
    )
    .with_cache(cache.clone());

    orchestrator.revoke_for_member(&party(1)).await.unwrap();
    assert_eq!(cache.lookup(&party(1)), None);

    // Cache miss falls through to the store for the revoked version.
    let reactivated = orchestrator.activate_for_member(&party(1)).await.unwrap();
    assert_eq!(reactivated.status, MembershipStatus::Active);
    assert_eq!(cache.lookup(&party(1)), Some(reactivated));
}
