//! Transition finalization
//!
//! Validate, order through the uniqueness oracle under a bounded wait, then
//! persist. Nothing is written before the oracle accepts, so a flow dropped
//! before submission leaves no trace. Once the oracle accepts, the version
//! is final: local writes are retried, and a version that still cannot be
//! written is held in [`UnsettledWrites`](crate::effects::UnsettledWrites)
//! until [`settle`] lands it.

use crate::effects::LifecycleEffects;
use crate::validation::validate_transition;
use accord_core::effects::OracleVerdict;
use accord_core::{
    FinalizedTransaction, MembershipError, MembershipRecord, OrchestratorConfig, RecordId, Result,
    Transition,
};

/// Finalize `transition`, returning the ledger entry it produced.
pub(crate) async fn finalize(
    effects: &LifecycleEffects,
    transition: Transition,
    config: &OrchestratorConfig,
) -> Result<FinalizedTransaction> {
    let record_id = transition.successor.record_id;

    if let Err(err) = validate_transition(&transition) {
        tracing::debug!(
            record = %record_id,
            kind = %transition.kind,
            rule = %err,
            "Transition rejected by validation"
        );
        return Err(err.into());
    }

    let finalized = FinalizedTransaction::new(transition)?;
    let consumed = finalized.transition.consumed_ref();
    let timeout_ms = u64::try_from(config.oracle_timeout().as_millis()).unwrap_or(u64::MAX);
    let verdict = tokio::time::timeout(
        config.oracle_timeout(),
        effects.oracle.submit(&finalized.transition),
    )
    .await
    .map_err(|_| {
        tracing::warn!(
            record = %record_id,
            consumed = %consumed,
            timeout_ms,
            "Uniqueness oracle timed out; current version must be re-read"
        );
        MembershipError::OracleTimeout {
            consumed,
            timeout_ms,
        }
    })??;

    match verdict {
        OracleVerdict::Accepted { id } if id == finalized.id => {
            tracing::debug!(
                record = %record_id,
                tx = %id.short(),
                kind = %finalized.transition.kind,
                "Oracle accepted transition"
            );
        }
        OracleVerdict::Accepted { id } => {
            // An acceptance naming another transaction means that one won.
            tracing::warn!(
                record = %record_id,
                consumed = %consumed,
                submitted = %finalized.id.short(),
                accepted = %id.short(),
                "Oracle accepted a different transaction for this version"
            );
            return Err(MembershipError::OracleRejection {
                consumed,
                consumed_by: id,
            });
        }
        OracleVerdict::Rejected { consumed_by } => {
            tracing::info!(
                record = %record_id,
                consumed = %consumed,
                consumed_by = %consumed_by,
                "Oracle rejected transition"
            );
            return Err(MembershipError::OracleRejection {
                consumed,
                consumed_by,
            });
        }
    }

    persist(effects, &finalized, config).await?;

    tracing::info!(
        record = %record_id,
        tx = %finalized.id.short(),
        kind = %finalized.transition.kind,
        status = %finalized.transition.successor.status,
        "Membership transition finalized"
    );
    Ok(finalized)
}

/// Write an accepted transaction to the store and ledger, retrying on failure.
///
/// On exhaustion the transaction is held as unsettled and `Unpersisted`
/// carries the finalized successor back to the caller.
async fn persist(
    effects: &LifecycleEffects,
    finalized: &FinalizedTransaction,
    config: &OrchestratorConfig,
) -> Result<()> {
    let mut last_error = String::from("no attempt made");
    for attempt in 1..=config.persist_attempts {
        if attempt > 1 {
            tokio::time::sleep(config.persist_backoff()).await;
        }
        match write_locally(effects, finalized).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::warn!(
                    record = %finalized.transition.successor.record_id,
                    tx = %finalized.id.short(),
                    attempt,
                    error = %err,
                    "Local write of accepted transition failed"
                );
                last_error = err.to_string();
            }
        }
    }

    tracing::error!(
        record = %finalized.transition.successor.record_id,
        tx = %finalized.id.short(),
        attempts = config.persist_attempts,
        "Accepted transition held as unsettled"
    );
    effects.unsettled.hold(finalized.clone());
    Err(MembershipError::Unpersisted {
        record: Box::new(finalized.transition.successor.clone()),
        message: last_error,
    })
}

async fn write_locally(effects: &LifecycleEffects, finalized: &FinalizedTransaction) -> Result<()> {
    effects
        .store
        .append(finalized.transition.successor.clone())
        .await?;
    effects.ledger.insert(finalized.clone()).await?;
    Ok(())
}

/// Latest finalized version of `record_id` still waiting for its local write.
///
/// Retries the write once; the held version is returned whether or not that
/// attempt lands, since it supersedes whatever the store holds.
pub(crate) async fn settle(
    effects: &LifecycleEffects,
    record_id: &RecordId,
) -> Option<MembershipRecord> {
    let held = effects.unsettled.get(record_id)?;
    match write_locally(effects, &held).await {
        Ok(()) => {
            effects.unsettled.settle(record_id, &held.id);
            tracing::info!(
                record = %record_id,
                tx = %held.id.short(),
                "Unsettled transition persisted"
            );
        }
        Err(err) => {
            tracing::warn!(
                record = %record_id,
                error = %err,
                "Unsettled transition still not persisted"
            );
        }
    }
    Some(held.transition.successor)
}
