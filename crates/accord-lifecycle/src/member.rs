//! Member-initiated flows
//!
//! `Request` and `Amend` are jointly signed: the member builds and signs the
//! transition, the authority co-signs it through [`CosignEffects`], then the
//! member finalizes it like any other transition.

use crate::commit::{finalize, settle};
use crate::dispatch::spawn_notifications;
use crate::effects::LifecycleEffects;
use accord_core::effects::{CosignEffects, NotificationEffects};
use accord_core::{
    MembershipError, MembershipMetadata, MembershipNotification, MembershipRecord,
    OrchestratorConfig, PartyId, Result, Transition, TransitionKind,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Member-side lifecycle service.
pub struct MemberFlows {
    identity: PartyId,
    effects: LifecycleEffects,
    cosigner: Arc<dyn CosignEffects>,
    notifier: Option<Arc<dyn NotificationEffects>>,
    config: OrchestratorConfig,
}

impl MemberFlows {
    pub fn new(
        identity: PartyId,
        effects: LifecycleEffects,
        cosigner: Arc<dyn CosignEffects>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            identity,
            effects,
            cosigner,
            notifier: None,
            config,
        }
    }

    /// Announce finalized amendments to active members.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationEffects>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn identity(&self) -> PartyId {
        self.identity
    }

    /// Ask `authority` to admit this member; returns the `PENDING` record.
    pub async fn request_membership(
        &self,
        authority: PartyId,
        metadata: MembershipMetadata,
    ) -> Result<MembershipRecord> {
        let now = self.effects.clock.physical_time().await;
        let record = MembershipRecord::pending(self.identity, authority, metadata, now);
        let transition = Transition::new(TransitionKind::Request, None, record, [self.identity]);

        self.cosign_and_finalize(transition).await
    }

    /// Replace the metadata of this member's active record.
    pub async fn amend_metadata(&self, metadata: MembershipMetadata) -> Result<MembershipRecord> {
        let current = self
            .effects
            .store
            .current_record(&self.identity)
            .await?
            .ok_or(MembershipError::MembershipNotFound(self.identity))?;
        let current = settle(&self.effects, &current.record_id)
            .await
            .unwrap_or(current);

        let now = self.effects.clock.physical_time().await;
        let successor = current.with_metadata(metadata, current.next_modified(now));
        let transition = Transition::new(
            TransitionKind::Amend,
            Some(current),
            successor,
            [self.identity],
        );

        let amended = self.cosign_and_finalize(transition).await?;
        if let Some(notifier) = &self.notifier {
            let recipients: BTreeSet<PartyId> = self
                .effects
                .store
                .all_active_records()
                .await
                .unwrap_or_else(|err| {
                    tracing::warn!(
                        error = %err,
                        "Active member listing unavailable for notification"
                    );
                    Vec::new()
                })
                .into_iter()
                .map(|record| record.member)
                .filter(|member| *member != self.identity)
                .collect();
            spawn_notifications(
                notifier.clone(),
                recipients,
                MembershipNotification::new(TransitionKind::Amend, amended.clone()),
            );
        }
        Ok(amended)
    }

    async fn cosign_and_finalize(&self, transition: Transition) -> Result<MembershipRecord> {
        let cosigner = self.cosigner.cosign(&transition).await?;
        let transition = transition.sign(cosigner);
        let finalized = finalize(&self.effects, transition, &self.config).await?;
        Ok(finalized.transition.successor)
    }
}
