//! Applying incoming membership notifications to the local cache.

use crate::cache::{CacheUpdate, MembershipCache};
use accord_core::effects::NotificationEffects;
use accord_core::{MembershipNotification, PartyId, Result, TransitionKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Routes notifications to the matching cache update.
///
/// Also usable directly as the local node's [`NotificationEffects`] sink, so
/// an in-process transport can deliver straight into a member's cache.
#[derive(Debug, Clone)]
pub struct NotificationHandler {
    local: PartyId,
    cache: Arc<MembershipCache>,
}

impl NotificationHandler {
    pub fn new(local: PartyId, cache: Arc<MembershipCache>) -> Self {
        Self { local, cache }
    }

    pub fn cache(&self) -> &Arc<MembershipCache> {
        &self.cache
    }

    /// Apply one notification. Returns `true` if the cache changed.
    pub fn apply(&self, notification: &MembershipNotification) -> bool {
        let record = &notification.record;
        let changed = match notification.transition_kind {
            TransitionKind::Activate => is_change(self.cache.apply_activation(record)),
            TransitionKind::Amend => is_change(self.cache.apply_amendment(record)),
            TransitionKind::Revoke => self.cache.apply_revocation_of(record),
            // Pending records are not eligible; nothing to cache.
            TransitionKind::Request => false,
        };

        tracing::debug!(
            node = %self.local,
            kind = %notification.transition_kind,
            member = %record.member,
            changed,
            "Applied membership notification"
        );
        changed
    }
}

fn is_change(update: CacheUpdate) -> bool {
    matches!(update, CacheUpdate::Inserted | CacheUpdate::Replaced)
}

#[async_trait]
impl NotificationEffects for NotificationHandler {
    async fn notify(
        &self,
        recipient: PartyId,
        notification: &MembershipNotification,
    ) -> Result<()> {
        if recipient != self.local {
            return Err(accord_core::MembershipError::notification(
                recipient,
                format!("delivered to {} instead", self.local),
            ));
        }
        self.apply(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_core::{MembershipStatus, PhysicalTime};
    use accord_testkit::fixtures::{party, RecordBuilder};

    fn handler() -> NotificationHandler {
        NotificationHandler::new(party(9), Arc::new(MembershipCache::new()))
    }

    #[test]
    fn activate_then_revoke() {
        let handler = handler();
        let active = RecordBuilder::new(party(1), party(0))
            .active()
            .modified(10)
            .build();
        let revoked = active.with_status(MembershipStatus::Revoked, PhysicalTime::from_millis(20));

        let activation = MembershipNotification::new(TransitionKind::Activate, active.clone());
        assert!(handler.apply(&activation));
        assert!(!handler.apply(&activation));
        assert_eq!(
            handler.cache().lookup(&active.member),
            Some(active.clone())
        );

        assert!(handler.apply(&MembershipNotification::new(TransitionKind::Revoke, revoked)));
        assert_eq!(handler.cache().lookup(&active.member), None);
    }

    #[test]
    fn request_notifications_are_ignored() {
        let handler = handler();
        let pending = RecordBuilder::new(party(1), party(0)).build();
        assert!(!handler.apply(&MembershipNotification::new(TransitionKind::Request, pending)));
        assert!(handler.cache().is_empty());
    }

    #[tokio::test]
    async fn misrouted_delivery_is_rejected() {
        let handler = handler();
        let active = RecordBuilder::new(party(1), party(0)).active().build();
        let notification = MembershipNotification::new(TransitionKind::Activate, active);

        assert!(handler.notify(party(3), &notification).await.is_err());
        assert!(handler.cache().is_empty());
        handler.notify(party(9), &notification).await.unwrap();
        assert_eq!(handler.cache().len(), 1);
    }
}
