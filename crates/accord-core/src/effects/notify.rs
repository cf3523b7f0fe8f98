//! Notification delivery.

use crate::errors::Result;
use crate::identifiers::PartyId;
use crate::wire::MembershipNotification;
use async_trait::async_trait;

/// Point-to-point delivery of membership notifications.
///
/// Delivery is best-effort and at most once per call; callers never retry.
#[async_trait]
pub trait NotificationEffects: Send + Sync {
    /// Deliver `notification` to `recipient`.
    async fn notify(&self, recipient: PartyId, notification: &MembershipNotification)
        -> Result<()>;
}
