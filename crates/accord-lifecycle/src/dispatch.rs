//! Fire-and-forget notification fan-out.

use accord_core::effects::NotificationEffects;
use accord_core::{MembershipNotification, PartyId};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Deliver `notification` to every recipient on a detached task.
///
/// Best-effort: one attempt per recipient, no retry, no backpressure.
/// Failures are logged and never reach the caller.
pub(crate) fn spawn_notifications(
    notifier: Arc<dyn NotificationEffects>,
    recipients: BTreeSet<PartyId>,
    notification: MembershipNotification,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let notifier = notifier.as_ref();
        let notification = &notification;
        let deliveries = recipients.iter().map(|recipient| async move {
            (*recipient, notifier.notify(*recipient, notification).await)
        });

        let mut failed = 0usize;
        for (recipient, outcome) in join_all(deliveries).await {
            if let Err(err) = outcome {
                failed += 1;
                tracing::warn!(
                    recipient = %recipient,
                    record = %notification.record.record_id,
                    error = %err,
                    "Membership notification not delivered"
                );
            }
        }

        tracing::debug!(
            kind = %notification.transition_kind,
            record = %notification.record.record_id,
            recipients = recipients.len(),
            failed,
            "Membership notification fan-out complete"
        );
    })
}
