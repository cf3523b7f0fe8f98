//! Notification fakes: recording, failing and routing sinks.

use accord_core::effects::NotificationEffects;
use accord_core::{MembershipError, MembershipNotification, PartyId, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Records every delivery; recipients in `unreachable` fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<(PartyId, MembershipNotification)>>>,
    unreachable: Arc<Mutex<BTreeSet<PartyId>>>,
    signal: Arc<Notify>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `party` fail.
    pub fn set_unreachable(&self, party: PartyId) {
        self.unreachable.lock().insert(party);
    }

    /// Every successful delivery so far.
    pub fn delivered(&self) -> Vec<(PartyId, MembershipNotification)> {
        self.delivered.lock().clone()
    }

    /// Recipients of successful deliveries so far.
    pub fn recipients(&self) -> BTreeSet<PartyId> {
        self.delivered.lock().iter().map(|(to, _)| *to).collect()
    }

    /// Wait until at least `count` deliveries were recorded or `timeout` passes.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.signal.notified();
            if self.delivered.lock().len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.delivered.lock().len() >= count;
            }
        }
    }
}

#[async_trait]
impl NotificationEffects for RecordingNotifier {
    async fn notify(
        &self,
        recipient: PartyId,
        notification: &MembershipNotification,
    ) -> Result<()> {
        if self.unreachable.lock().contains(&recipient) {
            return Err(MembershipError::notification(recipient, "unreachable"));
        }
        self.delivered.lock().push((recipient, notification.clone()));
        self.signal.notify_waiters();
        Ok(())
    }
}

/// Delivers to per-recipient sinks, failing for recipients without a route.
#[derive(Clone, Default)]
pub struct RoutingNotifier {
    routes: Arc<Mutex<HashMap<PartyId, Arc<dyn NotificationEffects>>>>,
}

impl RoutingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, party: PartyId, sink: Arc<dyn NotificationEffects>) {
        self.routes.lock().insert(party, sink);
    }

    pub fn disconnect(&self, party: &PartyId) {
        self.routes.lock().remove(party);
    }
}

#[async_trait]
impl NotificationEffects for RoutingNotifier {
    async fn notify(
        &self,
        recipient: PartyId,
        notification: &MembershipNotification,
    ) -> Result<()> {
        let sink = self.routes.lock().get(&recipient).cloned();
        match sink {
            Some(sink) => sink.notify(recipient, notification).await,
            None => Err(MembershipError::notification(recipient, "no route")),
        }
    }
}
