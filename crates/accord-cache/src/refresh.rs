//! Full-refresh policy for the membership cache
//!
//! The cache self-corrects from dropped notifications only through a full
//! reload from the authoritative store. [`CacheRefresher`] performs that
//! reload on demand (read-through on a cold, invalidated or expired cache)
//! and optionally on a fixed interval in the background.

use crate::cache::MembershipCache;
use accord_core::effects::{MembershipStoreEffects, PhysicalTimeEffects};
use accord_core::{CacheConfig, MembershipRecord, PartyId, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Reloads a [`MembershipCache`] from the backing store.
#[derive(Clone)]
pub struct CacheRefresher {
    cache: Arc<MembershipCache>,
    store: Arc<dyn MembershipStoreEffects>,
    clock: Arc<dyn PhysicalTimeEffects>,
    config: CacheConfig,
}

impl CacheRefresher {
    pub fn new(
        cache: Arc<MembershipCache>,
        store: Arc<dyn MembershipStoreEffects>,
        clock: Arc<dyn PhysicalTimeEffects>,
        config: CacheConfig,
    ) -> Self {
        Self {
            cache,
            store,
            clock,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<MembershipCache> {
        &self.cache
    }

    /// Replace the cache contents with the store's active listing.
    ///
    /// Returns the number of active members listed.
    /// Notifications applied while the listing is read are kept.
    pub async fn refresh(&self) -> Result<usize> {
        let mark = self.cache.mark();
        let listing = self.store.all_active_records().await?;
        let now = self.clock.physical_time().await;
        let expiry = now.saturating_add(self.config.entry_ttl());
        let count = listing.len();

        self.cache.load_since(mark, listing, Some(expiry));
        tracing::info!(members = count, %expiry, "Membership cache refreshed");
        Ok(count)
    }

    /// Refresh only if the cache is cold, invalidated or expired.
    pub async fn refresh_if_needed(&self) -> Result<bool> {
        let now = self.clock.physical_time().await;
        if self.cache.needs_refresh(now) {
            self.refresh().await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Read-through lookup: refresh first if the cached view cannot be trusted.
    ///
    /// Unlike [`MembershipCache::lookup`], a `None` here does mean "not an
    /// active member" as of the last refresh.
    pub async fn lookup_or_refresh(&self, member: &PartyId) -> Result<Option<MembershipRecord>> {
        self.refresh_if_needed().await?;
        Ok(self.cache.lookup(member))
    }

    /// Authoritative eligibility check that bypasses the cache.
    ///
    /// Use where a revocation must take effect immediately.
    pub async fn is_active_authoritative(&self, member: &PartyId) -> Result<bool> {
        let current = self.store.current_record(member).await?;
        let active = current.as_ref().is_some_and(MembershipRecord::is_active);
        if !active && self.cache.lookup(member).is_some() {
            tracing::info!(%member, "Evicting stale cache entry after authoritative check");
            self.cache.apply_revocation(member);
        }
        Ok(active)
    }

    /// Spawn a background task that refreshes every `refresh_interval`.
    ///
    /// Failures are logged and retried on the next tick.
    pub fn spawn_periodic(&self) -> RefreshHandle {
        let refresher = self.clone();
        let interval = self.config.refresh_interval();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = refresher.refresh().await {
                            tracing::warn!(error = %e, "Periodic membership cache refresh failed");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Membership cache refresh task shutting down");
                        break;
                    }
                }
            }
        });

        RefreshHandle {
            task: Some(task),
            shutdown: Some(shutdown_tx),
        }
    }
}

/// Handle to a running periodic refresh task.
pub struct RefreshHandle {
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RefreshHandle {
    /// Signal the task to stop and wait up to `grace` for it to finish.
    pub async fn shutdown(mut self, grace: Duration) {
        if let Some(signal) = self.shutdown.take() {
            let _ = signal.send(());
        }
        if let Some(task) = self.task.take() {
            match tokio::time::timeout(grace, task).await {
                Ok(Ok(())) => tracing::debug!("Refresh task completed"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Refresh task failed"),
                Err(_) => tracing::warn!("Refresh task did not stop within grace period"),
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
