use accord_core::effects::PhysicalTimeEffects;
use accord_core::PhysicalTime;
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl PhysicalTimeEffects for SystemClock {
    async fn physical_time(&self) -> PhysicalTime {
        // A clock before the epoch is clamped rather than treated as an error.
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        PhysicalTime::from_millis(ms)
    }
}
