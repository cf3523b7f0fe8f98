//! Wall-clock access.

use crate::time::PhysicalTime;
use async_trait::async_trait;

/// Source of physical timestamps.
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current wall-clock time.
    async fn physical_time(&self) -> PhysicalTime;
}
