//! Physical time used for record timestamps and cache expiry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Wall-clock timestamp in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalTime {
    /// Milliseconds since the Unix epoch
    pub ts_ms: u64,
}

impl PhysicalTime {
    /// The Unix epoch.
    pub const EPOCH: Self = Self { ts_ms: 0 };

    /// Create from milliseconds since the epoch
    pub const fn from_millis(ts_ms: u64) -> Self {
        Self { ts_ms }
    }

    /// Timestamp shifted forward, saturating at `u64::MAX`.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self {
            ts_ms: self.ts_ms.saturating_add(ms),
        }
    }

    /// The next representable timestamp.
    pub fn successor(self) -> Self {
        Self {
            ts_ms: self.ts_ms.saturating_add(1),
        }
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future.
    pub fn since(self, earlier: PhysicalTime) -> Duration {
        Duration::from_millis(self.ts_ms.saturating_sub(earlier.ts_ms))
    }
}

impl fmt::Display for PhysicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.ts_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_saturates() {
        let t = PhysicalTime::from_millis(u64::MAX - 1);
        assert_eq!(t.successor().ts_ms, u64::MAX);
        assert_eq!(t.successor().successor().ts_ms, u64::MAX);
        assert_eq!(
            PhysicalTime::from_millis(10).since(PhysicalTime::from_millis(20)),
            Duration::ZERO
        );
        assert_eq!(
            PhysicalTime::from_millis(10).saturating_add(Duration::from_secs(1)),
            PhysicalTime::from_millis(1_010)
        );
    }
}
