//! Time source

use keydev_model::Timestamp;

/// Source of the timestamps stamped onto records
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}
