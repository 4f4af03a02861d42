//! Clock Abstraction
//!
//! Provides the receipt timestamps attached to every decoded frame.
//! [`SystemClock`] reads UTC wall time; [`ManualClock`] is driven explicitly
//! and is used for deterministic replays and tests.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// UTC timestamp with millisecond-or-better precision
pub type Timestamp = DateTime<Utc>;

/// Source of receipt timestamps
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> Timestamp;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock
///
/// Time only moves when [`ManualClock::set`] or [`ManualClock::advance`] is
/// called, so successive frames can be given exact timestamps.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the given unix time in milliseconds
    ///
    /// Out-of-range values fall back to the unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self::new(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_is_frozen_until_advanced() {
        let clock = ManualClock::from_millis(1_700_000_000_000);
        let first = clock.now();
        assert_eq!(clock.now(), first);

        clock.advance(Duration::milliseconds(500));
        assert_eq!(clock.now() - first, Duration::milliseconds(500));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::from_millis(0);
        let target = DateTime::from_timestamp_millis(42_000).unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_manual_clock_out_of_range_falls_back_to_epoch() {
        let clock = ManualClock::from_millis(i64::MAX);
        assert_eq!(clock.now().timestamp(), 0);
    }
}
