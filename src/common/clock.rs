//! Time source port
//!
//! Freshness and expiry logic never reads the system clock directly; the
//! pipeline asks an injected [`Clock`] so tests can move time explicitly.

use chrono::{Duration, Utc};
use std::sync::Mutex;

use super::types::Timestamp;

/// Port for time abstraction
pub trait Clock: Send + Sync {
    /// Current time according to this clock
    fn now(&self) -> Timestamp;
}

/// Real wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests and replays
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock to an absolute time
    pub fn set(&self, to: Timestamp) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard = to;
    }

    /// Advance the clock by a duration
    pub fn advance(&self, by: Duration) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(20));
        assert_eq!(clock.now(), start + Duration::minutes(20));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
