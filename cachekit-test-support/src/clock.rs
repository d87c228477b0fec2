//! A deterministic clock for TTL/promotion/offload tests.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use cachekit_core::Clock;

/// A clock whose time only moves when [`TestClock::advance`] is called.
///
/// Grounded on the injectable-clock pattern `cachekit-core::clock` defines;
/// this is the fake every other crate's time-sensitive tests build on.
#[derive(Debug)]
pub struct TestClock {
    utc: Mutex<DateTime<Utc>>,
    instant: Mutex<Instant>,
}

impl TestClock {
    /// Starts the clock at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        TestClock {
            utc: Mutex::new(start),
            instant: Mutex::new(Instant::now()),
        }
    }

    /// Advances both the wall-clock and monotonic readings by `duration`.
    pub fn advance(&self, duration: Duration) {
        *self.utc.lock().unwrap() += duration;
        // `Instant` has no public `+=` with auto-saturation concerns here;
        // reconstructing via `checked_add` keeps this infallible in tests.
        let mut instant = self.instant.lock().unwrap();
        *instant = instant.checked_add(duration).unwrap_or(*instant);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        TestClock::new(Utc::now())
    }
}

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc.lock().unwrap()
    }

    fn now_instant(&self) -> Instant {
        *self.instant.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_utc_time_forward() {
        let clock = TestClock::new(Utc::now());
        let before = clock.now_utc();
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now_utc(), before + chrono::Duration::seconds(60));
    }
}
