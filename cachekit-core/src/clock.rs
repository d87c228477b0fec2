//! Injectable time source.
//!
//! Every place that would otherwise call `Utc::now()`/`Instant::now()`
//! directly takes a `&dyn Clock` instead, so tests can advance time
//! deterministically (TTL expiry, promotion caps, offload timeouts) without
//! sleeping.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current monotonic instant, for measuring elapsed durations.
    fn now_instant(&self) -> Instant;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_instant(&self) -> Instant {
        Instant::now()
    }
}

/// A shared, cloneable handle to a [`Clock`].
pub type SharedClock = Arc<dyn Clock>;

/// Returns a [`SharedClock`] backed by [`SystemClock`].
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
