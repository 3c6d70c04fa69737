//! Injectable time source.
//!
//! Scheduling decisions compare `DateTime<Utc>` values handed in by the
//! caller or read from a [`Clock`]. Production code uses [`SystemClock`];
//! tests use [`SimClock`], which is anchored to the tokio time driver and
//! therefore advances with `tokio::time::advance` under a paused runtime.

use chrono::{DateTime, Duration, Utc};

/// A source of "now". Timer bodies read it at fire time so that decision
/// logic never calls `Utc::now()` directly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock driven by the tokio time driver.
///
/// `now()` is the anchor timestamp plus the tokio-measured elapsed time
/// since construction. Under `#[tokio::test(start_paused = true)]` the
/// elapsed time only moves via `tokio::time::advance`, which makes every
/// engine timing decision deterministic.
#[derive(Debug, Clone)]
pub struct SimClock {
    base_utc: DateTime<Utc>,
    base: tokio::time::Instant,
}

impl SimClock {
    /// Anchor the clock at `base_utc`. Must be called within a tokio
    /// runtime context.
    pub fn new(base_utc: DateTime<Utc>) -> Self {
        Self {
            base_utc,
            base: tokio::time::Instant::now(),
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.base.elapsed();
        self.base_utc + Duration::from_std(elapsed).unwrap_or_else(|_| Duration::zero())
    }
}
