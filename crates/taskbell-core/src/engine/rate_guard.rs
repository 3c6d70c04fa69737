//! Admission control for the scheduling entry point.
//!
//! Upstream snapshot churn can invoke `schedule` in a tight loop; unchecked,
//! that feeds back into timer creation and notification output. The guard is
//! a circuit breaker with an explicit state machine:
//!
//! ```text
//! Closed -> (window overflow) -> Open -> (expiry) -> HalfOpen -> Closed
//! ```
//!
//! `Closed` admits calls subject to a short cooldown between admissions.
//! `Open` rejects everything until its expiry. `HalfOpen` lets a single
//! probe call through; a successful admission closes the breaker again.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Admitted; the caller may do the scheduling work.
    Proceed,
    /// Too soon after the previous admitted call. Rejected, breaker intact.
    Cooldown,
    /// Breaker is open. Rejected until the lockout expires.
    Lockout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open { until: DateTime<Utc> },
    HalfOpen,
}

/// Call-frequency gate with an escalating lockout.
#[derive(Debug)]
pub struct RateGuard {
    /// Rolling window of call timestamps, oldest first.
    calls: VecDeque<DateTime<Utc>>,
    last_admitted: Option<DateTime<Utc>>,
    breaker: BreakerState,
    /// Set on a Closed/HalfOpen -> Open transition; consumed by the
    /// orchestrator to run the emergency teardown exactly once per trip.
    tripped: bool,
    max_calls: usize,
    window: chrono::Duration,
    cooldown: chrono::Duration,
    lockout: chrono::Duration,
}

impl RateGuard {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            calls: VecDeque::new(),
            last_admitted: None,
            breaker: BreakerState::Closed,
            tripped: false,
            max_calls: config.max_calls_per_minute,
            window: config.rate_window(),
            cooldown: config.cooldown(),
            lockout: config.lockout(),
        }
    }

    /// Record a call attempt and decide whether it may proceed.
    ///
    /// Every non-locked-out call lands in the rolling window, including
    /// ones that are then rejected with `Cooldown`; only admission progress
    /// (`last_admitted`) is withheld from rejected calls.
    pub fn admit(&mut self, now: DateTime<Utc>) -> Decision {
        match self.breaker {
            BreakerState::Open { until } if now < until => return Decision::Lockout,
            BreakerState::Open { .. } => self.breaker = BreakerState::HalfOpen,
            _ => {}
        }

        self.calls.push_back(now);
        let cutoff = now - self.window;
        while self.calls.front().is_some_and(|t| *t < cutoff) {
            self.calls.pop_front();
        }
        if self.calls.len() > self.max_calls {
            self.trip(now);
            return Decision::Lockout;
        }

        if let Some(last) = self.last_admitted {
            if now - last < self.cooldown {
                return Decision::Cooldown;
            }
        }

        self.last_admitted = Some(now);
        self.breaker = BreakerState::Closed;
        Decision::Proceed
    }

    /// Whether the breaker is currently open. Read by the dispatcher to
    /// suppress emissions during a lockout.
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        matches!(self.breaker, BreakerState::Open { until } if now < until)
    }

    /// One-shot trip signal, raised on the transition into `Open`.
    pub fn take_trip(&mut self) -> bool {
        std::mem::take(&mut self.tripped)
    }

    fn trip(&mut self, now: DateTime<Utc>) {
        self.breaker = BreakerState::Open {
            until: now + self.lockout,
        };
        self.tripped = true;
        self.calls.clear();
    }
}
