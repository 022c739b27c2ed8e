//! Circuit breaker shared by the HTTP providers.
//!
//! A provider block (HTTP 403) opens the breaker at once. A breaker built
//! with a threshold also opens after that many consecutive failures. One
//! breaker serves every fund in a run, so the provider default opens on
//! blocks only. While open, requests are refused until the cooldown has
//! passed. Backfill checks it between dates so a blocked source ends the
//! ticker early.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { until: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    cooldown: Duration,
    /// `None` opens only on [`CircuitBreaker::trip`].
    threshold: Option<u32>,
}

impl CircuitBreaker {
    /// Opens after 3 consecutive failures.
    pub fn new(cooldown: Duration) -> Self {
        Self::with_threshold(cooldown, 3)
    }

    pub fn with_threshold(cooldown: Duration, threshold: u32) -> Self {
        Self::build(cooldown, Some(threshold.max(1)))
    }

    /// Opens only when the provider blocks us; failures are counted but never trip it.
    pub fn blocks_only(cooldown: Duration) -> Self {
        Self::build(cooldown, None)
    }

    fn build(cooldown: Duration, threshold: Option<u32>) -> Self {
        Self {
            state: Mutex::new(State::Closed { failures: 0 }),
            cooldown,
            threshold,
        }
    }

    /// Blocks only, thirty-minute cooldown.
    pub fn default_provider() -> Self {
        Self::blocks_only(Duration::from_secs(30 * 60))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn open(&self, state: &mut State) {
        *state = State::Open {
            until: Instant::now() + self.cooldown,
        };
    }

    pub fn is_allowed(&self) -> bool {
        let mut state = self.state();
        match *state {
            State::Closed { .. } => true,
            State::Open { until } if Instant::now() >= until => {
                *state = State::Closed { failures: 0 };
                tracing::info!("circuit breaker cooldown over, accepting requests");
                true
            }
            State::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state();
        if let State::Closed { failures } = &mut *state {
            *failures = 0;
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state();
        let State::Closed { failures } = *state else {
            return;
        };
        let failures = failures.saturating_add(1);
        if self.threshold.is_some_and(|limit| failures >= limit) {
            self.open(&mut state);
            tracing::warn!(failures, cooldown_secs = self.cooldown.as_secs(), "circuit breaker opened");
        } else {
            *state = State::Closed { failures };
        }
    }

    /// Open immediately, regardless of the failure count.
    pub fn trip(&self) {
        let mut state = self.state();
        self.open(&mut state);
        tracing::warn!(cooldown_secs = self.cooldown.as_secs(), "provider blocked requests, circuit breaker opened");
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match *self.state() {
            State::Closed { .. } => Duration::ZERO,
            State::Open { until } => until.saturating_duration_since(Instant::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn fresh_breaker_allows_requests() {
        let breaker = CircuitBreaker::new(MINUTE);
        assert!(breaker.is_allowed());
        assert_eq!(breaker.remaining_cooldown(), Duration::ZERO);
    }

    #[test]
    fn opens_on_the_threshold_failure() {
        let breaker = CircuitBreaker::with_threshold(MINUTE, 2);
        breaker.record_failure();
        assert!(breaker.is_allowed());
        breaker.record_failure();
        assert!(!breaker.is_allowed());
        assert!(breaker.remaining_cooldown() > Duration::from_secs(50));
    }

    #[test]
    fn interleaved_success_keeps_it_closed() {
        let breaker = CircuitBreaker::new(MINUTE);
        for _ in 0..5 {
            breaker.record_failure();
            breaker.record_failure();
            breaker.record_success();
        }
        assert!(breaker.is_allowed());
    }

    #[test]
    fn trip_ignores_threshold() {
        let breaker = CircuitBreaker::with_threshold(MINUTE, 100);
        breaker.trip();
        assert!(!breaker.is_allowed());
        // Failures while open do not extend or reset anything.
        breaker.record_failure();
        breaker.record_success();
        assert!(!breaker.is_allowed());
    }

    #[test]
    fn provider_default_survives_transient_failures() {
        let breaker = CircuitBreaker::default_provider();
        for _ in 0..50 {
            breaker.record_failure();
        }
        assert!(breaker.is_allowed());
        breaker.trip();
        assert!(!breaker.is_allowed());
        assert!(breaker.remaining_cooldown() > Duration::from_secs(29 * 60));
    }

    #[test]
    fn cooldown_expiry_resets_failures() {
        let breaker = CircuitBreaker::with_threshold(Duration::from_millis(10), 2);
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_allowed());
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.is_allowed());
        breaker.record_failure();
        assert!(breaker.is_allowed());
    }
}
