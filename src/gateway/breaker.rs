//! Consecutive-failure circuit breaker.
//!
//! Counts consecutive failures; at the threshold the breaker opens for the
//! cooldown period. The first call after the cooldown is the implicit
//! half-open probe: a success closes the breaker, a failure re-opens it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BreakerState {
    failures: u32,
    open_until: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        CircuitBreaker {
            state: Mutex::new(BreakerState {
                failures: 0,
                open_until: None,
            }),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    /// Whether a request may proceed.
    pub fn allow(&self) -> bool {
        let state = self.state.lock().expect("breaker lock poisoned");
        match state.open_until {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }

    /// Records a success, resetting the failure streak.
    pub fn success(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.failures = 0;
        state.open_until = None;
    }

    /// Records a failure; at the threshold the breaker opens and the streak
    /// restarts.
    pub fn failure(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.failures += 1;
        if state.failures >= self.threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
            state.failures = 0;
        }
    }
}
