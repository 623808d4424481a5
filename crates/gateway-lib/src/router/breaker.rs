//! Per-backend circuit breaker
//!
//! Three-state machine: Closed (normal) -> Open after N consecutive
//! failures -> Half-Open after the cool-down, admitting a single trial
//! request -> Closed on trial success or back to Open on trial failure.
//! Breaker state is the only error-driven state that outlives a request.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Breaker tuning knobs
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,
    /// How long the breaker stays open before a half-open trial
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Public breaker state summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

enum State {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
    HalfOpen,
}

/// Failure-tracking state machine for one backend
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether a call may go to this backend right now
    ///
    /// While open this returns false until the cool-down elapses; the
    /// first caller after that wins the single half-open trial slot and
    /// concurrent callers keep getting false until the trial resolves.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        match *state {
            State::Closed { .. } => true,
            State::Open { until } => {
                if Instant::now() >= until {
                    *state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => false,
        }
    }

    /// Record a successful call, closing the breaker
    pub fn on_success(&self) {
        let mut state = self.lock();
        *state = State::Closed {
            consecutive_failures: 0,
        };
    }

    /// Record a failed call
    ///
    /// Returns true exactly when this failure transitioned the breaker to
    /// Open (threshold reached, or a half-open trial failed).
    pub fn on_failure(&self) -> bool {
        let mut state = self.lock();
        match *state {
            State::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    *state = State::Open {
                        until: Instant::now() + self.config.cooldown,
                    };
                    true
                } else {
                    *state = State::Closed {
                        consecutive_failures: failures,
                    };
                    false
                }
            }
            State::HalfOpen => {
                *state = State::Open {
                    until: Instant::now() + self.config.cooldown,
                };
                true
            }
            // A straggler from a call admitted before the breaker opened
            State::Open { .. } => false,
        }
    }

    pub fn state(&self) -> BreakerState {
        match *self.lock() {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen => BreakerState::HalfOpen,
        }
    }
}
