use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

fn default_min_requests() -> usize {
    20
}

fn default_error_threshold() -> f64 {
    0.5
}

fn default_cooldown() -> Duration {
    Duration::from_secs(30)
}

fn default_trial_count() -> usize {
    3
}

fn default_window() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Outcomes required in the window before the trip check runs
    #[serde(default = "default_min_requests")]
    pub min_requests: usize,

    /// Failure rate above which the breaker opens
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,

    /// How long an open breaker rejects before probing again
    #[serde(default = "default_cooldown", with = "humantime_serde")]
    pub cooldown: Duration,

    /// Trial permits granted in half-open
    #[serde(default = "default_trial_count")]
    pub trial_count: usize,

    /// Sliding outcome window length
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            min_requests: default_min_requests(),
            error_threshold: default_error_threshold(),
            cooldown: default_cooldown(),
            trial_count: default_trial_count(),
            window: default_window(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Closed,
    Open { until: Instant },
    HalfOpen { trials: usize, failures: usize },
}

struct BidderState {
    state: State,
    outcomes: VecDeque<bool>,
}

impl BidderState {
    fn new() -> Self {
        Self {
            state: State::Closed,
            outcomes: VecDeque::new(),
        }
    }

    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }

        let failures = self.outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / self.outcomes.len() as f64
    }
}

/// Per-bidder circuit breaker: Closed passes, Open rejects, Half-Open
/// grants a bounded number of trial permits after the cooldown.
///
/// Permit checks are a fast in-process operation; each bidder's state
/// sits behind its own small lock with no cross-bidder coordination.
pub struct CircuitBreaker {
    config: BreakerConfig,
    states: DashMap<String, Mutex<BidderState>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            states: DashMap::new(),
        }
    }

    /// Try to take a permit for one outbound call. `false` means the
    /// circuit is rejecting this bidder right now.
    pub fn try_acquire(&self, bidder: &str) -> bool {
        let entry = self
            .states
            .entry(bidder.to_string())
            .or_insert_with(|| Mutex::new(BidderState::new()));
        let mut state = entry.lock();

        match state.state {
            State::Closed => true,
            State::Open { until } => {
                if Instant::now() < until {
                    return false;
                }

                self.transition(bidder, &mut state, State::HalfOpen {
                    trials: 1,
                    failures: 0,
                });
                true
            }
            State::HalfOpen { trials, failures } => {
                if trials >= self.config.trial_count {
                    return false;
                }

                state.state = State::HalfOpen {
                    trials: trials + 1,
                    failures,
                };
                true
            }
        }
    }

    pub fn record_success(&self, bidder: &str) {
        self.record(bidder, true);
    }

    pub fn record_failure(&self, bidder: &str) {
        self.record(bidder, false);
    }

    fn record(&self, bidder: &str, ok: bool) {
        let entry = self
            .states
            .entry(bidder.to_string())
            .or_insert_with(|| Mutex::new(BidderState::new()));
        let mut state = entry.lock();

        state.outcomes.push_back(ok);
        while state.outcomes.len() > self.config.window {
            state.outcomes.pop_front();
        }

        match state.state {
            State::Closed => {
                if state.outcomes.len() >= self.config.min_requests
                    && state.failure_rate() > self.config.error_threshold
                {
                    let until = Instant::now() + self.config.cooldown;
                    self.transition(bidder, &mut state, State::Open { until });
                }
            }
            State::HalfOpen { trials, failures } => {
                if ok {
                    // Any successful trial closes the circuit and
                    // resets the window
                    state.outcomes.clear();
                    self.transition(bidder, &mut state, State::Closed);
                } else {
                    let failures = failures + 1;
                    if failures >= self.config.trial_count {
                        let until = Instant::now() + self.config.cooldown;
                        self.transition(bidder, &mut state, State::Open { until });
                    } else {
                        state.state = State::HalfOpen { trials, failures };
                    }
                }
            }
            State::Open { .. } => {}
        }
    }

    fn transition(&self, bidder: &str, state: &mut BidderState, next: State) {
        let label = match next {
            State::Closed => "closed",
            State::Open { .. } => "open",
            State::HalfOpen { .. } => "half_open",
        };

        debug!("Circuit for bidder {} -> {}", bidder, label);
        metrics::counter!(
            "vex_breaker_transitions_total",
            "bidder" => bidder.to_string(),
            "state" => label
        )
        .increment(1);

        state.state = next;
    }

    #[cfg(test)]
    fn is_open(&self, bidder: &str) -> bool {
        self.states
            .get(bidder)
            .map(|entry| matches!(entry.lock().state, State::Open { .. }))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(min_requests: usize, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            min_requests,
            error_threshold: 0.5,
            cooldown,
            trial_count: 2,
            window: 50,
        })
    }

    #[test]
    fn test_closed_grants_permits() {
        let breaker = breaker(10, Duration::from_secs(30));
        assert!(breaker.try_acquire("x"));
    }

    #[test]
    fn test_trips_open_after_failure_rate_exceeded() {
        let breaker = breaker(10, Duration::from_secs(30));

        for _ in 0..10 {
            assert!(breaker.try_acquire("x"));
            breaker.record_failure("x");
        }

        assert!(breaker.is_open("x"));
        assert!(!breaker.try_acquire("x"));
    }

    #[test]
    fn test_below_min_requests_never_trips() {
        let breaker = breaker(10, Duration::from_secs(30));

        for _ in 0..9 {
            breaker.record_failure("x");
        }

        assert!(!breaker.is_open("x"));
        assert!(breaker.try_acquire("x"));
    }

    #[test]
    fn test_mixed_outcomes_below_threshold_stay_closed() {
        let breaker = breaker(10, Duration::from_secs(30));

        for i in 0..20 {
            if i % 3 == 0 {
                breaker.record_failure("x");
            } else {
                breaker.record_success("x");
            }
        }

        assert!(breaker.try_acquire("x"));
    }

    #[test]
    fn test_half_open_success_closes() {
        let breaker = breaker(10, Duration::from_millis(5));

        for _ in 0..10 {
            breaker.record_failure("x");
        }
        assert!(!breaker.try_acquire("x"));

        std::thread::sleep(Duration::from_millis(10));

        // Cooldown elapsed: trial permit granted
        assert!(breaker.try_acquire("x"));
        breaker.record_success("x");

        assert!(breaker.try_acquire("x"));
        assert!(!breaker.is_open("x"));
    }

    #[test]
    fn test_half_open_failures_reopen() {
        let breaker = breaker(10, Duration::from_millis(5));

        for _ in 0..10 {
            breaker.record_failure("x");
        }

        std::thread::sleep(Duration::from_millis(10));

        assert!(breaker.try_acquire("x"));
        breaker.record_failure("x");
        assert!(breaker.try_acquire("x"));
        breaker.record_failure("x");

        assert!(breaker.is_open("x"));
        assert!(!breaker.try_acquire("x"));
    }

    #[test]
    fn test_bidders_isolated() {
        let breaker = breaker(10, Duration::from_secs(30));

        for _ in 0..10 {
            breaker.record_failure("bad");
        }

        assert!(!breaker.try_acquire("bad"));
        assert!(breaker.try_acquire("good"));
    }

    #[test]
    fn test_half_open_bounds_trial_permits() {
        let breaker = breaker(10, Duration::from_millis(5));

        for _ in 0..10 {
            breaker.record_failure("x");
        }

        std::thread::sleep(Duration::from_millis(10));

        assert!(breaker.try_acquire("x"));
        assert!(breaker.try_acquire("x"));
        // trial_count is 2: further permits denied until a verdict
        assert!(!breaker.try_acquire("x"));
    }
}
