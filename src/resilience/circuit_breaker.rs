//! Circuit breaker over a count based rolling window.
//!
//! - **Closed**: calls pass through and their outcomes fill the window. Once
//!   the window holds at least `minimum_calls` outcomes and the failure rate
//!   reaches the threshold, the circuit opens.
//! - **Open**: calls are rejected without running until `open_timeout` has
//!   elapsed since opening.
//! - **HalfOpen**: up to `half_open_calls` trial calls run. Any failure opens
//!   the circuit again; that many successes close it with an empty window.
//!
//! `call` takes a classifier telling how an error counts: as a failure, as a
//! success, or not at all ([`Outcome::Ignored`]).

use crate::telemetry;
use serde::Serialize;
use std::{
    collections::VecDeque,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes the failure rate is computed over.
    pub window_size: usize,
    /// Outcomes needed in the window before the rate is acted upon.
    pub minimum_calls: usize,
    /// Failure percentage (0-100) at which the circuit opens.
    pub failure_rate_threshold: f64,
    pub open_timeout: Duration,
    pub half_open_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            minimum_calls: 10,
            failure_rate_threshold: 50.0,
            open_timeout: Duration::from_secs(30),
            half_open_calls: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

/// How a finished call counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    /// Neither success nor failure, e.g. a rejected request.
    Ignored,
}

#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    Open,
    #[error("operation failed: {0}")]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: State,
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trials_in_flight: usize,
    trial_successes: usize,
}

impl Inner {
    fn open(&mut self) {
        self.state = State::Open;
        self.opened_at = Some(Instant::now());
        self.window.clear();
        self.trials_in_flight = 0;
        self.trial_successes = 0;
    }

    fn close(&mut self) {
        self.state = State::Closed;
        self.opened_at = None;
        self.window.clear();
        self.trials_in_flight = 0;
        self.trial_successes = 0;
    }

    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|failed| **failed).count();
        failures as f64 * 100.0 / self.window.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitMetrics {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

/// Admission to run one call. Dropping it unsettled, e.g. when the caller is
/// cancelled, hands a trial slot back.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(self.trial, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record(self.trial, Outcome::Ignored);
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                window: VecDeque::new(),
                opened_at: None,
                trials_in_flight: 0,
                trial_successes: 0,
            }),
            calls: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    pub fn metrics(&self) -> CircuitMetrics {
        CircuitMetrics {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }

    /// Runs `operation` unless the circuit is open. `classify` decides how an
    /// error counts; `Ok` results always count as successes.
    pub async fn call<F, Fut, T, E>(
        &self,
        operation: F,
        classify: impl Fn(&E) -> Outcome,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let Some(permit) = self.admit() else {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            telemetry::debug!("circuit {} is open, rejecting call", self.name);
            return Err(CircuitBreakerError::Open);
        };

        match operation().await {
            Ok(value) => {
                permit.settle(Outcome::Success);
                Ok(value)
            }
            Err(err) => {
                permit.settle(classify(&err));
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    fn admit(&self) -> Option<Permit<'_>> {
        let mut inner = self.lock();

        let trial = match inner.state {
            State::Closed => false,
            State::Open => {
                let elapsed = inner
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= self.config.open_timeout);
                if !elapsed {
                    return None;
                }

                telemetry::info!("circuit {} transitioning OPEN -> HALF_OPEN", self.name);
                inner.state = State::HalfOpen;
                inner.trials_in_flight = 0;
                inner.trial_successes = 0;
                true
            }
            State::HalfOpen => true,
        };

        if trial {
            if inner.trials_in_flight + inner.trial_successes >= self.config.half_open_calls {
                return None;
            }
            inner.trials_in_flight += 1;
        }

        Some(Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn record(&self, trial: bool, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.successes.fetch_add(1, Ordering::Relaxed),
            Outcome::Failure => self.failures.fetch_add(1, Ordering::Relaxed),
            Outcome::Ignored => 0,
        };

        let mut inner = self.lock();

        match (inner.state, trial) {
            (State::Closed, false) => {
                if outcome == Outcome::Ignored {
                    return;
                }

                inner.window.push_back(outcome == Outcome::Failure);
                while inner.window.len() > self.config.window_size {
                    inner.window.pop_front();
                }

                let rate = inner.failure_rate();
                if inner.window.len() >= self.config.minimum_calls
                    && rate >= self.config.failure_rate_threshold
                {
                    telemetry::error!(
                        "circuit {} transitioning CLOSED -> OPEN at {:.1}% failures",
                        self.name,
                        rate
                    );
                    inner.open();
                }
            }
            (State::HalfOpen, true) => {
                inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);

                match outcome {
                    Outcome::Success => {
                        inner.trial_successes += 1;
                        if inner.trial_successes >= self.config.half_open_calls {
                            telemetry::info!(
                                "circuit {} transitioning HALF_OPEN -> CLOSED",
                                self.name
                            );
                            inner.close();
                        }
                    }
                    Outcome::Failure => {
                        telemetry::error!(
                            "circuit {} transitioning HALF_OPEN -> OPEN (trial failed)",
                            self.name
                        );
                        inner.open();
                    }
                    Outcome::Ignored => {}
                }
            }
            // Calls admitted under a state that has since changed.
            _ => {}
        }
    }

    pub fn reset(&self) {
        telemetry::info!("circuit {} manually reset to CLOSED", self.name);
        self.lock().close();
    }
}
