//! # Circuit Breaker
//!
//! Consecutive-failure circuit breaker guarding a single dependency.
//!
//! - **Closed**: calls pass; `failure_threshold` consecutive failures open it.
//! - **Open**: calls are rejected without invoking the operation until
//!   `half_open_after` has elapsed since the breaker opened.
//! - **Half-open**: exactly one trial call is admitted. Success closes the
//!   breaker and resets the counters, failure reopens it and restarts the
//!   cooldown.
//!
//! Rejected calls never count as failures. Every admitted call is tracked by a
//! [`CallPermit`]. A permit dropped before it was settled is a failure only
//! when a timeout layer abandoned the call (its [`DeadlineSignal`] fired).
//! Any other drop means the caller went away: the dependency's health is
//! unknown, so nothing is recorded and a half-open trial slot is released.
//!
//! Layer contract: catches nothing from the operation. Every `Err` returned by
//! the inner call counts as one failure and is re-raised unchanged; the only
//! error this layer originates is [`PolicyError::CircuitOpen`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::timeout::DeadlineSignal;
use crate::types::{PolicyError, PolicyResult};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation, requests allowed
    Closed,
    /// Failing, requests blocked
    Open,
    /// Cooldown elapsed, a single trial request allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time to keep the circuit open before admitting a trial call
    pub half_open_after: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            half_open_after: Duration::from_secs(30),
        }
    }
}

/// Health snapshot for a circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitHealth {
    /// Current state of the circuit
    pub state: CircuitState,
    /// Failures since the last success or state change
    pub consecutive_failures: u32,
    /// Successful calls over the breaker's lifetime
    pub total_successes: u64,
    /// Failed calls over the breaker's lifetime
    pub total_failures: u64,
    /// Calls rejected while open
    pub total_rejections: u64,
    /// Time since last state transition
    pub time_in_state: Duration,
    /// Time until a trial call will be admitted, when open
    pub estimated_time_to_retry: Option<Duration>,
}

#[derive(Debug)]
struct CircuitStats {
    state: CircuitState,
    consecutive_failures: u32,
    last_state_change: Instant,
    trial_in_flight: bool,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
}

impl CircuitStats {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_state_change: Instant::now(),
            trial_in_flight: false,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
        }
    }
}

/// Consecutive-failure circuit breaker for one service
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    stats: Mutex<CircuitStats>,
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker for the given service
    pub fn new<S: Into<String>>(service: S, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            stats: Mutex::new(CircuitStats::new()),
        }
    }

    /// Service this breaker protects
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Breaker configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CircuitStats> {
        // Stats stay consistent across a panic elsewhere: every mutation is a
        // handful of field writes with no early exit.
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tries to admit a call, returning a permit that must be settled with
    /// [`CallPermit::success`] or [`CallPermit::failure`].
    pub fn try_acquire(self: &Arc<Self>) -> Option<CallPermit> {
        let mut stats = self.lock();

        match stats.state {
            CircuitState::Closed => Some(CallPermit::new(self.clone(), false)),
            CircuitState::Open => {
                let elapsed = stats.last_state_change.elapsed();
                if elapsed >= self.config.half_open_after {
                    self.transition(&mut stats, CircuitState::HalfOpen);
                    stats.trial_in_flight = true;
                    Some(CallPermit::new(self.clone(), true))
                } else {
                    stats.total_rejections += 1;
                    counter!("resilience.circuit.rejected", 1, "service" => self.service.clone());
                    debug!(
                        service = %self.service,
                        remaining_ms = %(self.config.half_open_after - elapsed).as_millis(),
                        "Circuit open, request rejected"
                    );
                    None
                }
            }
            CircuitState::HalfOpen => {
                if stats.trial_in_flight {
                    stats.total_rejections += 1;
                    counter!("resilience.circuit.rejected", 1, "service" => self.service.clone());
                    debug!(service = %self.service, "Half-open trial in flight, request rejected");
                    None
                } else {
                    stats.trial_in_flight = true;
                    Some(CallPermit::new(self.clone(), true))
                }
            }
        }
    }

    /// Executes `operation` under breaker protection.
    pub async fn call<F, Fut, T, E>(self: &Arc<Self>, operation: F) -> PolicyResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PolicyResult<T, E>>,
    {
        self.call_within(None, operation).await
    }

    /// Executes `operation` under breaker protection, counting the call as a
    /// failure if it is abandoned after `deadline` fires.
    pub async fn call_with_deadline<F, Fut, T, E>(
        self: &Arc<Self>,
        deadline: &DeadlineSignal,
        operation: F,
    ) -> PolicyResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PolicyResult<T, E>>,
    {
        self.call_within(Some(deadline), operation).await
    }

    async fn call_within<F, Fut, T, E>(
        self: &Arc<Self>,
        deadline: Option<&DeadlineSignal>,
        operation: F,
    ) -> PolicyResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PolicyResult<T, E>>,
    {
        let mut permit = match self.try_acquire() {
            Some(permit) => permit,
            None => {
                return Err(PolicyError::CircuitOpen {
                    service: self.service.clone(),
                })
            }
        };
        if let Some(deadline) = deadline {
            permit = permit.with_deadline(deadline);
        }

        let result = operation().await;
        match &result {
            Ok(_) => permit.success(),
            Err(_) => permit.failure(),
        }
        result
    }

    fn on_success(&self, trial: bool) {
        let mut stats = self.lock();
        stats.total_successes += 1;

        match stats.state {
            CircuitState::Closed => stats.consecutive_failures = 0,
            CircuitState::HalfOpen if trial => {
                stats.trial_in_flight = false;
                self.transition(&mut stats, CircuitState::Closed);
                info!(service = %self.service, "Circuit CLOSED: Service recovered");
            }
            // A call admitted before the breaker opened finished late; the
            // trial decides recovery, not stragglers.
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut stats = self.lock();
        stats.total_failures += 1;
        counter!("resilience.circuit.failures", 1, "service" => self.service.clone());

        match stats.state {
            CircuitState::Closed => {
                stats.consecutive_failures += 1;
                if stats.consecutive_failures >= self.config.failure_threshold {
                    let failures = stats.consecutive_failures;
                    self.transition(&mut stats, CircuitState::Open);
                    warn!(
                        service = %self.service,
                        failures = %failures,
                        threshold = %self.config.failure_threshold,
                        "Circuit OPEN: Failure threshold exceeded"
                    );
                }
            }
            CircuitState::HalfOpen if trial => {
                stats.trial_in_flight = false;
                self.transition(&mut stats, CircuitState::Open);
                warn!(
                    service = %self.service,
                    cooldown_ms = %self.config.half_open_after.as_millis(),
                    "Circuit REOPENED: Failed in half-open state"
                );
            }
            _ => {}
        }
    }

    fn on_abandoned(&self, trial: bool) {
        let mut stats = self.lock();
        counter!("resilience.circuit.abandoned", 1, "service" => self.service.clone());
        if trial && stats.state == CircuitState::HalfOpen {
            stats.trial_in_flight = false;
            debug!(service = %self.service, "Half-open trial abandoned by caller, slot released");
        } else {
            debug!(service = %self.service, "Call abandoned by caller, outcome not recorded");
        }
    }

    fn transition(&self, stats: &mut CircuitStats, to: CircuitState) {
        let from = stats.state;
        stats.state = to;
        stats.last_state_change = Instant::now();
        if to != CircuitState::Open {
            stats.consecutive_failures = 0;
        }

        counter!(
            "resilience.circuit.transitions",
            1,
            "service" => self.service.clone(),
            "to" => to.to_string()
        );
        gauge!("resilience.circuit.state", state_value(to), "service" => self.service.clone());
        debug!(service = %self.service, from = %from, to = %to, "Circuit state transition");
    }

    /// Gets the current state of the circuit.
    ///
    /// An open circuit whose cooldown has elapsed reports `HalfOpen`: the next
    /// call will be admitted as the trial.
    pub fn state(&self) -> CircuitState {
        let stats = self.lock();
        match stats.state {
            CircuitState::Open if stats.last_state_change.elapsed() >= self.config.half_open_after => {
                CircuitState::HalfOpen
            }
            state => state,
        }
    }

    /// Gets health metrics for the circuit
    pub fn health(&self) -> CircuitHealth {
        let state = self.state();
        let stats = self.lock();
        let time_in_state = stats.last_state_change.elapsed();
        let estimated_time_to_retry = if stats.state == CircuitState::Open {
            self.config.half_open_after.checked_sub(time_in_state)
        } else {
            None
        };

        CircuitHealth {
            state,
            consecutive_failures: stats.consecutive_failures,
            total_successes: stats.total_successes,
            total_failures: stats.total_failures,
            total_rejections: stats.total_rejections,
            time_in_state,
            estimated_time_to_retry,
        }
    }

    /// Forces the circuit back to closed
    pub fn reset(&self) {
        let mut stats = self.lock();
        let previous = stats.state;
        stats.trial_in_flight = false;
        self.transition(&mut stats, CircuitState::Closed);
        info!(
            service = %self.service,
            previous_state = %previous,
            "Circuit manually reset to CLOSED state"
        );
    }
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    }
}

/// Admission ticket for one call through a [`CircuitBreaker`]
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    settled: bool,
    deadline: Option<DeadlineSignal>,
}

impl CallPermit {
    fn new(breaker: Arc<CircuitBreaker>, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
            deadline: None,
        }
    }

    /// Counts the call as failed if the permit is dropped unsettled after
    /// `deadline` has fired
    pub fn with_deadline(mut self, deadline: &DeadlineSignal) -> Self {
        self.deadline = Some(deadline.clone());
        self
    }

    /// True if this call is the half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Records the call as successful
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    /// Records the call as failed
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.deadline.as_ref().map_or(false, DeadlineSignal::fired) {
            debug!(service = %self.breaker.service, "Call abandoned at deadline, counting as failure");
            self.breaker.on_failure(self.trial);
        } else {
            self.breaker.on_abandoned(self.trial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn breaker(threshold: u32, cooldown_ms: u64) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "test-service",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                half_open_after: Duration::from_millis(cooldown_ms),
            },
        ))
    }

    async fn fail(cb: &Arc<CircuitBreaker>, calls: &AtomicUsize) -> PolicyResult<(), &'static str> {
        cb.call(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PolicyError::Operation("boom"))
        })
        .await
    }

    #[tokio::test]
    async fn test_opens_on_threshold() {
        let cb = breaker(3, 10_000);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            assert!(fail(&cb, &calls).await.is_err());
            assert_eq!(cb.state(), CircuitState::Closed);
        }

        // Third consecutive failure trips it
        let err = fail(&cb, &calls).await.unwrap_err();
        assert!(matches!(err, PolicyError::Operation("boom")));
        assert_eq!(cb.state(), CircuitState::Open);

        // Fourth call is rejected without running the operation
        let err = fail(&cb, &calls).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cb.health().total_failures, 3);
        assert_eq!(cb.health().total_rejections, 1);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_count() {
        let cb = breaker(2, 10_000);
        let calls = AtomicUsize::new(0);

        let _ = fail(&cb, &calls).await;
        cb.call(|| async { Ok::<_, PolicyError<&str>>(()) }).await.unwrap();
        let _ = fail(&cb, &calls).await;

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        let cb = breaker(1, 50);
        let calls = AtomicUsize::new(0);

        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), CircuitState::Open);

        sleep(Duration::from_millis(80)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let value = cb.call(|| async { Ok::<_, PolicyError<&str>>(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_and_restarts_cooldown() {
        let cb = breaker(1, 50);
        let calls = AtomicUsize::new(0);

        let _ = fail(&cb, &calls).await;
        sleep(Duration::from_millis(80)).await;

        // Trial fails
        let err = fail(&cb, &calls).await.unwrap_err();
        assert!(!err.is_circuit_open());
        assert_eq!(cb.state(), CircuitState::Open);

        // Cooldown restarted: still rejecting right away
        let err = fail(&cb, &calls).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_half_open_admits_single_trial() {
        let cb = breaker(1, 20);
        let calls = AtomicUsize::new(0);
        let _ = fail(&cb, &calls).await;
        sleep(Duration::from_millis(40)).await;

        let trial = cb.try_acquire().expect("trial admitted");
        assert!(trial.is_trial());
        assert!(cb.try_acquire().is_none());

        trial.success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_permit_dropped_after_deadline_counts_as_failure() {
        let cb = breaker(1, 10_000);
        let deadline = DeadlineSignal::new();
        let permit = cb.try_acquire().unwrap().with_deadline(&deadline);
        deadline.fire();
        drop(permit);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.health().total_failures, 1);
    }

    #[tokio::test]
    async fn test_permit_dropped_by_caller_is_not_a_failure() {
        let cb = breaker(1, 10_000);
        let permit = cb.try_acquire().unwrap().with_deadline(&DeadlineSignal::new());
        drop(permit);
        drop(cb.try_acquire().unwrap());

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health().total_failures, 0);
    }

    #[tokio::test]
    async fn test_abandoned_trial_releases_slot() {
        let cb = breaker(1, 20);
        let calls = AtomicUsize::new(0);
        let _ = fail(&cb, &calls).await;
        sleep(Duration::from_millis(40)).await;

        let trial = cb.try_acquire().expect("trial admitted");
        assert!(cb.try_acquire().is_none());
        drop(trial);

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let retrial = cb.try_acquire().expect("slot released");
        assert!(retrial.is_trial());
        retrial.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_reset() {
        let cb = breaker(1, 10_000);
        let calls = AtomicUsize::new(0);
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_some());
    }
}
