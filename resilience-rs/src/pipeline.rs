//! # Policy Pipelines
//!
//! A pipeline is an ordered list of [`Layer`]s, outermost first. Each
//! invocation wraps the operation in the layers from the innermost outwards,
//! so `[Timeout, Retry, Circuit]` reads as "a timeout around retries, each
//! retry passing through the breaker".

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, TryFutureExt};

use crate::bulkhead::Bulkhead;
use crate::circuit_breaker::CircuitBreaker;
use crate::retry::RetryPolicy;
use crate::timeout::{with_deadline, DeadlineSignal};
use crate::types::{PolicyError, PolicyResult};

/// One decorator in a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Concurrency cap with a bounded waiting queue
    Bulkhead,
    /// Aggressive deadline for everything inside it
    Timeout(Duration),
    /// Bounded retries with capped exponential backoff
    Retry,
    /// Consecutive-failure circuit breaker
    Circuit,
}

/// Timeout around retries around the breaker, or timeout around the breaker
/// when retries are disabled.
pub fn execute_pipeline(timeout: Duration, use_retry: bool) -> Vec<Layer> {
    if use_retry {
        vec![Layer::Timeout(timeout), Layer::Retry, Layer::Circuit]
    } else {
        vec![Layer::Timeout(timeout), Layer::Circuit]
    }
}

/// Bulkhead around timeout around the breaker. No retries: callers of this
/// pipeline expect high concurrency and want to fail fast.
pub fn bulkhead_pipeline(timeout: Duration) -> Vec<Layer> {
    vec![Layer::Bulkhead, Layer::Timeout(timeout), Layer::Circuit]
}

type Call<'a, T, E> = Arc<dyn Fn() -> BoxFuture<'a, PolicyResult<T, E>> + Send + Sync + 'a>;

/// The components a pipeline's layers draw from
#[derive(Debug, Clone)]
pub struct PolicyStack {
    pub service: String,
    pub circuit: Arc<CircuitBreaker>,
    pub retry: RetryPolicy,
    pub bulkhead: Arc<Bulkhead>,
}

impl PolicyStack {
    /// Runs `operation` through `layers`
    pub async fn run<'a, F, Fut, T, E>(&self, layers: &[Layer], operation: F) -> PolicyResult<T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
        T: Send + 'a,
        E: Send + 'a,
    {
        let mut call: Call<'a, T, E> =
            Arc::new(move || operation().map_err(PolicyError::Operation).boxed());

        let deadline = DeadlineSignal::new();
        for layer in layers.iter().rev() {
            call = self.decorate(*layer, call, &deadline);
        }

        call().await
    }

    fn decorate<'a, T, E>(&self, layer: Layer, inner: Call<'a, T, E>, deadline: &DeadlineSignal) -> Call<'a, T, E>
    where
        T: Send + 'a,
        E: Send + 'a,
    {
        match layer {
            Layer::Circuit => {
                let breaker = self.circuit.clone();
                let deadline = deadline.clone();
                Arc::new(move || {
                    let breaker = breaker.clone();
                    let deadline = deadline.clone();
                    let inner = inner.clone();
                    async move { breaker.call_with_deadline(&deadline, || inner()).await }.boxed()
                })
            }
            Layer::Retry => {
                let retry = self.retry.clone();
                Arc::new(move || {
                    let retry = retry.clone();
                    let inner = inner.clone();
                    async move { retry.run(|| inner()).await }.boxed()
                })
            }
            Layer::Bulkhead => {
                let bulkhead = self.bulkhead.clone();
                Arc::new(move || {
                    let bulkhead = bulkhead.clone();
                    let inner = inner.clone();
                    async move { bulkhead.run(|| inner()).await }.boxed()
                })
            }
            Layer::Timeout(timeout) => {
                let service = self.service.clone();
                let deadline = deadline.clone();
                Arc::new(move || {
                    let service = service.clone();
                    let deadline = deadline.clone();
                    let inner = inner.clone();
                    async move { with_deadline(&service, timeout, &deadline, inner()).await }.boxed()
                })
            }
        }
    }
}
