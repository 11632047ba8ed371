//! # Bulkhead
//!
//! Caps how much of the process a single dependency may occupy: at most
//! `max_concurrent` calls run at once and at most `max_queue` more wait for a
//! slot. A call arriving when both are full is rejected before the operation
//! is invoked.
//!
//! Layer contract: the only error this layer originates is
//! [`PolicyError::BulkheadFull`]; errors from the inner call pass through
//! unchanged. A capacity rejection is not an upstream failure and therefore
//! sits outside any circuit breaker's accounting.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::types::{PolicyError, PolicyResult};

/// Sizing for a bulkhead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadConfig {
    /// Calls allowed to run at the same time
    pub max_concurrent: usize,
    /// Calls allowed to wait for a free slot
    pub max_queue: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 25,
            max_queue: 50,
        }
    }
}

/// Bulkhead for isolating one dependency's load
#[derive(Debug)]
pub struct Bulkhead {
    service: String,
    config: BulkheadConfig,
    /// Running plus waiting calls
    admitted: AtomicUsize,
    /// Running calls
    active: Arc<AtomicUsize>,
    slots: Arc<Semaphore>,
}

impl Bulkhead {
    /// Creates a new bulkhead
    pub fn new<S: Into<String>>(service: S, config: BulkheadConfig) -> Self {
        Self {
            service: service.into(),
            config,
            admitted: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
        }
    }

    /// Bulkhead sizing
    pub fn config(&self) -> BulkheadConfig {
        self.config
    }

    /// Calls currently holding an execution slot
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Calls waiting for an execution slot
    pub fn queued(&self) -> usize {
        self.admitted.load(Ordering::SeqCst).saturating_sub(self.active())
    }

    /// Remaining admissions before calls are rejected
    pub fn remaining_capacity(&self) -> usize {
        (self.config.max_concurrent + self.config.max_queue)
            .saturating_sub(self.admitted.load(Ordering::SeqCst))
    }

    /// Executes `operation` once a slot is free, or rejects it immediately if
    /// the bulkhead and its queue are full.
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> PolicyResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PolicyResult<T, E>>,
    {
        let capacity = self.config.max_concurrent + self.config.max_queue;
        let admitted = self
            .admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < capacity).then_some(current + 1)
            });

        if admitted.is_err() {
            counter!("resilience.bulkhead.rejected", 1, "service" => self.service.clone());
            warn!(
                service = %self.service,
                max_concurrent = %self.config.max_concurrent,
                max_queue = %self.config.max_queue,
                "Bulkhead full, request rejected"
            );
            return Err(PolicyError::BulkheadFull {
                service: self.service.clone(),
            });
        }
        let _admission = Admission(&self.admitted);

        // The semaphore is never closed, so acquisition only fails if that
        // invariant is broken; treat it like a full bulkhead.
        let _slot = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Err(PolicyError::BulkheadFull {
                    service: self.service.clone(),
                })
            }
        };
        let _running = Running::enter(self.active.clone());

        gauge!("resilience.bulkhead.active", self.active() as f64, "service" => self.service.clone());
        debug!(service = %self.service, active = %self.active(), queued = %self.queued(), "Bulkhead slot acquired");

        operation().await
    }
}

struct Admission<'a>(&'a AtomicUsize);

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Running(Arc<AtomicUsize>);

impl Running {
    fn enter(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
