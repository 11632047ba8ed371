//! # Resilience Policies
//!
//! Per-dependency fault isolation for the command gateway.
//!
//! ## Features
//!
//! - Consecutive-failure circuit breakers with a single half-open trial
//! - Bounded retries with capped exponential backoff
//! - Bulkheads sized by dependency category
//! - Aggressive timeouts that release the caller at the deadline
//! - A registry memoizing one policy per logical dependency name
//! - Structured logging initialization shared by the gateway binaries

pub mod bulkhead;
pub mod circuit_breaker;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod timeout;
pub mod types;

// Re-export commonly used types
pub use bulkhead::{Bulkhead, BulkheadConfig};
pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitHealth, CircuitState};
pub use logging::{init_logging, LoggingConfig, LoggingError};
pub use pipeline::Layer;
pub use registry::{
    BulkheadCategories, DependencyCategory, ExecuteOptions, ResilienceConfig, ResiliencePolicyRegistry,
    ServiceHealth, ServicePolicy,
};
pub use retry::{RetryConfig, RetryPolicy};
pub use timeout::DeadlineSignal;
pub use types::{PolicyError, PolicyResult};
