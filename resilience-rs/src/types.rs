//! # Policy Error Types
//!
//! Every layer of a resilience pipeline reports its own rejection through
//! [`PolicyError`]; failures produced by the wrapped operation travel upward
//! untouched inside [`PolicyError::Operation`].

use std::time::Duration;
use thiserror::Error;

/// Result type for calls made through a resilience pipeline
pub type PolicyResult<T, E> = std::result::Result<T, PolicyError<E>>;

/// Failure surfaced by a resilience-wrapped call
#[derive(Debug, Error)]
pub enum PolicyError<E> {
    /// The breaker for `service` is open (or its half-open trial is taken);
    /// the operation was not invoked.
    #[error("circuit breaker open for service '{service}'")]
    CircuitOpen { service: String },

    /// Both the concurrency slots and the waiting queue were full;
    /// the operation was not invoked.
    #[error("bulkhead capacity exhausted for service '{service}'")]
    BulkheadFull { service: String },

    /// The caller was released at the deadline. The abandoned call may still
    /// have produced side effects downstream.
    #[error("call to service '{service}' timed out after {}ms", timeout.as_millis())]
    Timeout { service: String, timeout: Duration },

    /// The wrapped operation itself failed
    #[error(transparent)]
    Operation(E),
}

impl<E> PolicyError<E> {
    /// Returns true if the breaker rejected the call
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyError::CircuitOpen { .. })
    }

    /// Returns true if the bulkhead rejected the call
    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, PolicyError::BulkheadFull { .. })
    }

    /// Returns true if the deadline elapsed before the call settled
    pub fn is_timeout(&self) -> bool {
        matches!(self, PolicyError::Timeout { .. })
    }

    /// Rejections are raised by the policy itself and never reached the
    /// dependency, so retrying them only adds load.
    pub fn is_rejection(&self) -> bool {
        self.is_circuit_open() || self.is_bulkhead_full()
    }

    /// Name of the service that produced a policy-level failure
    pub fn service(&self) -> Option<&str> {
        match self {
            PolicyError::CircuitOpen { service }
            | PolicyError::BulkheadFull { service }
            | PolicyError::Timeout { service, .. } => Some(service),
            PolicyError::Operation(_) => None,
        }
    }

    /// Extracts the operation error, if that is what failed
    pub fn into_operation(self) -> Option<E> {
        match self {
            PolicyError::Operation(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("upstream exploded")]
    struct Upstream;

    #[test]
    fn test_display_names_service() {
        let err: PolicyError<Upstream> = PolicyError::CircuitOpen {
            service: "ai-processing".to_string(),
        };
        assert!(err.to_string().contains("ai-processing"));
        assert!(err.is_circuit_open());
        assert!(err.is_rejection());
        assert_eq!(err.service(), Some("ai-processing"));
    }

    #[test]
    fn test_operation_is_transparent() {
        let err = PolicyError::Operation(Upstream);
        assert_eq!(err.to_string(), "upstream exploded");
        assert!(!err.is_rejection());
        assert!(err.service().is_none());
        assert!(err.into_operation().is_some());
    }

    #[test]
    fn test_timeout_display() {
        let err: PolicyError<Upstream> = PolicyError::Timeout {
            service: "auth".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "call to service 'auth' timed out after 250ms");
        assert!(err.is_timeout());
    }
}
