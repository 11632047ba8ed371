//! # Aggressive Timeout
//!
//! Releases the caller at the deadline whether or not the wrapped call has
//! settled. The in-flight future is dropped at that point; any request it had
//! already put on the wire may still be processed by the dependency, so
//! callers must not treat a timeout as proof that nothing happened downstream.
//!
//! Before dropping the call the layer fires a [`DeadlineSignal`]. A circuit
//! breaker watching that signal counts the abandoned attempt as a failure;
//! an attempt dropped for any other reason (the caller went away) is not.
//!
//! Layer contract: originates [`PolicyError::Timeout`]; inner results are
//! returned unchanged when they settle before the deadline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use crate::types::{PolicyError, PolicyResult};

/// Set once a timeout layer gives up on the call it wraps
#[derive(Debug, Clone, Default)]
pub struct DeadlineSignal(Arc<AtomicBool>);

impl DeadlineSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn fired(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Awaits `call` for at most `timeout`, firing `deadline` before the call is
/// dropped
pub async fn with_deadline<Fut, T, E>(
    service: &str,
    timeout: Duration,
    deadline: &DeadlineSignal,
    call: Fut,
) -> PolicyResult<T, E>
where
    Fut: Future<Output = PolicyResult<T, E>>,
{
    let mut call = Box::pin(call);
    match tokio::time::timeout(timeout, call.as_mut()).await {
        Ok(result) => result,
        Err(_) => {
            deadline.fire();
            drop(call);
            counter!("resilience.timeouts", 1, "service" => service.to_string());
            warn!(
                service = %service,
                timeout_ms = %timeout.as_millis(),
                "Call timed out, caller released"
            );
            Err(PolicyError::Timeout {
                service: service.to_string(),
                timeout,
            })
        }
    }
}
