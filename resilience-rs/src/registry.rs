//! # Resilience Policy Registry
//!
//! Hands out one memoized [`ServicePolicy`] per logical dependency name and
//! runs calls through it. A policy is created on first use from the
//! registry's [`ResilienceConfig`] and is never replaced, so every caller of
//! the same dependency shares one breaker and one bulkhead.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bulkhead::{Bulkhead, BulkheadConfig};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitHealth, CircuitState};
use crate::pipeline::{bulkhead_pipeline, execute_pipeline, Layer, PolicyStack};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::types::PolicyResult;

/// Dependency categories used to size bulkheads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCategory {
    AiProcessing,
    Auth,
    Workflow,
    Other,
}

impl DependencyCategory {
    /// Classifies a dependency by the tokens of its name, e.g.
    /// `ai-processing` and `llm.inference` are both AI processing.
    pub fn classify(service: &str) -> Self {
        let tokens: Vec<String> = service
            .split(|c: char| c == '-' || c == '_' || c == '.' || c == ':')
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_lowercase())
            .collect();
        let has = |names: &[&str]| tokens.iter().any(|t| names.contains(&t.as_str()));

        if has(&["ai", "llm", "inference", "openai", "ollama"]) {
            Self::AiProcessing
        } else if has(&["auth", "oauth", "jwt", "identity"]) {
            Self::Auth
        } else if has(&["workflow", "n8n", "automation"]) {
            Self::Workflow
        } else {
            Self::Other
        }
    }
}

/// Bulkhead sizing per dependency category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadCategories {
    pub ai: BulkheadConfig,
    pub auth: BulkheadConfig,
    pub workflow: BulkheadConfig,
    pub default: BulkheadConfig,
}

impl Default for BulkheadCategories {
    fn default() -> Self {
        Self {
            ai: BulkheadConfig {
                max_concurrent: 10,
                max_queue: 50,
            },
            auth: BulkheadConfig {
                max_concurrent: 50,
                max_queue: 100,
            },
            workflow: BulkheadConfig {
                max_concurrent: 20,
                max_queue: 40,
            },
            default: BulkheadConfig::default(),
        }
    }
}

impl BulkheadCategories {
    pub fn for_category(&self, category: DependencyCategory) -> BulkheadConfig {
        match category {
            DependencyCategory::AiProcessing => self.ai,
            DependencyCategory::Auth => self.auth,
            DependencyCategory::Workflow => self.workflow,
            DependencyCategory::Other => self.default,
        }
    }
}

/// Settings every policy in a registry is built from
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub circuit: CircuitBreakerConfig,
    pub retry: RetryConfig,
    /// Timeout used when a call does not pass its own
    pub default_timeout: Duration,
    pub bulkheads: BulkheadCategories,
}

impl Default for ResilienceConfig {
    /// 5 failures to open, 30s cooldown, 30s timeout, 3 attempts
    fn default() -> Self {
        Self {
            circuit: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            default_timeout: Duration::from_secs(30),
            bulkheads: BulkheadCategories::default(),
        }
    }
}

/// Per-call options for [`ResiliencePolicyRegistry::execute`]
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Overrides the policy's default timeout
    pub timeout: Option<Duration>,
    /// Whether the call goes through the retry layer
    pub use_retry: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            use_retry: true,
        }
    }
}

impl ExecuteOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn without_retry(mut self) -> Self {
        self.use_retry = false;
        self
    }
}

/// The policies guarding one dependency
#[derive(Debug)]
pub struct ServicePolicy {
    service_name: String,
    category: DependencyCategory,
    timeout: Duration,
    stack: PolicyStack,
}

impl ServicePolicy {
    fn new(service_name: &str, config: &ResilienceConfig) -> Self {
        let category = DependencyCategory::classify(service_name);
        let stack = PolicyStack {
            service: service_name.to_string(),
            circuit: Arc::new(CircuitBreaker::new(service_name, config.circuit.clone())),
            retry: RetryPolicy::new(service_name, config.retry.clone()),
            bulkhead: Arc::new(Bulkhead::new(service_name, config.bulkheads.for_category(category))),
        };

        Self {
            service_name: service_name.to_string(),
            category,
            timeout: config.default_timeout,
            stack,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn category(&self) -> DependencyCategory {
        self.category
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn circuit(&self) -> &Arc<CircuitBreaker> {
        &self.stack.circuit
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.stack.retry
    }

    pub fn bulkhead(&self) -> &Arc<Bulkhead> {
        &self.stack.bulkhead
    }

    /// Layers a call made with `options` goes through, outermost first
    pub fn layers(&self, options: ExecuteOptions) -> Vec<Layer> {
        execute_pipeline(options.timeout.unwrap_or(self.timeout), options.use_retry)
    }

    /// Layers a bulkhead-guarded call goes through, outermost first
    pub fn bulkhead_layers(&self, timeout: Option<Duration>) -> Vec<Layer> {
        bulkhead_pipeline(timeout.unwrap_or(self.timeout))
    }
}

/// Observable state of one dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub category: DependencyCategory,
    pub circuit: CircuitHealth,
    pub bulkhead_active: usize,
    pub bulkhead_queued: usize,
}

/// Registry of per-dependency resilience policies
#[derive(Debug, Default)]
pub struct ResiliencePolicyRegistry {
    config: ResilienceConfig,
    policies: RwLock<HashMap<String, Arc<ServicePolicy>>>,
}

impl ResiliencePolicyRegistry {
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            config,
            policies: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Returns the policy for `service_name`, creating it on first use
    pub fn get_policy(&self, service_name: &str) -> Arc<ServicePolicy> {
        if let Some(policy) = self.read().get(service_name) {
            return policy.clone();
        }

        let mut policies = self.write();
        policies
            .entry(service_name.to_string())
            .or_insert_with(|| {
                let policy = ServicePolicy::new(service_name, &self.config);
                info!(
                    service = %service_name,
                    category = ?policy.category,
                    failure_threshold = %self.config.circuit.failure_threshold,
                    timeout_ms = %policy.timeout.as_millis(),
                    "Created resilience policy"
                );
                Arc::new(policy)
            })
            .clone()
    }

    /// Runs `operation` through timeout, retry and circuit breaker
    pub async fn execute<'a, F, Fut, T, E>(
        &self,
        service_name: &str,
        operation: F,
        options: ExecuteOptions,
    ) -> PolicyResult<T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
        T: Send + 'a,
        E: Send + 'a,
    {
        let policy = self.get_policy(service_name);
        let layers = policy.layers(options);
        debug!(service = %service_name, layers = ?layers, "Executing with resilience policy");
        policy.stack.run(&layers, operation).await
    }

    /// Runs `operation` through bulkhead, timeout and circuit breaker. A
    /// `None` timeout falls back to the policy default.
    pub async fn execute_with_bulkhead<'a, F, Fut, T, E>(
        &self,
        service_name: &str,
        operation: F,
        timeout: Option<Duration>,
    ) -> PolicyResult<T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
        T: Send + 'a,
        E: Send + 'a,
    {
        let policy = self.get_policy(service_name);
        let layers = policy.bulkhead_layers(timeout);
        debug!(service = %service_name, layers = ?layers, "Executing with bulkhead policy");
        policy.stack.run(&layers, operation).await
    }

    /// Breaker state for `service_name`, `None` if no policy exists yet
    pub fn get_state(&self, service_name: &str) -> Option<CircuitState> {
        self.read().get(service_name).map(|p| p.circuit().state())
    }

    /// Breaker state of every known dependency
    pub fn get_all_states(&self) -> BTreeMap<String, CircuitState> {
        self.read()
            .iter()
            .map(|(name, policy)| (name.clone(), policy.circuit().state()))
            .collect()
    }

    /// Health snapshot of every known dependency
    pub fn health(&self) -> BTreeMap<String, ServiceHealth> {
        self.read()
            .iter()
            .map(|(name, policy)| {
                let health = ServiceHealth {
                    category: policy.category,
                    circuit: policy.circuit().health(),
                    bulkhead_active: policy.bulkhead().active(),
                    bulkhead_queued: policy.bulkhead().queued(),
                };
                (name.clone(), health)
            })
            .collect()
    }

    /// Forces the breaker for `service_name` closed. Returns false if no
    /// policy exists yet.
    pub fn reset(&self, service_name: &str) -> bool {
        match self.read().get(service_name) {
            Some(policy) => {
                policy.circuit().reset();
                true
            }
            None => false,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ServicePolicy>>> {
        self.policies.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ServicePolicy>>> {
        self.policies.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
