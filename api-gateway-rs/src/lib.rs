//! # API Gateway
//!
//! Brokers AI command requests to the upstream inference service behind
//! per-dependency resilience policies.
//!
//! Synchronous commands are validated, screened for prompt injection,
//! enriched with the caller's file context and sent to the AI service.
//! Asynchronous commands are persisted with a TTL and queued for a worker.

pub mod ai_client;
pub mod audit;
pub mod collaborators;
pub mod error;
pub mod file_context;
pub mod orchestrator;
pub mod repository;
pub mod routes;
pub mod settings;
pub mod store;

pub use audit::{AuditLogger, MemoryAuditSink, TracingAuditSink};
pub use collaborators::{
    AiClient, AiClientError, AuditEntry, AuditError, AuditSeverity, AuditSink, FileRepository, KeyValueStore,
    RepositoryError, StoreError,
};
pub use error::{ErrorResponse, GatewayError};
pub use file_context::FileContextAggregator;
pub use orchestrator::{CommandOrchestrator, AI_SERVICE};
pub use routes::{router, AppState};
pub use store::{AsyncCommandStore, MemoryStore, RedisStore};
