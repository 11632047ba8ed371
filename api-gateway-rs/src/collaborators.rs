//! External collaborator contracts
//!
//! The gateway core talks to four dependencies it does not own: the AI
//! processing service, the file repository, the audit sink and a shared
//! key-value/queue store. Each is a trait so deployments and tests can swap
//! implementations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{AiCommandPayload, AiProcessingResult, FileMetadata};

#[derive(Debug, thiserror::Error)]
pub enum AiClientError {
    #[error("AI service request failed: {0}")]
    Network(String),

    #[error("AI service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse AI service response: {0}")]
    Parse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("File repository unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid file repository response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store command failed: {0}")]
    Command(String),

    #[error("Failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit sink rejected entry: {0}")]
    Rejected(String),

    #[error("Audit dispatcher is shut down")]
    Closed,
}

/// AI processing service
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Processes a command payload. May be invoked more than once for the
    /// same command id when retries are enabled.
    async fn process_command(&self, payload: &AiCommandPayload) -> Result<AiProcessingResult, AiClientError>;
}

/// File metadata and content lookup
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn find_by_id(&self, file_id: &str) -> Result<Option<FileMetadata>, RepositoryError>;

    async fn get_content(&self, file_id: &str) -> Result<Option<String>, RepositoryError>;
}

/// Audit event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

/// One audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event: String,
    pub user_id: String,
    pub resource_id: Option<String>,
    pub severity: AuditSeverity,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new<E: Into<String>, U: Into<String>>(event: E, user_id: U, severity: AuditSeverity) -> Self {
        Self {
            event: event.into(),
            user_id: user_id.into(),
            resource_id: None,
            severity,
            details: Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn resource<S: Into<String>>(mut self, resource_id: S) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Destination for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Shared key-value store with expiring values and FIFO lists
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_with_expiry(&self, key: &str, ttl: Duration, value: &str) -> Result<(), StoreError>;

    /// `None` when the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn push_tail(&self, list_key: &str, value: &str) -> Result<(), StoreError>;

    async fn pop_head(&self, list_key: &str) -> Result<Option<String>, StoreError>;

    async fn list_len(&self, list_key: &str) -> Result<usize, StoreError>;
}
