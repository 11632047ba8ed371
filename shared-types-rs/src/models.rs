// shared-types-rs/src/models.rs
// Command, file and AI result models shared by the gateway crates

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Redis-style key prefix for persisted command records
pub const COMMAND_KEY_PREFIX: &str = "command:";
/// List key of the FIFO work queue
pub const COMMAND_QUEUE_KEY: &str = "command:queue";

/// Upstream models a command may be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiModel {
    #[default]
    #[serde(rename = "llama3.2")]
    Llama32,
    #[serde(rename = "codellama")]
    CodeLlama,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "claude-3-5-sonnet")]
    Claude35Sonnet,
}

impl AiModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiModel::Llama32 => "llama3.2",
            AiModel::CodeLlama => "codellama",
            AiModel::Mistral => "mistral",
            AiModel::Gpt4o => "gpt-4o",
            AiModel::Claude35Sonnet => "claude-3-5-sonnet",
        }
    }
}

impl fmt::Display for AiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

/// A command submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// Client-supplied correlation id, echoed in logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "command")]
    pub command_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub model: AiModel,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Queue the command instead of waiting for the result
    #[serde(default, rename = "async")]
    pub run_async: bool,
}

impl CommandRequest {
    pub fn new<S: Into<String>>(command_text: S) -> Self {
        Self {
            id: None,
            command_text: command_text.into(),
            session_id: None,
            file_ids: Vec::new(),
            system_prompt: None,
            variables: None,
            model: AiModel::default(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            run_async: false,
        }
    }

    pub fn with_files<I, S>(mut self, file_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_ids = file_ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Lifecycle of a queued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandStatus::Queued => "queued",
            CommandStatus::Processing => "processing",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Generates a new command id of the form `cmd_<32 hex chars>`
pub fn new_command_id() -> String {
    format!("cmd_{}", Uuid::new_v4().simple())
}

/// Persisted snapshot of an asynchronous command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub id: String,
    pub user_id: String,
    pub request: CommandRequest,
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AiProcessingResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Lifetime of the record in seconds, refreshed on every write
    pub ttl: u64,
}

impl CommandRecord {
    /// A freshly queued record
    pub fn queued(id: String, user_id: String, request: CommandRequest, ttl: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            request,
            status: CommandStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            ttl,
        }
    }

    pub fn storage_key(id: &str) -> String {
        format!("{}{}", COMMAND_KEY_PREFIX, id)
    }
}

/// File metadata as reported by the file repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
}

/// A file's content prepared for inclusion in an AI payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContext {
    pub file_id: String,
    pub filename: String,
    pub content: String,
}

impl FileContext {
    /// The delimited block sent upstream
    pub fn block(&self) -> String {
        format!("--- File: {} ---\n{}\n--- End File ---", self.filename, self.content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result returned by the AI processing service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiProcessingResult {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub usage: TokenUsage,
    pub finish_reason: String,
}

/// Payload sent to the AI processing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiCommandPayload {
    pub command_id: String,
    pub user_id: String,
    pub command: String,
    /// Delimited file blocks, see [`FileContext::block`]
    pub file_contexts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, serde_json::Value>>,
    pub model: AiModel,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response to a synchronously processed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub id: String,
    pub status: CommandStatus,
    pub result: AiProcessingResult,
    pub file_count: usize,
    pub execution_time_ms: u64,
}

/// Acknowledgment for a queued command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCommand {
    pub id: String,
    pub status: CommandStatus,
    pub polling_url: String,
    pub websocket_url: String,
}

/// Client view of a command's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandStatusView {
    pub id: String,
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AiProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommandRecord> for CommandStatusView {
    fn from(record: CommandRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            result: record.result,
            error: record.error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
