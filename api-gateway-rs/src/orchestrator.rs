//! # Command Orchestrator
//!
//! Turns a command request into an AI response or a queued acknowledgment.
//! Synchronous commands are screened by the prompt sanitizer, enriched with
//! file context and sent to the AI service through the `ai-processing`
//! resilience policy. Queued commands are persisted for an external worker
//! and never reach the AI service from here.

use std::sync::Arc;
use std::time::Instant;

use input_validation::{validate_command_request, PromptSanitizer, RiskLevel, SanitizedPrompt};
use metrics::{counter, histogram};
use resilience::{ExecuteOptions, ResiliencePolicyRegistry};
use serde_json::json;
use shared_types::config::CommandSettings;
use shared_types::{
    new_command_id, AiCommandPayload, CommandRecord, CommandRequest, CommandResponse, CommandStatus,
    CommandStatusView, QueuedCommand,
};
use tracing::{info, instrument, warn};

use crate::audit::AuditLogger;
use crate::collaborators::{AiClient, AuditEntry, AuditSeverity};
use crate::error::GatewayError;
use crate::file_context::FileContextAggregator;
use crate::store::AsyncCommandStore;

/// Resilience policy name for the AI processing service
pub const AI_SERVICE: &str = "ai-processing";

pub struct CommandOrchestrator {
    registry: Arc<ResiliencePolicyRegistry>,
    ai: Arc<dyn AiClient>,
    files: FileContextAggregator,
    store: AsyncCommandStore,
    audit: Arc<AuditLogger>,
    sanitizer: PromptSanitizer,
    settings: CommandSettings,
}

impl CommandOrchestrator {
    pub fn new(
        registry: Arc<ResiliencePolicyRegistry>,
        ai: Arc<dyn AiClient>,
        files: FileContextAggregator,
        store: AsyncCommandStore,
        audit: Arc<AuditLogger>,
        settings: CommandSettings,
    ) -> Self {
        Self {
            registry,
            ai,
            files,
            store,
            audit,
            sanitizer: PromptSanitizer::new(settings.strict_mode),
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ResiliencePolicyRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &AsyncCommandStore {
        &self.store
    }

    /// Processes a command and waits for the AI result
    #[instrument(skip(self, request), fields(command_id))]
    pub async fn process_command(&self, user_id: &str, request: CommandRequest) -> Result<CommandResponse, GatewayError> {
        let started = Instant::now();
        validate_command_request(&request)?;

        let command_id = new_command_id();
        tracing::Span::current().record("command_id", command_id.as_str());

        let screened = self.screen(user_id, &command_id, &request).await?;
        let contexts = self.files.load_file_contexts(user_id, &request.file_ids).await;

        let payload = AiCommandPayload {
            command_id: command_id.clone(),
            user_id: user_id.to_string(),
            command: screened.text,
            file_contexts: contexts.iter().map(|c| c.block()).collect(),
            system_prompt: request.system_prompt,
            variables: request.variables,
            model: request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let outcome = self
            .registry
            .execute(
                AI_SERVICE,
                || self.ai.process_command(&payload),
                ExecuteOptions::with_timeout(self.settings.ai_timeout()),
            )
            .await;
        let execution_time_ms = started.elapsed().as_millis() as u64;
        histogram!("gateway.commands.duration_ms", execution_time_ms as f64);

        match outcome {
            Ok(result) => {
                counter!("gateway.commands.processed", 1, "outcome" => "success");
                info!(
                    user_id = %user_id,
                    files = contexts.len(),
                    execution_time_ms = execution_time_ms,
                    "Command processed"
                );
                self.audit.log_async(
                    AuditEntry::new("command_processed", user_id, AuditSeverity::Info)
                        .resource(&command_id)
                        .details(json!({
                            "model": result.model,
                            "totalTokens": result.usage.total_tokens,
                            "fileCount": contexts.len(),
                            "executionTimeMs": execution_time_ms,
                        })),
                );
                Ok(CommandResponse {
                    id: command_id,
                    status: CommandStatus::Completed,
                    result,
                    file_count: contexts.len(),
                    execution_time_ms,
                })
            }
            Err(err) => {
                let err = GatewayError::from(err);
                counter!("gateway.commands.processed", 1, "outcome" => err.code());
                warn!(user_id = %user_id, error = %err, "Command failed");
                self.audit.log_async(
                    AuditEntry::new("command_failed", user_id, AuditSeverity::Warning)
                        .resource(&command_id)
                        .details(json!({ "code": err.code(), "executionTimeMs": execution_time_ms })),
                );
                Err(err)
            }
        }
    }

    /// Persists a command for the worker and returns where to follow it
    #[instrument(skip(self, request))]
    pub async fn queue_command(&self, user_id: &str, request: CommandRequest) -> Result<QueuedCommand, GatewayError> {
        validate_command_request(&request)?;

        let command_id = new_command_id();
        let record = CommandRecord::queued(
            command_id.clone(),
            user_id.to_string(),
            request,
            self.store.ttl().as_secs(),
        );
        self.store.enqueue(&record).await?;

        counter!("gateway.commands.queued", 1);
        info!(command_id = %command_id, user_id = %user_id, "Command queued");
        self.audit.log_async(
            AuditEntry::new("command_queued", user_id, AuditSeverity::Info).resource(&command_id),
        );

        Ok(QueuedCommand {
            polling_url: format!("{}/{}", self.settings.polling_path_prefix, command_id),
            websocket_url: format!("{}/{}", self.settings.websocket_path_prefix, command_id),
            id: command_id,
            status: CommandStatus::Queued,
        })
    }

    /// Current state of a queued command. Expired and unknown ids are both
    /// reported as not found.
    pub async fn get_command_status(&self, command_id: &str) -> Result<CommandStatusView, GatewayError> {
        match self.store.get(command_id).await? {
            Some(record) => Ok(record.into()),
            None => Err(GatewayError::not_found("command", command_id)),
        }
    }

    async fn screen(
        &self,
        user_id: &str,
        command_id: &str,
        request: &CommandRequest,
    ) -> Result<SanitizedPrompt, GatewayError> {
        let screened = self.sanitizer.sanitize(&request.command_text);
        if screened.risk < RiskLevel::High {
            return Ok(screened);
        }

        let details = json!({
            "riskLevel": screened.risk,
            "detections": screened.detections,
            "sessionId": request.session_id,
        });

        if screened.blocked {
            counter!("gateway.commands.blocked", 1);
            warn!(user_id = %user_id, detections = ?screened.detections, "Blocked high-risk command");
            self.audit
                .log(
                    AuditEntry::new("command_blocked", user_id, AuditSeverity::Critical)
                        .resource(command_id)
                        .details(details),
                )
                .await;
            return Err(GatewayError::BlockedInput);
        }

        warn!(user_id = %user_id, detections = ?screened.detections, "High-risk command allowed outside strict mode");
        self.audit.log_async(
            AuditEntry::new("high_risk_input", user_id, AuditSeverity::Warning)
                .resource(command_id)
                .details(details),
        );
        Ok(screened)
    }
}
