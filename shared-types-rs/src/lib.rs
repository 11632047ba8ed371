pub mod config;
pub mod models;

pub use crate::config::{ConfigError, GatewayConfig, StoreBackend};
pub use crate::models::{
    new_command_id, AiCommandPayload, AiModel, AiProcessingResult, CommandRecord, CommandRequest, CommandResponse,
    CommandStatus, CommandStatusView, FileContext, FileMetadata, QueuedCommand, TokenUsage, COMMAND_KEY_PREFIX,
    COMMAND_QUEUE_KEY,
};
