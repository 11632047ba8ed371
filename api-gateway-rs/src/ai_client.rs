//! HTTP client for the AI processing service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared_types::{AiCommandPayload, AiProcessingResult};
use tracing::debug;

use crate::collaborators::{AiClient, AiClientError};

/// Posts command payloads to `{base}/v1/commands/process`
#[derive(Debug, Clone)]
pub struct HttpAiClient {
    client: Client,
    endpoint: String,
}

impl HttpAiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AiClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiClientError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/commands/process", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl AiClient for HttpAiClient {
    async fn process_command(&self, payload: &AiCommandPayload) -> Result<AiProcessingResult, AiClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Command-Id", &payload.command_id)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AiClientError::Network(format!("Request timed out: {}", err))
                } else if err.is_connect() {
                    AiClientError::Network(format!("Connection failed: {}", err))
                } else {
                    AiClientError::Network(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let result: AiProcessingResult = response
            .json()
            .await
            .map_err(|e| AiClientError::Parse(e.to_string()))?;
        debug!(
            command_id = %payload.command_id,
            total_tokens = result.usage.total_tokens,
            "AI service responded"
        );
        Ok(result)
    }
}
