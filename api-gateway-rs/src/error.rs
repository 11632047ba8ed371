//! Gateway error taxonomy and its HTTP rendering

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use input_validation::ValidationError;
use resilience::PolicyError;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::collaborators::{AiClientError, StoreError};

/// Shown for blocked input; the classification itself is never returned
pub const BLOCKED_INPUT_MESSAGE: &str =
    "Your request could not be processed. Please rephrase your request and try again.";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request: {message}")]
    Validation { message: String, details: Vec<String> },

    #[error("{}", BLOCKED_INPUT_MESSAGE)]
    BlockedInput,

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Service temporarily unavailable: {service}")]
    ServiceUnavailable { service: String },

    #[error("Request to {service} timed out")]
    Timeout { service: String },

    #[error("Service overloaded: {service}")]
    Overloaded { service: String },

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] AiClientError),

    #[error("Command store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn not_found<S: Into<String>>(resource: &'static str, id: S) -> Self {
        GatewayError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "VALIDATION_ERROR",
            GatewayError::BlockedInput => "INPUT_BLOCKED",
            GatewayError::NotFound { .. } => "NOT_FOUND",
            GatewayError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            GatewayError::Timeout { .. } => "UPSTREAM_TIMEOUT",
            GatewayError::Overloaded { .. } => "OVERLOADED",
            GatewayError::Upstream(_) => "UPSTREAM_ERROR",
            GatewayError::Store(_) => "STORE_ERROR",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. } | GatewayError::BlockedInput => StatusCode::BAD_REQUEST,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::ServiceUnavailable { .. }
            | GatewayError::Overloaded { .. }
            | GatewayError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Upstream(_) => "The AI service failed to process the request".to_string(),
            GatewayError::Store(_) => "Command storage is temporarily unavailable".to_string(),
            GatewayError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    pub fn into_response_with_id(self, request_id: String) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(request_id = %request_id, code = %self.code(), error = %self, "Request failed");
        }

        let details = match &self {
            GatewayError::Validation { details, .. } if !details.is_empty() => Some(details.clone()),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.public_message(),
                request_id,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for GatewayError {
    fn from(err: ValidationError) -> Self {
        GatewayError::Validation {
            message: "request failed validation".to_string(),
            details: err.details(),
        }
    }
}

impl From<PolicyError<AiClientError>> for GatewayError {
    /// Breaker rejections become `ServiceUnavailable` naming the dependency
    fn from(err: PolicyError<AiClientError>) -> Self {
        match err {
            PolicyError::CircuitOpen { service } => GatewayError::ServiceUnavailable { service },
            PolicyError::BulkheadFull { service } => GatewayError::Overloaded { service },
            PolicyError::Timeout { service, .. } => GatewayError::Timeout { service },
            PolicyError::Operation(inner) => GatewayError::Upstream(inner),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with_id(Uuid::new_v4().to_string())
    }
}

/// `{ "error": { "code", "message", "requestId" } }`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_policy_errors_map_to_distinct_variants() {
        let open: GatewayError = PolicyError::<AiClientError>::CircuitOpen {
            service: "ai-processing".into(),
        }
        .into();
        assert!(matches!(&open, GatewayError::ServiceUnavailable { service } if service == "ai-processing"));
        assert_eq!(open.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(open.to_string(), "Service temporarily unavailable: ai-processing");

        let timeout: GatewayError = PolicyError::<AiClientError>::Timeout {
            service: "ai-processing".into(),
            timeout: Duration::from_secs(1),
        }
        .into();
        assert_eq!(timeout.code(), "UPSTREAM_TIMEOUT");

        let upstream: GatewayError = PolicyError::Operation(AiClientError::Network("reset".into())).into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert!(!upstream.public_message().contains("reset"));
    }

    #[test]
    fn test_blocked_message_is_generic() {
        let err = GatewayError::BlockedInput;
        assert_eq!(err.code(), "INPUT_BLOCKED");
        assert_eq!(err.public_message(), BLOCKED_INPUT_MESSAGE);
        assert!(!err.public_message().to_lowercase().contains("risk"));
    }

    #[test]
    fn test_validation_error_details() {
        let err: GatewayError = ValidationError::TooLong("command has 40000 characters".into()).into();
        match &err {
            GatewayError::Validation { details, .. } => assert_eq!(details.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
