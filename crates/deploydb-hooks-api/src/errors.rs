//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use deploydb_hooks_core::{InboundError, ValidationError};
use tracing::{error, warn};

/// Trigger webhook failures with HTTP status code mapping
///
/// DeployDB only looks at the status code, so the body is the plain text
/// error message:
///
/// - `400 Bad Request`: the body is not a JSON object
/// - `415 Unsupported Media Type`: the content type names no known event
/// - `500 Internal Server Error`: the job registry could not be read
#[derive(Debug, thiserror::Error)]
pub enum TriggerHandlerError {
    #[error(transparent)]
    Inbound(#[from] InboundError),
}

impl TriggerHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Inbound(InboundError::MalformedBody { .. }) => StatusCode::BAD_REQUEST,
            Self::Inbound(InboundError::UnsupportedEventType { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::Inbound(InboundError::Registry(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TriggerHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Registry details stay in the server log
            Self::Inbound(InboundError::Registry(_)) => {
                "Failed to evaluate job triggers. Please try again later.".to_string()
            }
            Self::Inbound(e) => e.to_string(),
        };

        (status, message).into_response()
    }
}

/// Build callback failures
///
/// - `400 Bad Request`: the job name in the path is not valid
/// - `404 Not Found`: no pending build with that job and number
#[derive(Debug, thiserror::Error)]
pub enum BuildHandlerError {
    #[error("Invalid job name: {0}")]
    InvalidJob(#[from] ValidationError),

    #[error("No pending build #{number} for job {job}")]
    BuildNotFound { job: String, number: u64 },
}

impl IntoResponse for BuildHandlerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidJob(_) => StatusCode::BAD_REQUEST,
            Self::BuildNotFound { job, number } => {
                warn!(job = %job, build_number = number, "Build not found");
                StatusCode::NOT_FOUND
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }

    /// Log and convert to an exit code
    pub fn report(&self) -> i32 {
        error!(error = %self, "Service terminated");
        self.exit_code()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
