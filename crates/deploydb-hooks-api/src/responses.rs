//! Request and response bodies for the API.

use deploydb_hooks_core::{BuildNumber, BuildResult, JobId, Timestamp};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Timestamp::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body of a build completion callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCompletionRequest {
    pub result: BuildResult,
}

/// Acknowledgement of a build completion callback
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildCompletionResponse {
    pub job: JobId,
    pub build_number: BuildNumber,
    pub status: String,

    /// Whether DeployDB started the build, and so will get a report
    pub triggered_by_deploydb: bool,
}
