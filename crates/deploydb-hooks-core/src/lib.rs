//! # DeployDB Hooks Core
//!
//! Core business logic for bridging DeployDB deployment events and a build system.
//!
//! This crate contains the domain logic for classifying inbound DeployDB webhooks,
//! matching them against per-job trigger rules, exporting their payloads into a
//! build environment, and reporting finished builds back to DeployDB.
//!
//! ## Architecture
//!
//! The core depends only on trait abstractions for everything the host build
//! system owns:
//! - [`registry::JobRegistry`] enumerates jobs and their trigger configuration
//! - [`security::SecurityContext`] provides privilege elevation during enumeration
//! - [`builds::BuildScheduler`] schedules builds for matched jobs
//! - [`delivery::OutboundChannel`] accepts outbound report envelopes
//!
//! In-memory implementations of each are provided for tests and for the
//! standalone service.
//!
//! ## Usage
//!
//! ```rust
//! use deploydb_hooks_core::event_kind::EventKind;
//!
//! let kind = EventKind::resolve(Some("application/vnd.deploydb.deploymentstarted.v1+json"));
//! assert_eq!(kind, Some(EventKind::DeploymentStarted));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Numeric identifier of a DeployDB deployment
///
/// Carried by every inbound webhook and used to address the outbound report.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeploymentId(u64);

impl DeploymentId {
    /// Create new deployment ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeploymentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u64>().map_err(|_| ValidationError::InvalidFormat {
            field: "deployment_id".to_string(),
            message: format!("expected a positive integer, got '{}'", s),
        })?;
        Ok(Self::new(id))
    }
}

/// Name of a job in the host build system
///
/// Job names appear in report payloads and in build URLs, so they must be
/// usable as a single URL path segment.
///
/// # Validation Rules
/// - Must be 1-255 characters
/// - Must not contain `/`, `\` or control characters
/// - Must not have leading or trailing whitespace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Create new job ID with validation
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "job_name".to_string(),
            });
        }

        if name.len() > 255 {
            return Err(ValidationError::TooLong {
                field: "job_name".to_string(),
                max_length: 255,
            });
        }

        if name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(ValidationError::InvalidCharacters {
                field: "job_name".to_string(),
                invalid_chars: "slashes or control characters".to_string(),
            });
        }

        if name.trim() != name {
            return Err(ValidationError::InvalidFormat {
                field: "job_name".to_string(),
                message: "cannot start or end with whitespace".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.0
    }
}

/// Sequential build number, unique per job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildNumber(u64);

impl BuildNumber {
    /// Create new build number
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    /// Get numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The number following this one
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get duration since another timestamp
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Event kinds and their wire content types
pub mod event_kind;

/// Inbound webhook payload model
pub mod payload;

/// Flattening of webhook payloads into build environment variables
pub mod environment;

/// Per-rule trigger matching
pub mod rules;

/// Scoped privilege elevation
pub mod security;

/// Job registry abstraction and configuration-backed implementation
pub mod registry;

/// Trigger aggregation across all registered jobs
pub mod trigger;

/// Build scheduling and completion records
pub mod builds;

/// Inbound webhook handling
pub mod endpoint;

/// DeployDB connection settings
pub mod config;

/// Outbound build report payloads
pub mod report;

/// Retry policies
pub mod retry;

/// Outbound channel and retrying report dispatcher
pub mod delivery;

/// Build completion handling
pub mod listener;

// Re-export key types for convenience
pub use builds::{
    BuildResult, BuildScheduler, CompletedBuild, InMemoryBuildQueue, ScheduleError, ScheduledBuild,
};
pub use config::DeployDbConfig;
pub use delivery::{
    ChannelError, DeliveryDispatcher, DeliveryEnvelope, DeliveryOutcome, HookQueue,
    HookQueueReceiver, OutboundChannel,
};
pub use endpoint::{InboundError, TriggerEndpoint, TriggeredBuilds};
pub use environment::{build_environment, flatten, ENV_VAR_PREFIX};
pub use event_kind::EventKind;
pub use listener::{BuildCompletionListener, ReportOutcome};
pub use payload::{PayloadValue, TriggerEvent};
pub use registry::{
    InMemoryJobRegistry, JobConfigError, JobDefinition, JobRegistry, JobsConfiguration,
    RegisteredJob, RegistryError, TriggerConfig,
};
pub use report::{ReportStatus, ReportWebhook};
pub use retry::{RetryPolicy, RetryState};
pub use rules::MatchRule;
pub use security::{ElevatedScope, Principal, SecurityContext, SharedSecurityContext};
pub use trigger::TriggerAggregator;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
