//! # Event Kinds
//!
//! The closed set of DeployDB events a webhook can carry. Each kind is bound to
//! exactly one vendor media type, which DeployDB sends as the `Content-Type` of
//! the webhook request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain event carried by an inbound DeployDB webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DeploymentCreated,
    DeploymentStarted,
    DeploymentCompleted,
    PromotionCompleted,
}

impl EventKind {
    /// Every event kind, in declaration order
    pub const ALL: [EventKind; 4] = [
        EventKind::DeploymentCreated,
        EventKind::DeploymentStarted,
        EventKind::DeploymentCompleted,
        EventKind::PromotionCompleted,
    ];

    /// Wire media type identifying this kind
    pub fn media_type(&self) -> &'static str {
        match self {
            EventKind::DeploymentCreated => "application/vnd.deploydb.deploymentcreated.v1+json",
            EventKind::DeploymentStarted => "application/vnd.deploydb.deploymentstarted.v1+json",
            EventKind::DeploymentCompleted => {
                "application/vnd.deploydb.deploymentcompleted.v1+json"
            }
            EventKind::PromotionCompleted => "application/vnd.deploydb.promotioncompleted.v1+json",
        }
    }

    /// Name used for this kind in job configuration files
    pub fn config_name(&self) -> &'static str {
        match self {
            EventKind::DeploymentCreated => "deployment_created",
            EventKind::DeploymentStarted => "deployment_started",
            EventKind::DeploymentCompleted => "deployment_completed",
            EventKind::PromotionCompleted => "promotion_completed",
        }
    }

    /// Resolve a wire media type to its event kind
    ///
    /// The comparison is an exact, case-insensitive match against the full
    /// identifier. Absent, empty, partial or unknown identifiers resolve to
    /// `None`; there is no fallback kind.
    pub fn resolve(media_type: Option<&str>) -> Option<EventKind> {
        let media_type = media_type?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.media_type().eq_ignore_ascii_case(media_type))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

#[cfg(test)]
#[path = "event_kind_tests.rs"]
mod tests;
