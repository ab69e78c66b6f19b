//! # Trigger Endpoint
//!
//! Transport-independent handling of an inbound DeployDB webhook: read the
//! body, classify the event from its content type, find the matching jobs and
//! schedule a build of each with the event attached.

use crate::{
    builds::BuildScheduler, event_kind::EventKind, payload::TriggerEvent, registry::RegistryError,
    trigger::TriggerAggregator, BuildNumber, JobId,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Reasons an inbound webhook is rejected
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("This endpoint expects a POST request with a JSON object body: {message}")]
    MalformedBody { message: String },

    #[error("Unsupported DeployDB event type: {}", .content_type.as_deref().unwrap_or("<none>"))]
    UnsupportedEventType { content_type: Option<String> },

    #[error("Failed to evaluate job triggers: {0}")]
    Registry(#[from] RegistryError),
}

impl InboundError {
    /// Whether the sender caused the rejection
    pub fn is_client_error(&self) -> bool {
        !matches!(self, InboundError::Registry(_))
    }
}

/// Builds scheduled for one webhook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggeredBuilds {
    pub builds: Vec<(JobId, BuildNumber)>,
}

impl TriggeredBuilds {
    pub fn count(&self) -> usize {
        self.builds.len()
    }

    /// Plain-text response for the webhook sender
    pub fn message(&self) -> String {
        match self.count() {
            1 => "Triggered 1 build".to_string(),
            n => format!("Triggered {} builds", n),
        }
    }
}

/// Inbound webhook handler
#[derive(Clone)]
pub struct TriggerEndpoint {
    aggregator: TriggerAggregator,
    scheduler: Arc<dyn BuildScheduler>,
}

impl TriggerEndpoint {
    /// Create new endpoint
    pub fn new(aggregator: TriggerAggregator, scheduler: Arc<dyn BuildScheduler>) -> Self {
        Self {
            aggregator,
            scheduler,
        }
    }

    /// Handle one webhook
    ///
    /// The body is read before the content type is looked at, so a malformed
    /// body is reported as such whatever its content type. A job the scheduler
    /// refuses is logged and left out of the result; finding no jobs at all is
    /// still a success.
    ///
    /// # Errors
    /// - `InboundError::MalformedBody` - body is not a JSON object
    /// - `InboundError::UnsupportedEventType` - content type missing or unknown
    /// - `InboundError::Registry` - jobs could not be enumerated
    pub fn handle(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<TriggeredBuilds, InboundError> {
        let event = TriggerEvent::from_json(body).map_err(|e| {
            warn!(error = %e, "Received DeployDB webhook without a valid JSON body");
            InboundError::MalformedBody {
                message: e.to_string(),
            }
        })?;

        let Some(kind) = EventKind::resolve(content_type) else {
            warn!(
                content_type = content_type.unwrap_or("<none>"),
                "Received DeployDB webhook with unsupported content type"
            );
            return Err(InboundError::UnsupportedEventType {
                content_type: content_type.map(str::to_string),
            });
        };

        let event = Arc::new(event.with_kind(kind));

        let targets = self.aggregator.find_targets(&event).map_err(|e| {
            error!(
                deployment_id = %event.id(),
                error = %e,
                "Failed to enumerate jobs for DeployDB webhook"
            );
            InboundError::Registry(e)
        })?;

        let mut triggered = TriggeredBuilds::default();
        for job in targets {
            match self.scheduler.schedule(&job, Some(event.clone())) {
                Ok(number) => {
                    info!(
                        job = %job,
                        build_number = %number,
                        deployment_id = %event.id(),
                        event_kind = %kind,
                        "Triggered build from DeployDB webhook"
                    );
                    triggered.builds.push((job, number));
                }
                Err(e) => {
                    warn!(
                        job = %job,
                        deployment_id = %event.id(),
                        error = %e,
                        "Build scheduler refused DeployDB-triggered build"
                    );
                }
            }
        }

        Ok(triggered)
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
