//! # Trigger Aggregation
//!
//! Finds every job whose DeployDB trigger accepts an inbound event.

use crate::{
    payload::TriggerEvent,
    registry::{JobRegistry, RegistryError},
    security::{ElevatedScope, SecurityContext},
    JobId,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, info};

/// Evaluates an event against the triggers of all registered jobs
#[derive(Clone)]
pub struct TriggerAggregator {
    registry: Arc<dyn JobRegistry>,
    security: Arc<dyn SecurityContext>,
}

impl TriggerAggregator {
    /// Create new aggregator
    pub fn new(registry: Arc<dyn JobRegistry>, security: Arc<dyn SecurityContext>) -> Self {
        Self { registry, security }
    }

    /// Find the jobs that should be triggered by `event`
    ///
    /// Jobs are enumerated as the system principal, so jobs hidden from the
    /// current principal are still considered. The previous principal is
    /// restored before this returns, whether it succeeds or not.
    ///
    /// A job is selected when it is buildable, has a trigger with at least one
    /// rule, and any of those rules accepts the event.
    ///
    /// # Errors
    /// Returns the first error raised while enumerating the registry.
    pub fn find_targets(&self, event: &TriggerEvent) -> Result<BTreeSet<JobId>, RegistryError> {
        let _scope = ElevatedScope::enter(self.security.as_ref());

        let mut targets = BTreeSet::new();
        for job in self.registry.jobs() {
            let job = job?;

            if !job.buildable {
                debug!(job = %job.id, "Skipping job that is not buildable");
                continue;
            }

            let Some(trigger) = &job.trigger else {
                continue;
            };

            if trigger.rules.iter().any(|rule| rule.accepts(event)) {
                targets.insert(job.id);
            }
        }

        info!(
            deployment_id = %event.id(),
            service = event.service().unwrap_or_default(),
            event_kind = ?event.kind(),
            target_count = targets.len(),
            "Evaluated DeployDB triggers"
        );

        Ok(targets)
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
