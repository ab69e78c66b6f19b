//! # Build Completion Listener
//!
//! Reports the result of every DeployDB-triggered build back to DeployDB.
//! Nothing here fails the build: every problem ends in a logged
//! [`ReportOutcome`].

use crate::{
    builds::CompletedBuild,
    config::DeployDbConfig,
    delivery::{DeliveryDispatcher, DeliveryEnvelope, DeliveryOutcome},
    registry::JobRegistry,
    report::ReportWebhook,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to a build's report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// DeployDB did not start the build
    NotTriggered,

    /// The job is configured in silent mode
    Silenced,

    /// No usable DeployDB base URL is configured
    NotConfigured,

    /// The report could not be serialized
    SerializationFailed,

    /// The report was handed to the dispatcher
    Delivered(DeliveryOutcome),
}

/// Turns completed builds into DeployDB reports
#[derive(Clone)]
pub struct BuildCompletionListener {
    deploydb: DeployDbConfig,
    root_url: String,
    registry: Arc<dyn JobRegistry>,
    dispatcher: DeliveryDispatcher,
}

impl BuildCompletionListener {
    /// Create new listener
    ///
    /// `root_url` is the public address of the build system, used to link
    /// reports to their builds.
    pub fn new(
        deploydb: DeployDbConfig,
        root_url: impl Into<String>,
        registry: Arc<dyn JobRegistry>,
        dispatcher: DeliveryDispatcher,
    ) -> Self {
        Self {
            deploydb,
            root_url: root_url.into(),
            registry,
            dispatcher,
        }
    }

    /// Report a completed build
    ///
    /// Waits for the dispatcher's enqueue attempts, not for HTTP delivery.
    pub async fn on_completed(&self, build: &CompletedBuild) -> ReportOutcome {
        let Some(trigger) = &build.trigger else {
            return ReportOutcome::NotTriggered;
        };

        if self
            .registry
            .job(&build.job)
            .is_some_and(|job| job.is_silent())
        {
            debug!(
                job = %build.job,
                build_number = %build.number,
                "Job is in silent mode, not reporting build result"
            );
            return ReportOutcome::Silenced;
        }

        let Some(report_url) = self.deploydb.report_url(trigger.id()) else {
            warn!(
                job = %build.job,
                build_number = %build.number,
                "Cannot report build result to DeployDB as no base URL has been configured"
            );
            return ReportOutcome::NotConfigured;
        };

        let report = ReportWebhook::from_build(build, &self.root_url);
        let body = match report.to_json() {
            Ok(body) => body,
            Err(e) => {
                error!(
                    job = %build.job,
                    build_number = %build.number,
                    report = ?report,
                    error = %e,
                    "Failed to serialize build report"
                );
                return ReportOutcome::SerializationFailed;
            }
        };

        let outcome = self
            .dispatcher
            .dispatch(DeliveryEnvelope::json(report_url.clone(), body))
            .await;

        info!(
            job = %build.job,
            build_number = %build.number,
            deployment_id = %trigger.id(),
            status = ?report.status,
            url = %report_url,
            enqueued = outcome.is_enqueued(),
            attempts = outcome.attempts(),
            "Processed DeployDB build report"
        );

        ReportOutcome::Delivered(outcome)
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
