//! # Hook Publisher
//!
//! Drains the outbound hook queue on a background task and POSTs each
//! envelope to DeployDB. Failed requests are retried with exponential backoff;
//! a report that still cannot be delivered is logged and dropped, so nothing
//! here ever reaches the build.

use crate::config::PublisherConfig;
use deploydb_hooks_core::{DeliveryEnvelope, HookQueueReceiver, RetryPolicy, RetryState};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Reasons a single delivery fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("DeployDB responded with HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("Failed to reach DeployDB: {message}")]
    Transport { message: String },

    #[error("Failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

impl PublishError {
    /// Check if this error is transient and might succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpStatus { status } => {
                *status == StatusCode::REQUEST_TIMEOUT.as_u16()
                    || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status >= 500
            }
            Self::Transport { .. } => true,
            Self::ClientBuild { .. } => false,
        }
    }
}

/// Final state of one envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// DeployDB accepted the report
    Delivered { status: u16, attempts: u32 },

    /// DeployDB refused the report; retrying would not help
    Rejected { error: PublishError, attempts: u32 },

    /// Every attempt failed with a transient error
    Exhausted { error: PublishError, attempts: u32 },
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PublishOutcome::Delivered { attempts, .. }
            | PublishOutcome::Rejected { attempts, .. }
            | PublishOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// HTTP sender for queued reports
#[derive(Debug, Clone)]
pub struct HookPublisher {
    client: Client,
    policy: RetryPolicy,
}

impl HookPublisher {
    /// Create publisher from configuration
    pub fn new(config: &PublisherConfig) -> Result<Self, PublishError> {
        Self::with_policy(config.retry_policy(), config.request_timeout())
    }

    /// Create publisher with an explicit retry policy
    pub fn with_policy(policy: RetryPolicy, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("deploydb-hooks/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::ClientBuild {
                message: e.to_string(),
            })?;

        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver one envelope, retrying transient failures
    pub async fn deliver(&self, envelope: &DeliveryEnvelope) -> PublishOutcome {
        let mut retry_state = RetryState::new();

        loop {
            retry_state.record_attempt();

            let error = match self.send(envelope).await {
                Ok(status) => {
                    info!(
                        url = %envelope.url,
                        status = status,
                        attempts = retry_state.attempts,
                        "Delivered build report to DeployDB"
                    );
                    return PublishOutcome::Delivered {
                        status,
                        attempts: retry_state.attempts,
                    };
                }
                Err(error) => error,
            };

            if !error.is_transient() {
                error!(
                    url = %envelope.url,
                    error = %error,
                    attempts = retry_state.attempts,
                    "DeployDB rejected build report"
                );
                return PublishOutcome::Rejected {
                    error,
                    attempts: retry_state.attempts,
                };
            }

            if !retry_state.can_retry(&self.policy) {
                error!(
                    url = %envelope.url,
                    error = %error,
                    attempts = retry_state.attempts,
                    "Giving up on build report delivery"
                );
                return PublishOutcome::Exhausted {
                    error,
                    attempts: retry_state.attempts,
                };
            }

            let delay = retry_state.get_delay(&self.policy);
            warn!(
                url = %envelope.url,
                error = %error,
                attempt = retry_state.attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying build report delivery"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send(&self, envelope: &DeliveryEnvelope) -> Result<u16, PublishError> {
        let response = self
            .client
            .post(&envelope.url)
            .header(CONTENT_TYPE, &envelope.content_type)
            .body(envelope.body.clone())
            .send()
            .await
            .map_err(|e| PublishError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(PublishError::HttpStatus {
                status: status.as_u16(),
            })
        }
    }

    /// Deliver queued envelopes until every queue handle is dropped
    pub async fn run(self, mut receiver: HookQueueReceiver) {
        info!("Hook publisher started");

        while let Some(envelope) = receiver.recv().await {
            let outcome = self.deliver(&envelope).await;
            debug!(
                url = %envelope.url,
                delivered = outcome.is_delivered(),
                attempts = outcome.attempts(),
                "Finished build report"
            );
        }

        info!("Hook queue closed, publisher stopping");
    }

    /// Run the publisher on a background task
    pub fn spawn(self, receiver: HookQueueReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
