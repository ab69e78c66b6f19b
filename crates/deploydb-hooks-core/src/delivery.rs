//! # Report Delivery
//!
//! Outbound reports are handed to an [`OutboundChannel`], which accepts or
//! rejects each envelope synchronously. The [`DeliveryDispatcher`] retries
//! rejected pushes a bounded number of times, waiting between attempts on the
//! tokio timer so only the dispatching task is suspended.
//!
//! The channel and the worker draining it are created once at process start;
//! [`HookQueue`] is the in-process implementation.
//!
//! ```text
//! PENDING --push accepted--> ENQUEUED
//!    |
//!    +--rejected, attempts left--> wait, push again
//!    +--rejected, no attempts left / channel closed--> EXHAUSTED
//! ```

use crate::retry::{RetryPolicy, RetryState};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

/// Number of times an envelope is offered to the channel
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Wait between rejected attempts
pub const DELIVERY_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Outbound HTTP request waiting to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEnvelope {
    pub url: String,
    pub body: String,
    pub content_type: String,
}

impl DeliveryEnvelope {
    /// Create an envelope for a JSON body
    pub fn json(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }
}

/// Reasons a channel rejects an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Outbound channel is full")]
    Full,

    #[error("Outbound channel is closed")]
    Closed,
}

impl ChannelError {
    /// Check if this error is transient and might succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Full)
    }
}

/// Destination for outbound envelopes
pub trait OutboundChannel: Send + Sync {
    /// Offer an envelope, without blocking
    fn push(&self, envelope: DeliveryEnvelope) -> Result<(), ChannelError>;
}

/// Final state of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The channel accepted the envelope
    Enqueued { attempts: u32 },

    /// The envelope was dropped
    Exhausted { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, DeliveryOutcome::Enqueued { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Enqueued { attempts } | DeliveryOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }
}

/// Retrying enqueue of outbound envelopes
#[derive(Clone)]
pub struct DeliveryDispatcher {
    channel: Arc<dyn OutboundChannel>,
    policy: RetryPolicy,
}

impl DeliveryDispatcher {
    /// Create a dispatcher with a custom retry policy
    pub fn new(channel: Arc<dyn OutboundChannel>, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    /// Create a dispatcher making [`MAX_DELIVERY_ATTEMPTS`] attempts,
    /// [`DELIVERY_RETRY_INTERVAL`] apart
    pub fn with_defaults(channel: Arc<dyn OutboundChannel>) -> Self {
        Self::new(
            channel,
            RetryPolicy::fixed(MAX_DELIVERY_ATTEMPTS, DELIVERY_RETRY_INTERVAL),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Offer `envelope` to the channel until it is accepted or attempts run out
    ///
    /// A full channel is retried after the policy's delay; there is no wait
    /// after the final attempt. A closed channel ends the sequence at once.
    /// Every envelope that is not enqueued is logged.
    pub async fn dispatch(&self, envelope: DeliveryEnvelope) -> DeliveryOutcome {
        let mut state = RetryState::new();

        loop {
            state.record_attempt();

            match self.channel.push(envelope.clone()) {
                Ok(()) => {
                    debug!(
                        url = %envelope.url,
                        attempts = state.attempts,
                        "Enqueued report for delivery"
                    );
                    return DeliveryOutcome::Enqueued {
                        attempts: state.attempts,
                    };
                }
                Err(e) if !e.is_transient() => {
                    error!(
                        url = %envelope.url,
                        body = %envelope.body,
                        attempts = state.attempts,
                        error = %e,
                        "Failed to enqueue report for delivery, outbound channel is gone"
                    );
                    return DeliveryOutcome::Exhausted {
                        attempts: state.attempts,
                    };
                }
                Err(e) => {
                    if !state.can_retry(&self.policy) {
                        warn!(
                            url = %envelope.url,
                            body = %envelope.body,
                            attempts = state.attempts,
                            error = %e,
                            "Failed to enqueue report for delivery, giving up"
                        );
                        return DeliveryOutcome::Exhausted {
                            attempts: state.attempts,
                        };
                    }

                    let delay = state.get_delay(&self.policy);
                    debug!(
                        url = %envelope.url,
                        attempt = state.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Outbound channel rejected report, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Run [`DeliveryDispatcher::dispatch`] on a new task
    pub fn spawn_dispatch(
        &self,
        envelope: DeliveryEnvelope,
    ) -> tokio::task::JoinHandle<DeliveryOutcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(envelope).await })
    }
}

// ============================================================================
// In-Process Hook Queue
// ============================================================================

/// Bounded in-process outbound channel
///
/// Cloning shares the same queue.
#[derive(Debug, Clone)]
pub struct HookQueue {
    sender: mpsc::Sender<DeliveryEnvelope>,
}

/// Draining side of a [`HookQueue`], owned by the delivery worker
#[derive(Debug)]
pub struct HookQueueReceiver {
    receiver: mpsc::Receiver<DeliveryEnvelope>,
}

impl HookQueue {
    /// Create a queue holding at most `capacity` envelopes (minimum 1)
    pub fn bounded(capacity: usize) -> (HookQueue, HookQueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        info!(capacity = capacity.max(1), "Created outbound hook queue");
        (HookQueue { sender }, HookQueueReceiver { receiver })
    }

    /// Whether the worker side has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl OutboundChannel for HookQueue {
    fn push(&self, envelope: DeliveryEnvelope) -> Result<(), ChannelError> {
        self.sender.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

impl HookQueueReceiver {
    /// Wait for the next envelope
    ///
    /// Returns `None` once every [`HookQueue`] handle has been dropped and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<DeliveryEnvelope> {
        self.receiver.recv().await
    }

    /// Take the next envelope if one is waiting
    pub fn try_recv(&mut self) -> Option<DeliveryEnvelope> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
