//! # Builds
//!
//! Scheduling contract towards the host build system and the records that flow
//! back from it. A build started by DeployDB keeps its triggering event attached
//! until it completes; the event is shared read-only from then on.

use crate::{environment::build_environment, payload::TriggerEvent, BuildNumber, JobId, Timestamp};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info};

/// Final result of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success)
    }
}

/// Build waiting for, or in, execution
#[derive(Debug, Clone)]
pub struct ScheduledBuild {
    pub job: JobId,
    pub number: BuildNumber,

    /// Event that caused the build, if DeployDB started it
    pub trigger: Option<Arc<TriggerEvent>>,

    pub queued_at: Timestamp,
}

impl ScheduledBuild {
    /// Variables exported to the build's steps
    ///
    /// Empty for builds that DeployDB did not start.
    pub fn environment(&self) -> BTreeMap<String, String> {
        self.trigger
            .as_deref()
            .map(build_environment)
            .unwrap_or_default()
    }
}

/// Summary of a finished build, as reported by the host
#[derive(Debug, Clone)]
pub struct CompletedBuild {
    pub job: JobId,
    pub number: BuildNumber,
    pub result: BuildResult,

    /// Event that caused the build, if DeployDB started it
    pub trigger: Option<Arc<TriggerEvent>>,
}

/// Errors returned when the host refuses to schedule a build
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Build queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Job '{job}' cannot be scheduled: {message}")]
    Rejected { job: String, message: String },
}

impl ScheduleError {
    /// Check if this error is transient and might succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, ScheduleError::QueueFull { .. })
    }
}

/// Host build scheduling
pub trait BuildScheduler: Send + Sync {
    /// Schedule a build of `job`, attaching the triggering event if any
    fn schedule(
        &self,
        job: &JobId,
        trigger: Option<Arc<TriggerEvent>>,
    ) -> Result<BuildNumber, ScheduleError>;
}

#[derive(Debug, Default)]
struct QueueState {
    last_numbers: HashMap<JobId, BuildNumber>,
    pending: HashMap<(JobId, BuildNumber), ScheduledBuild>,
}

/// Build queue held in process memory
///
/// Builds are numbered per job starting at 1 and stay pending until
/// [`InMemoryBuildQueue::complete`] is called for them.
#[derive(Debug)]
pub struct InMemoryBuildQueue {
    state: Mutex<QueueState>,
    capacity: Option<usize>,
}

impl InMemoryBuildQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: None,
        }
    }

    /// Create a queue holding at most `capacity` pending builds
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: Some(capacity),
        }
    }

    /// Look up a pending build
    pub fn pending(&self, job: &JobId, number: BuildNumber) -> Option<ScheduledBuild> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.pending.get(&(job.clone(), number)).cloned()
    }

    /// Number of builds not yet completed
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .len()
    }

    /// Mark a pending build as finished
    ///
    /// Returns `None` if no such build is pending.
    pub fn complete(
        &self,
        job: &JobId,
        number: BuildNumber,
        result: BuildResult,
    ) -> Option<CompletedBuild> {
        let scheduled = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.pending.remove(&(job.clone(), number))?
        };

        info!(
            job = %job,
            build_number = %number,
            result = ?result,
            duration_ms = Timestamp::now().duration_since(scheduled.queued_at).as_millis() as u64,
            "Build completed"
        );

        Some(CompletedBuild {
            job: scheduled.job,
            number: scheduled.number,
            result,
            trigger: scheduled.trigger,
        })
    }
}

impl Default for InMemoryBuildQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildScheduler for InMemoryBuildQueue {
    fn schedule(
        &self,
        job: &JobId,
        trigger: Option<Arc<TriggerEvent>>,
    ) -> Result<BuildNumber, ScheduleError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(capacity) = self.capacity {
            if state.pending.len() >= capacity {
                return Err(ScheduleError::QueueFull { capacity });
            }
        }

        let number = state
            .last_numbers
            .get(job)
            .map(BuildNumber::next)
            .unwrap_or(BuildNumber::new(1));
        state.last_numbers.insert(job.clone(), number);

        state.pending.insert(
            (job.clone(), number),
            ScheduledBuild {
                job: job.clone(),
                number,
                trigger,
                queued_at: Timestamp::now(),
            },
        );

        debug!(job = %job, build_number = %number, "Scheduled build");
        Ok(number)
    }
}

#[cfg(test)]
#[path = "builds_tests.rs"]
mod tests;
