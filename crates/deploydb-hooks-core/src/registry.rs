//! # Job Registry
//!
//! The host build system owns its jobs. The trigger path reaches them only
//! through the [`JobRegistry`] trait, which enumerates jobs together with their
//! buildability and DeployDB trigger configuration.
//!
//! [`InMemoryJobRegistry`] backs the standalone service, populated from a
//! YAML or JSON jobs file described by [`JobsConfiguration`].

use crate::{rules::validate_pattern, rules::MatchRule, JobId};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
    sync::RwLock,
};
use tracing::{info, warn};

// ============================================================================
// Registry Contract
// ============================================================================

/// DeployDB trigger configured on a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Rules evaluated with OR semantics; an empty list never matches
    #[serde(default)]
    pub rules: Vec<MatchRule>,

    /// Trigger builds normally but never report their results
    #[serde(default)]
    pub silent_mode: bool,
}

/// Job as seen by the trigger path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredJob {
    pub id: JobId,

    /// Disabled or not yet configured jobs are not buildable
    pub buildable: bool,

    /// DeployDB trigger, if the job has one
    pub trigger: Option<TriggerConfig>,
}

impl RegisteredJob {
    /// Whether the job's results must not be reported
    pub fn is_silent(&self) -> bool {
        self.trigger.as_ref().is_some_and(|t| t.silent_mode)
    }
}

/// Errors raised while enumerating the host's jobs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Job registry unavailable: {message}")]
    Unavailable { message: String },

    #[error("Failed to load job '{job}': {message}")]
    JobUnreadable { job: String, message: String },
}

impl RegistryError {
    /// Check if this error is transient and might succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Unavailable { .. })
    }
}

/// Access to the host build system's jobs
pub trait JobRegistry: Send + Sync {
    /// Enumerate every job
    ///
    /// Enumeration is fallible per item; callers stop at the first error.
    fn jobs(&self) -> Box<dyn Iterator<Item = Result<RegisteredJob, RegistryError>> + '_>;

    /// Look up a single job
    fn job(&self, id: &JobId) -> Option<RegisteredJob>;
}

// ============================================================================
// Jobs Configuration
// ============================================================================

fn default_enabled() -> bool {
    true
}

/// Job entry in the jobs file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: JobId,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub trigger: Option<TriggerConfig>,
}

impl From<JobDefinition> for RegisteredJob {
    fn from(definition: JobDefinition) -> Self {
        Self {
            id: definition.name,
            buildable: definition.enabled,
            trigger: definition.trigger,
        }
    }
}

/// Contents of a jobs file
///
/// ```yaml
/// jobs:
///   - name: deploy-faas
///     trigger:
///       silent_mode: false
///       rules:
///         - event_kind: deployment_started
///           service_pattern: "faas(-.*)?"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfiguration {
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

impl JobsConfiguration {
    /// Load job definitions from a file
    ///
    /// The format follows the file extension (`.yaml`, `.yml`, `.json`); any
    /// other extension is tried as JSON and then as YAML.
    ///
    /// # Errors
    /// - `JobConfigError::FileNotFound` - File missing
    /// - `JobConfigError::ParseError` - Unreadable file or invalid syntax
    /// - `JobConfigError::ValidationError` - Duplicate job names
    pub fn load_from_file(path: &Path) -> Result<Self, JobConfigError> {
        if !path.exists() {
            return Err(JobConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| JobConfigError::ParseError {
            message: format!("Failed to read file: {}", e),
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: JobsConfiguration = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| JobConfigError::ParseError {
                    message: format!("Invalid YAML: {}", e),
                })?
            }
            "json" => serde_json::from_str(&contents).map_err(|e| JobConfigError::ParseError {
                message: format!("Invalid JSON: {}", e),
            })?,
            _ => serde_json::from_str(&contents)
                .or_else(|_| serde_yaml::from_str(&contents))
                .map_err(|e| JobConfigError::ParseError {
                    message: format!("Failed to parse as JSON or YAML: {}", e),
                })?,
        };

        config.validate()?;

        info!(
            path = %path.display(),
            job_count = config.jobs.len(),
            "Loaded job definitions"
        );

        Ok(config)
    }

    /// Validate job definitions
    ///
    /// Duplicate job names are errors. Invalid service patterns are only
    /// warned about: such a rule stays inert without affecting the job's
    /// other rules.
    pub fn validate(&self) -> Result<(), JobConfigError> {
        let mut errors = Vec::new();

        let mut seen_names = HashSet::new();
        for job in &self.jobs {
            if !seen_names.insert(job.name.as_str()) {
                errors.push(format!("Duplicate job name: {}", job.name));
            }
        }

        for job in &self.jobs {
            let Some(trigger) = &job.trigger else {
                continue;
            };

            for (index, rule) in trigger.rules.iter().enumerate() {
                match rule.pattern() {
                    None => warn!(
                        job = %job.name,
                        rule = index,
                        "Trigger rule has no service pattern and will never match"
                    ),
                    Some(pattern) => {
                        if let Err(e) = validate_pattern(pattern) {
                            warn!(
                                job = %job.name,
                                rule = index,
                                pattern = %pattern,
                                error = %e,
                                "Trigger rule has an invalid service pattern and will never match"
                            );
                        }
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(JobConfigError::ValidationError { errors });
        }

        Ok(())
    }
}

/// Errors that can occur while loading job definitions
#[derive(Debug, thiserror::Error)]
pub enum JobConfigError {
    #[error("Jobs file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse jobs file: {message}")]
    ParseError { message: String },

    #[error("Jobs file validation failed: {errors:?}")]
    ValidationError { errors: Vec<String> },
}

// ============================================================================
// In-Memory Registry
// ============================================================================

/// Job registry held in process memory
///
/// Enumeration iterates over a snapshot taken when [`JobRegistry::jobs`] is
/// called, so concurrent updates never affect an evaluation in progress.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<BTreeMap<JobId, RegisteredJob>>,
}

impl InMemoryJobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the configured jobs
    pub fn from_configuration(config: JobsConfiguration) -> Self {
        let registry = Self::new();
        for definition in config.jobs {
            registry.insert(definition.into());
        }
        registry
    }

    /// Add or replace a job
    pub fn insert(&self, job: RegisteredJob) {
        let mut jobs = self
            .jobs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        jobs.insert(job.id.clone(), job);
    }

    /// Enable or disable a job, returning whether it exists
    pub fn set_enabled(&self, id: &JobId, enabled: bool) -> bool {
        let mut jobs = self
            .jobs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match jobs.get_mut(id) {
            Some(job) => {
                job.buildable = enabled;
                true
            }
            None => false,
        }
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.jobs
            .read()
            .map(|jobs| jobs.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }

    /// Whether no jobs are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn jobs(&self) -> Box<dyn Iterator<Item = Result<RegisteredJob, RegistryError>> + '_> {
        match self.jobs.read() {
            Ok(jobs) => {
                let snapshot: Vec<RegisteredJob> = jobs.values().cloned().collect();
                Box::new(snapshot.into_iter().map(Ok))
            }
            Err(_) => Box::new(std::iter::once(Err(RegistryError::Unavailable {
                message: "job registry lock poisoned".to_string(),
            }))),
        }
    }

    fn job(&self, id: &JobId) -> Option<RegisteredJob> {
        self.jobs.read().ok()?.get(id).cloned()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
