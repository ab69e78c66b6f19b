//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use deploydb_hooks_core::{
    delivery::{DELIVERY_RETRY_INTERVAL, MAX_DELIVERY_ATTEMPTS},
    DeployDbConfig, RetryPolicy,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service configuration
///
/// Every section has defaults, so a configuration source only needs to carry
/// the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Where to send build reports
    pub deploydb: DeployDbConfig,

    /// Build report settings
    pub reporting: ReportingConfig,

    /// Outbound HTTP delivery settings
    pub publisher: PublisherConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// YAML or JSON file holding job definitions
    pub jobs_file: Option<String>,
}

impl ServiceConfig {
    /// Check values that deserialization alone cannot guarantee
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.reporting.validate()?;
        self.publisher.validate()?;

        if let Some(jobs_file) = &self.jobs_file {
            if jobs_file.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: "jobs_file must not be blank".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl ServerConfig {
    /// Address to bind the listener to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "server.host".to_string(),
            });
        }

        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Build report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Public address of this build system, used for report info URLs
    pub root_url: String,

    /// Attempts to enqueue a report before dropping it
    pub max_attempts: u32,

    /// Wait between enqueue attempts in seconds
    pub retry_interval_seconds: u64,

    /// Reports waiting for HTTP delivery before the queue rejects more
    pub queue_capacity: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            root_url: "http://localhost:8080/".to_string(),
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            retry_interval_seconds: DELIVERY_RETRY_INTERVAL.as_secs(),
            queue_capacity: 100,
        }
    }
}

impl ReportingConfig {
    /// Enqueue retry policy for the delivery dispatcher
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.max_attempts,
            Duration::from_secs(self.retry_interval_seconds),
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.root_url.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "reporting.root_url".to_string(),
            });
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "reporting.max_attempts must be at least 1".to_string(),
            });
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "reporting.queue_capacity must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Outbound HTTP delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// HTTP attempts per report, including the first
    pub max_attempts: u32,

    /// Delay after the first failed attempt in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for the delay between attempts in milliseconds
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Timeout for a single HTTP request in seconds
    pub request_timeout_seconds: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
            request_timeout_seconds: 10,
        }
    }
}

impl PublisherConfig {
    /// HTTP retry policy with jitter
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.backoff_multiplier,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "publisher.max_attempts must be at least 1".to_string(),
            });
        }

        if !(self.backoff_multiplier >= 1.0) {
            return Err(ConfigError::Invalid {
                message: "publisher.backoff_multiplier must be at least 1.0".to_string(),
            });
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::Invalid {
                message: "publisher.max_delay_ms must not be less than initial_delay_ms"
                    .to_string(),
            });
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "publisher.request_timeout_seconds must be greater than zero"
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
