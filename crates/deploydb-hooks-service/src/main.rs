//! # DeployDB Hooks Service
//!
//! Binary entry point for the DeployDB hooks HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Loads job definitions into the job registry
//! - Starts the hook publisher and the HTTP server from deploydb-hooks-api

use anyhow::Context;
use deploydb_hooks_api::{start_server, AppState, HookPublisher, LoggingConfig, ServiceConfig};
use deploydb_hooks_core::{HookQueue, InMemoryJobRegistry, JobsConfiguration};
use std::{path::Path, sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for configuration problems
const CONFIG_EXIT_CODE: i32 = 3;

#[tokio::main]
async fn main() {
    let service_config = match load_configuration() {
        Ok(config) => {
            init_tracing(&config.logging);
            config
        }
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = ?e, "Failed to load service configuration; aborting");
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "Starting DeployDB hooks service");

    if service_config.deploydb.base_url().is_none() {
        warn!("No usable DeployDB base URL configured; build results will not be reported");
    }

    let registry = match load_job_registry(service_config.jobs_file.as_deref()) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = ?e, "Failed to load job definitions; aborting");
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    let publisher = match HookPublisher::new(&service_config.publisher) {
        Ok(publisher) => publisher,
        Err(e) => {
            error!(error = %e, "Failed to create hook publisher; aborting");
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    // The state holds the only queue handles; once the server stops the
    // publisher drains what is left and exits.
    let (queue, receiver) = HookQueue::bounded(service_config.reporting.queue_capacity);
    let publisher_task = publisher.spawn(receiver);

    let shutdown_timeout = Duration::from_secs(service_config.server.shutdown_timeout_seconds);
    let state = AppState::from_registry(service_config, registry, Arc::new(queue));

    if let Err(e) = start_server(state).await {
        std::process::exit(e.report());
    }

    if tokio::time::timeout(shutdown_timeout, publisher_task)
        .await
        .is_err()
    {
        warn!("Hook publisher did not finish before the shutdown timeout; pending reports are lost");
    }

    info!("DeployDB hooks service stopped");
}

// ============================================================================
// Private helpers
// ============================================================================

/// Layer configuration sources into a validated [`ServiceConfig`]
///
/// Sources, later ones overriding earlier ones:
///  1. /etc/deploydb-hooks/service.yaml
///  2. ./config/service.yaml
///  3. the file named by `DDB_HOOKS_CONFIG_FILE`
///  4. environment variables prefixed `DDB_HOOKS__`, e.g.
///     `DDB_HOOKS__SERVER__PORT=9090` sets `server.port`
fn load_configuration() -> anyhow::Result<ServiceConfig> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/deploydb-hooks/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("DDB_HOOKS_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            builder = builder.add_source(config::File::with_name(&explicit_path).required(true));
        }
    }

    let service_config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix("DDB_HOOKS").separator("__"))
        .build()
        .context("failed to read configuration sources")?
        .try_deserialize()
        .context("failed to deserialize service configuration")?;

    service_config
        .validate()
        .context("service configuration is invalid")?;

    Ok(service_config)
}

/// Filter used when `RUST_LOG` is not set
fn default_filter(level: &str) -> String {
    format!(
        "deploydb_hooks_service={level},deploydb_hooks_api={level},deploydb_hooks_core={level},tower_http=debug"
    )
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the job registry from the configured jobs file
///
/// Without a jobs file the registry is empty and no webhook triggers a build.
fn load_job_registry(jobs_file: Option<&str>) -> anyhow::Result<InMemoryJobRegistry> {
    let Some(jobs_file) = jobs_file else {
        warn!("No jobs file configured; webhooks will not trigger any builds");
        return Ok(InMemoryJobRegistry::new());
    };

    let jobs = JobsConfiguration::load_from_file(Path::new(jobs_file))
        .with_context(|| format!("failed to load jobs file {jobs_file}"))?;

    let registry = InMemoryJobRegistry::from_configuration(jobs);
    info!(job_count = registry.len(), "Job registry ready");
    Ok(registry)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
