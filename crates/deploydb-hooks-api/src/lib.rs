//! # DeployDB Hooks HTTP Service
//!
//! HTTP layer between DeployDB and the build system.
//!
//! This service provides:
//! - the DeployDB trigger webhook endpoint
//! - build completion callbacks that report results back to DeployDB
//! - a view of the environment a triggered build runs with
//! - a health check endpoint
//!
//! Outbound reports are sent by the [`publisher::HookPublisher`] on a
//! background task.

pub mod config;
pub mod errors;
pub mod publisher;
pub mod responses;

pub use config::{LoggingConfig, PublisherConfig, ReportingConfig, ServerConfig, ServiceConfig};
pub use errors::{BuildHandlerError, ConfigError, ServiceError, TriggerHandlerError};
pub use publisher::{HookPublisher, PublishError, PublishOutcome};
pub use responses::{BuildCompletionRequest, BuildCompletionResponse, HealthResponse};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use deploydb_hooks_core::{
    BuildCompletionListener, BuildNumber, DeliveryDispatcher, InMemoryBuildQueue, JobId,
    JobRegistry, OutboundChannel, SharedSecurityContext, TriggerAggregator, TriggerEndpoint,
};
use std::{collections::BTreeMap, future::IntoFuture, sync::Arc, time::Duration};
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Inbound webhook handling
    pub endpoint: TriggerEndpoint,

    /// Builds scheduled by webhooks and not yet completed
    pub builds: Arc<InMemoryBuildQueue>,

    /// Reports completed builds back to DeployDB
    pub listener: BuildCompletionListener,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        endpoint: TriggerEndpoint,
        builds: Arc<InMemoryBuildQueue>,
        listener: BuildCompletionListener,
    ) -> Self {
        Self {
            config,
            endpoint,
            builds,
            listener,
        }
    }

    /// Wire the in-process components around a job registry and an outbound
    /// channel
    pub fn from_registry(
        config: ServiceConfig,
        registry: Arc<dyn JobRegistry>,
        channel: Arc<dyn OutboundChannel>,
    ) -> Self {
        let builds = Arc::new(InMemoryBuildQueue::new());
        let aggregator = TriggerAggregator::new(
            registry.clone(),
            Arc::new(SharedSecurityContext::default()),
        );
        let endpoint = TriggerEndpoint::new(aggregator, builds.clone());

        let dispatcher = DeliveryDispatcher::new(channel, config.reporting.retry_policy());
        let listener = BuildCompletionListener::new(
            config.deploydb.clone(),
            config.reporting.root_url.clone(),
            registry,
            dispatcher,
        );

        Self::new(config, endpoint, builds, listener)
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;

    let deploydb_routes = Router::new()
        .route("/deploydb/trigger", post(handle_trigger))
        .route(
            "/deploydb/builds/{job}/{number}/completed",
            post(handle_build_completed),
        )
        .route(
            "/deploydb/builds/{job}/{number}/environment",
            get(handle_build_environment),
        );

    let health_routes = Router::new().route("/health", get(handle_health_check));

    Router::new()
        .merge(deploydb_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Returns once a shutdown signal has been received and in-flight requests
/// have finished, or the shutdown timeout has passed.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let address = state.config.server.bind_address();
    let shutdown_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Starting HTTP server");

    let shutdown_started = Arc::new(Notify::new());
    let notify = shutdown_started.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Initiating graceful shutdown"
            );
            notify.notify_one();
        })
        .into_future();

    let drain_deadline = async {
        shutdown_started.notified().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
            info!("HTTP server shutdown complete");
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Shutdown timeout elapsed with requests still in flight"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// DeployDB Handlers
// ============================================================================

/// Handle a DeployDB trigger webhook
///
/// The event kind comes from the `Content-Type` header alone. Responds with
/// plain text naming the number of builds started.
#[instrument(skip(state, headers, body))]
pub async fn handle_trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, TriggerHandlerError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    debug!(
        content_type = content_type.unwrap_or("<none>"),
        body_size = body.len(),
        "Received DeployDB webhook"
    );

    let triggered = state.endpoint.handle(content_type, &body)?;
    Ok(triggered.message())
}

/// Handle a build completion callback from the build system
///
/// The report to DeployDB is sent from a spawned task; the caller gets
/// `202 Accepted` without waiting for it.
#[instrument(skip(state, request))]
pub async fn handle_build_completed(
    State(state): State<AppState>,
    Path((job, number)): Path<(String, u64)>,
    Json(request): Json<BuildCompletionRequest>,
) -> Result<(StatusCode, Json<BuildCompletionResponse>), BuildHandlerError> {
    let job_id = JobId::new(job.clone())?;
    let build_number = BuildNumber::new(number);

    let completed = state
        .builds
        .complete(&job_id, build_number, request.result)
        .ok_or(BuildHandlerError::BuildNotFound { job, number })?;

    let response = BuildCompletionResponse {
        job: job_id,
        build_number,
        status: "accepted".to_string(),
        triggered_by_deploydb: completed.trigger.is_some(),
    };

    let listener = state.listener.clone();
    tokio::spawn(async move {
        listener.on_completed(&completed).await;
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Environment variables a pending build runs with
pub async fn handle_build_environment(
    State(state): State<AppState>,
    Path((job, number)): Path<(String, u64)>,
) -> Result<Json<BTreeMap<String, String>>, BuildHandlerError> {
    let job_id = JobId::new(job.clone())?;

    let build = state
        .builds
        .pending(&job_id, BuildNumber::new(number))
        .ok_or(BuildHandlerError::BuildNotFound { job, number })?;

    Ok(Json(build.environment()))
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Liveness check
pub async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
