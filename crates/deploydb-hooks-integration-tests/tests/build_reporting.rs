//! Integration tests for reporting build results back to DeployDB

mod common;

use axum::http::StatusCode;
use common::{
    body_text, completion_request, create_test_app_state, environment_request, test_config,
    test_registry, trigger_request, DEPLOYMENT_STARTED,
};
use deploydb_hooks_api::{create_router, AppState, HookPublisher};
use deploydb_hooks_core::{HookQueue, ReportStatus, ReportWebhook, RetryPolicy};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const DEPLOYMENT_BODY: &str = r#"{"id": 42, "service": "faas"}"#;

// ============================================================================
// Queue Contents
// ============================================================================

/// A finished build started by DeployDB is queued for reporting
#[tokio::test]
async fn test_completed_build_is_queued_for_report() {
    // Arrange
    let (state, mut receiver) = create_test_app_state(Some("http://deploydb.example.com/"));
    let app = create_router(state);
    app.clone()
        .oneshot(trigger_request(Some(DEPLOYMENT_STARTED), DEPLOYMENT_BODY))
        .await
        .unwrap();

    // Act
    let response = app
        .oneshot(completion_request("deploy-faas", 1, "UNSTABLE"))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let envelope = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        envelope.url,
        "http://deploydb.example.com/api/deployments/42/promotions"
    );
    assert_eq!(envelope.content_type, "application/json");

    let report: ReportWebhook = serde_json::from_str(&envelope.body).unwrap();
    assert_eq!(report.name, "deploy-faas");
    assert_eq!(report.status, ReportStatus::Failure);
    assert_eq!(report.info_url, "https://ci.example.com/job/deploy-faas/1/");
}

/// Silent jobs are built but never reported
#[tokio::test]
async fn test_silent_job_is_not_reported() {
    let (state, mut receiver) = create_test_app_state(Some("http://deploydb.example.com"));
    let app = create_router(state);
    app.clone()
        .oneshot(trigger_request(Some(DEPLOYMENT_STARTED), DEPLOYMENT_BODY))
        .await
        .unwrap();

    let response = app
        .oneshot(completion_request("quiet-deploy", 1, "SUCCESS"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(receiver.try_recv().is_none());
}

/// Without a DeployDB address nothing is queued
#[tokio::test]
async fn test_unconfigured_base_url_reports_nothing() {
    let (state, mut receiver) = create_test_app_state(None);
    let app = create_router(state);
    app.clone()
        .oneshot(trigger_request(Some(DEPLOYMENT_STARTED), DEPLOYMENT_BODY))
        .await
        .unwrap();

    let response = app
        .oneshot(completion_request("deploy-faas", 1, "SUCCESS"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(receiver.try_recv().is_none());
}

// ============================================================================
// Build Lifecycle
// ============================================================================

/// A build can only be completed once, after which its environment is gone
#[tokio::test]
async fn test_completed_build_is_no_longer_pending() {
    let (state, _receiver) = create_test_app_state(Some("http://deploydb.example.com"));
    let app = create_router(state);
    app.clone()
        .oneshot(trigger_request(Some(DEPLOYMENT_STARTED), DEPLOYMENT_BODY))
        .await
        .unwrap();

    let first = app
        .clone()
        .oneshot(completion_request("deploy-faas", 1, "SUCCESS"))
        .await
        .unwrap();
    let second = app
        .clone()
        .oneshot(completion_request("deploy-faas", 1, "SUCCESS"))
        .await
        .unwrap();
    let environment = app
        .oneshot(environment_request("deploy-faas", 1))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::ACCEPTED);
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    assert_eq!(environment.status(), StatusCode::NOT_FOUND);
}

/// Unknown result values are rejected by the JSON extractor
#[tokio::test]
async fn test_unknown_build_result_is_rejected() {
    let (state, _receiver) = create_test_app_state(Some("http://deploydb.example.com"));
    let builds = state.builds.clone();
    let app = create_router(state);
    app.clone()
        .oneshot(trigger_request(Some(DEPLOYMENT_STARTED), DEPLOYMENT_BODY))
        .await
        .unwrap();

    let response = app
        .oneshot(completion_request("deploy-faas", 1, "EXPLODED"))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(builds.pending_count(), 2);
}

// ============================================================================
// End to End
// ============================================================================

/// Trigger, complete and publish against a mock DeployDB
#[tokio::test]
async fn test_report_is_published_to_deploydb() {
    // Arrange
    let deploydb = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/deployments/42/promotions"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "name": "deploy-faas",
            "status": "SUCCESS",
            "infoUrl": "https://ci.example.com/job/deploy-faas/1/"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&deploydb)
        .await;

    let (queue, receiver) = HookQueue::bounded(4);
    let publisher = HookPublisher::with_policy(
        RetryPolicy::fixed(2, Duration::from_millis(10)),
        Duration::from_secs(5),
    )
    .unwrap();
    let publisher_task = publisher.spawn(receiver);

    let state = AppState::from_registry(
        test_config(Some(deploydb.uri().as_str())),
        test_registry(),
        Arc::new(queue),
    );
    let app = create_router(state);

    // Act
    let response = app
        .clone()
        .oneshot(trigger_request(Some(DEPLOYMENT_STARTED), DEPLOYMENT_BODY))
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "Triggered 2 builds");

    let response = app
        .oneshot(completion_request("deploy-faas", 1, "SUCCESS"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Assert
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let received = deploydb.received_requests().await.unwrap_or_default();
        if !received.is_empty() || tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    deploydb.verify().await;
    publisher_task.abort();
}
