//! Tests for the HTTP hook publisher.

use super::*;
use deploydb_hooks_core::{HookQueue, OutboundChannel};
use tracing_test::traced_test;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const REPORT_PATH: &str = "/api/deployments/42/promotions";

fn fast_publisher(max_attempts: u32) -> HookPublisher {
    let policy = RetryPolicy::new(
        max_attempts,
        Duration::from_millis(5),
        Duration::from_millis(20),
        2.0,
    )
    .without_jitter();
    HookPublisher::with_policy(policy, Duration::from_secs(5)).unwrap()
}

fn report_envelope(server: &MockServer) -> DeliveryEnvelope {
    DeliveryEnvelope::json(
        format!("{}{}", server.uri(), REPORT_PATH),
        r#"{"name":"deploy-faas","status":"SUCCESS","infoUrl":"https://ci.example.com/job/deploy-faas/4/"}"#,
    )
}

// ============================================================================
// Classification Tests
// ============================================================================

#[test]
fn test_error_classification() {
    for status in [408, 429, 500, 502, 503] {
        assert!(
            PublishError::HttpStatus { status }.is_transient(),
            "HTTP {status} should be retried"
        );
    }
    for status in [400, 401, 403, 404, 422] {
        assert!(
            !PublishError::HttpStatus { status }.is_transient(),
            "HTTP {status} should not be retried"
        );
    }
    assert!(PublishError::Transport {
        message: "connection refused".to_string()
    }
    .is_transient());
}

#[test]
fn test_new_uses_configured_policy() {
    let publisher = HookPublisher::new(&PublisherConfig::default()).unwrap();
    assert_eq!(publisher.policy().max_attempts, 5);
    assert!(publisher.policy().use_jitter);
}

// ============================================================================
// Delivery Tests
// ============================================================================

#[tokio::test]
async fn test_successful_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPORT_PATH))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "name": "deploy-faas",
            "status": "SUCCESS",
            "infoUrl": "https://ci.example.com/job/deploy-faas/4/"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = fast_publisher(5).deliver(&report_envelope(&server)).await;

    assert_eq!(
        outcome,
        PublishOutcome::Delivered {
            status: 201,
            attempts: 1
        }
    );
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&server)
        .await;

    let outcome = fast_publisher(5).deliver(&report_envelope(&server)).await;

    assert_eq!(
        outcome,
        PublishOutcome::Delivered {
            status: 200,
            attempts: 3
        }
    );
}

#[tokio::test]
#[traced_test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = fast_publisher(5).deliver(&report_envelope(&server)).await;

    assert_eq!(
        outcome,
        PublishOutcome::Rejected {
            error: PublishError::HttpStatus { status: 404 },
            attempts: 1
        }
    );
    assert!(logs_contain("DeployDB rejected build report"));
}

#[tokio::test]
#[traced_test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let outcome = fast_publisher(3).deliver(&report_envelope(&server)).await;

    assert_eq!(
        outcome,
        PublishOutcome::Exhausted {
            error: PublishError::HttpStatus { status: 500 },
            attempts: 3
        }
    );
    assert!(logs_contain("Giving up on build report delivery"));
}

#[tokio::test]
async fn test_unreachable_host_is_exhausted() {
    // Nothing listens on port 9 of the loopback interface
    let envelope = DeliveryEnvelope::json("http://127.0.0.1:9/api/deployments/1/promotions", "{}");

    let outcome = fast_publisher(2).deliver(&envelope).await;

    assert!(matches!(
        outcome,
        PublishOutcome::Exhausted {
            error: PublishError::Transport { .. },
            attempts: 2
        }
    ));
}

// ============================================================================
// Worker Tests
// ============================================================================

#[tokio::test]
async fn test_worker_drains_queue_and_stops() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let (queue, receiver) = HookQueue::bounded(4);
    queue.push(report_envelope(&server)).unwrap();
    queue.push(report_envelope(&server)).unwrap();

    let handle = fast_publisher(1).spawn(receiver);
    drop(queue);

    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("publisher should stop once the queue is closed")
        .unwrap();
}
