//! Tests for the build completion listener.

use super::*;
use crate::{
    builds::BuildResult,
    delivery::{ChannelError, HookQueue, HookQueueReceiver, OutboundChannel},
    event_kind::EventKind,
    payload::TriggerEvent,
    registry::{InMemoryJobRegistry, RegisteredJob, TriggerConfig},
    report::ReportStatus,
    rules::MatchRule,
    BuildNumber, DeploymentId, JobId,
};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing_test::traced_test;

const ROOT_URL: &str = "https://ci.example.com/";

fn job_id(name: &str) -> JobId {
    JobId::new(name).unwrap()
}

fn registry() -> Arc<InMemoryJobRegistry> {
    let registry = InMemoryJobRegistry::new();
    for (name, silent_mode) in [("deploy-faas", false), ("quiet-job", true)] {
        registry.insert(RegisteredJob {
            id: job_id(name),
            buildable: true,
            trigger: Some(TriggerConfig {
                rules: vec![MatchRule::new(EventKind::DeploymentStarted, "faas")],
                silent_mode,
            }),
        });
    }
    Arc::new(registry)
}

fn triggered_build(job: &str, result: BuildResult) -> CompletedBuild {
    CompletedBuild {
        job: job_id(job),
        number: BuildNumber::new(4),
        result,
        trigger: Some(Arc::new(
            TriggerEvent::new(DeploymentId::new(99), Some("faas".to_string()))
                .with_kind(EventKind::DeploymentStarted),
        )),
    }
}

fn listener(base_url: Option<&str>) -> (BuildCompletionListener, HookQueueReceiver) {
    let (queue, receiver) = HookQueue::bounded(8);
    let listener = BuildCompletionListener::new(
        DeployDbConfig {
            base_url: base_url.map(str::to_string),
        },
        ROOT_URL,
        registry(),
        DeliveryDispatcher::with_defaults(Arc::new(queue)),
    );
    (listener, receiver)
}

/// Channel counting pushes and accepting all of them
#[derive(Default)]
struct CountingChannel {
    pushes: AtomicU32,
}

impl OutboundChannel for CountingChannel {
    fn push(&self, _envelope: DeliveryEnvelope) -> Result<(), ChannelError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Gate Tests
// ============================================================================

#[tokio::test]
async fn test_build_not_triggered_by_deploydb_is_ignored() {
    let (listener, mut receiver) = listener(Some("http://deploydb"));
    let mut build = triggered_build("deploy-faas", BuildResult::Success);
    build.trigger = None;

    assert_eq!(
        listener.on_completed(&build).await,
        ReportOutcome::NotTriggered
    );
    assert!(receiver.try_recv().is_none());
}

#[tokio::test]
async fn test_silent_mode_suppresses_report() {
    let (listener, mut receiver) = listener(Some("http://deploydb"));

    let outcome = listener
        .on_completed(&triggered_build("quiet-job", BuildResult::Success))
        .await;

    assert_eq!(outcome, ReportOutcome::Silenced);
    assert!(receiver.try_recv().is_none());
}

#[tokio::test]
#[traced_test]
async fn test_missing_base_url_sends_nothing() {
    for base_url in [None, Some(""), Some("  "), Some("deploydb.local"), Some("ftp://deploydb")] {
        let channel = Arc::new(CountingChannel::default());
        let listener = BuildCompletionListener::new(
            DeployDbConfig {
                base_url: base_url.map(str::to_string),
            },
            ROOT_URL,
            registry(),
            DeliveryDispatcher::with_defaults(channel.clone()),
        );

        let outcome = listener
            .on_completed(&triggered_build("deploy-faas", BuildResult::Success))
            .await;

        assert_eq!(outcome, ReportOutcome::NotConfigured);
        assert_eq!(channel.pushes.load(Ordering::SeqCst), 0);
    }

    assert!(logs_contain("no base URL has been configured"));
}

// ============================================================================
// Report Tests
// ============================================================================

#[tokio::test]
async fn test_successful_build_is_reported() {
    let (listener, mut receiver) = listener(Some("http://deploydb.example.com/"));

    let outcome = listener
        .on_completed(&triggered_build("deploy-faas", BuildResult::Success))
        .await;

    assert_eq!(
        outcome,
        ReportOutcome::Delivered(DeliveryOutcome::Enqueued { attempts: 1 })
    );

    let envelope = receiver.try_recv().unwrap();
    assert_eq!(
        envelope.url,
        "http://deploydb.example.com/api/deployments/99/promotions"
    );
    assert_eq!(envelope.content_type, "application/json");

    let report: ReportWebhook = serde_json::from_str(&envelope.body).unwrap();
    assert_eq!(report.name, "deploy-faas");
    assert_eq!(report.status, ReportStatus::Success);
    assert_eq!(report.info_url, "https://ci.example.com/job/deploy-faas/4/");
}

#[tokio::test]
async fn test_unsuccessful_builds_report_failure() {
    let (listener, mut receiver) = listener(Some("http://deploydb"));

    for result in [
        BuildResult::Unstable,
        BuildResult::Failure,
        BuildResult::NotBuilt,
        BuildResult::Aborted,
    ] {
        listener
            .on_completed(&triggered_build("deploy-faas", result))
            .await;

        let envelope = receiver.try_recv().unwrap();
        let report: ReportWebhook = serde_json::from_str(&envelope.body).unwrap();
        assert_eq!(report.status, ReportStatus::Failure);
    }
}

#[tokio::test]
async fn test_job_missing_from_registry_is_still_reported() {
    let (listener, mut receiver) = listener(Some("http://deploydb"));

    let outcome = listener
        .on_completed(&triggered_build("deleted-job", BuildResult::Success))
        .await;

    assert!(matches!(outcome, ReportOutcome::Delivered(_)));
    assert!(receiver.try_recv().is_some());
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_full_queue_exhausts_without_failing() {
    let (queue, _receiver) = HookQueue::bounded(1);
    queue
        .push(DeliveryEnvelope::json("http://elsewhere", "{}"))
        .unwrap();

    let listener = BuildCompletionListener::new(
        DeployDbConfig::new("http://deploydb"),
        ROOT_URL,
        registry(),
        DeliveryDispatcher::with_defaults(Arc::new(queue)),
    );

    let outcome = listener
        .on_completed(&triggered_build("deploy-faas", BuildResult::Success))
        .await;

    assert_eq!(
        outcome,
        ReportOutcome::Delivered(DeliveryOutcome::Exhausted { attempts: 3 })
    );
    assert!(logs_contain("giving up"));
}
