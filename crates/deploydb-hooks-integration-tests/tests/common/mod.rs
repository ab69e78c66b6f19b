//! Common test utilities for deploydb-hooks-api integration tests
//!
//! This module provides:
//! - A job registry built from a YAML jobs file
//! - Application state wired around an in-process hook queue
//! - Request builders for the DeployDB routes

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request},
    response::Response,
};
use deploydb_hooks_api::{AppState, ServiceConfig};
use deploydb_hooks_core::{HookQueue, HookQueueReceiver, InMemoryJobRegistry, JobsConfiguration};
use std::{io::Write, sync::Arc};

pub const DEPLOYMENT_STARTED: &str = "application/vnd.deploydb.deploymentstarted.v1+json";
pub const DEPLOYMENT_COMPLETED: &str = "application/vnd.deploydb.deploymentcompleted.v1+json";
pub const PROMOTION_COMPLETED: &str = "application/vnd.deploydb.promotioncompleted.v1+json";

pub const ROOT_URL: &str = "https://ci.example.com/";

/// Jobs used across the integration tests
pub const JOBS_YAML: &str = r#"
jobs:
  - name: deploy-faas
    trigger:
      rules:
        - event_kind: deployment_started
          service_pattern: "faas"
  - name: smoke-tests
    trigger:
      rules:
        - event_kind: deployment_completed
          service_pattern: "faas|billing"
        - event_kind: promotion_completed
          service_pattern: "billing-.*"
  - name: quiet-deploy
    trigger:
      silent_mode: true
      rules:
        - event_kind: deployment_started
          service_pattern: "faas"
  - name: retired-deploy
    enabled: false
    trigger:
      rules:
        - event_kind: deployment_started
          service_pattern: "faas"
  - name: nightly
"#;

/// Load [`JOBS_YAML`] through a real jobs file
pub fn test_registry() -> Arc<InMemoryJobRegistry> {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(JOBS_YAML.as_bytes()).unwrap();

    let jobs = JobsConfiguration::load_from_file(file.path()).unwrap();
    Arc::new(InMemoryJobRegistry::from_configuration(jobs))
}

/// Service configuration reporting to `deploydb_url`
pub fn test_config(deploydb_url: Option<&str>) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.deploydb.base_url = deploydb_url.map(str::to_string);
    config.reporting.root_url = ROOT_URL.to_string();
    config
}

/// Application state with the test jobs and a queue the test can drain
pub fn create_test_app_state(deploydb_url: Option<&str>) -> (AppState, HookQueueReceiver) {
    let (queue, receiver) = HookQueue::bounded(16);
    let state = AppState::from_registry(test_config(deploydb_url), test_registry(), Arc::new(queue));
    (state, receiver)
}

pub fn trigger_request(content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/deploydb/trigger");
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    builder.body(body.into()).unwrap()
}

pub fn completion_request(job: &str, number: u64, result: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/deploydb/builds/{job}/{number}/completed"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "result": result }).to_string(),
        ))
        .unwrap()
}

pub fn environment_request(job: &str, number: u64) -> Request<Body> {
    Request::builder()
        .uri(format!("/deploydb/builds/{job}/{number}/environment"))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
