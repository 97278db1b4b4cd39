//! Shared test harness for API integration tests.
//!
//! Builds the full application router with the production middleware stack
//! on top of a temp project root, so every test exercises exactly what the
//! binary serves. Jobs launched by these tests run real subprocesses via
//! throwaway launch wrappers written into the temp root.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use segtrain_api::config::ServerConfig;
use segtrain_api::router::build_app_router;
use segtrain_api::state::AppState;
use segtrain_api::ws::WsManager;
use segtrain_events::EventBus;
use segtrain_runner::{JobRegistry, TrainingExecutor};

/// A fully-wired application instance rooted at a temp directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Keeps the temp project root alive for the duration of the test.
    _root: TempDir,
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(project_root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        project_root: project_root.to_path_buf(),
        cancel_grace_secs: 1,
    }
}

/// Build the full application with a fresh registry and temp project root.
pub fn spawn_test_app() -> TestApp {
    let root = tempfile::tempdir().expect("create temp project root");
    std::fs::create_dir(root.path().join("scripts")).expect("create scripts dir");
    std::fs::create_dir(root.path().join("configs")).expect("create configs dir");

    let config = test_config(root.path());
    let event_bus = Arc::new(EventBus::default());
    let registry = Arc::new(JobRegistry::new(Arc::clone(&event_bus)));
    let executor = Arc::new(
        TrainingExecutor::new(Arc::clone(&registry), root.path())
            .with_cancel_grace(Duration::from_millis(500)),
    );
    let ws_manager = Arc::new(WsManager::new());

    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        executor,
        ws_manager,
        event_bus,
    };

    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        _root: root,
    }
}

impl TestApp {
    /// Write a launch wrapper (`train_rf100vl.sh` or `train_odinw.sh`).
    pub fn write_script(&self, name: &str, body: &str) {
        let path = self.state.config.project_root.join("scripts").join(name);
        std::fs::write(&path, format!("#!/bin/bash\n{body}\n")).expect("write script");
    }

    /// Write a config file under `configs/`.
    pub fn write_config(&self, name: &str) {
        let path = self.state.config.project_root.join("configs").join(name);
        std::fs::write(&path, "model: segmentation\n").expect("write config");
    }

    /// Send a request and return `(status, parsed JSON body)`.
    ///
    /// Empty bodies (e.g. 204 responses) parse to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).expect("encode body")))
                .expect("build request"),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();

        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, json)
    }

    /// Poll the status endpoint until the job reaches a terminal state
    /// (5 second budget). Returns the final status view.
    pub async fn wait_for_terminal(&self, job_id: &str) -> serde_json::Value {
        for _ in 0..100 {
            let (status, body) = self
                .request(Method::GET, &format!("/api/v1/jobs/{job_id}/status"), None)
                .await;
            assert_eq!(status, StatusCode::OK, "status query failed: {body}");

            let state = body["data"]["status"].as_str().expect("status field");
            if matches!(state, "completed" | "failed" | "cancelled") {
                return body["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("timed out waiting for job {job_id} to finish");
    }
}
