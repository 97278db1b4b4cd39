//! Integration tests for job submission and the `/jobs` resource.
//!
//! Every test runs real subprocesses through throwaway launch wrappers in
//! the harness's temp project root.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{spawn_test_app, TestApp};

fn rf100vl_submission() -> serde_json::Value {
    json!({
        "base_config": "base.yaml",
        "execution_mode": "sync",
    })
}

fn prepare_quick_script(app: &TestApp) {
    app.write_config("base.yaml");
    app.write_script("train_rf100vl.sh", "echo training output\nexit 0");
}

// ---------------------------------------------------------------------------
// Test: synchronous submission runs to completion before responding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_submission_returns_completed_job() {
    let app = spawn_test_app();
    prepare_quick_script(&app);

    let (status, body) = app
        .request(Method::POST, "/api/v1/train/rf100vl", Some(rf100vl_submission()))
        .await;

    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    let job = &body["data"];
    assert_eq!(job["status"], "completed");
    assert_eq!(job["exit_code"], 0);
    assert_eq!(job["dataset_type"], "rf100vl");
    assert!(job["job_id"].as_str().is_some());
    assert!(job["started_at"].as_str().is_some());
    assert!(job["completed_at"].as_str().is_some());
}

// ---------------------------------------------------------------------------
// Test: asynchronous submission returns immediately, job finishes later
// ---------------------------------------------------------------------------

#[tokio::test]
async fn async_submission_is_resolvable_and_reaches_terminal_state() {
    let app = spawn_test_app();
    prepare_quick_script(&app);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/train/rf100vl",
            Some(json!({"base_config": "base.yaml"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    let job_id = body["data"]["job_id"].as_str().expect("job id").to_string();

    // The id is immediately resolvable.
    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/jobs/{job_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let final_view = app.wait_for_terminal(&job_id).await;
    assert_eq!(final_view["status"], "completed");
    assert_eq!(final_view["exit_code"], 0);
}

// ---------------------------------------------------------------------------
// Test: ODinW submission via config_type
// ---------------------------------------------------------------------------

#[tokio::test]
async fn odinw_submission_uses_bundled_config_type() {
    let app = spawn_test_app();
    app.write_config("odinw_text_only.yaml");
    app.write_script("train_odinw.sh", "echo odinw run\nexit 0");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/train/odinw",
            Some(json!({"config_type": "text_only", "execution_mode": "sync"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["dataset_type"], "odinw");
}

// ---------------------------------------------------------------------------
// Test: failing wrapper surfaces exit code and error through status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_job_records_exit_code() {
    let app = spawn_test_app();
    app.write_config("base.yaml");
    app.write_script("train_rf100vl.sh", "echo broken\nexit 9");

    let (status, body) = app
        .request(Method::POST, "/api/v1/train/rf100vl", Some(rf100vl_submission()))
        .await;

    // Launch and process failures never fail the submission call.
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["data"]["status"], "failed");
    assert_eq!(body["data"]["exit_code"], 9);
    assert!(body["data"]["error_message"]
        .as_str()
        .is_some_and(|m| m.contains("exit code 9")));
}

// ---------------------------------------------------------------------------
// Test: listing and status filtering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_jobs_supports_status_filter() {
    let app = spawn_test_app();
    prepare_quick_script(&app);

    let (status, _) = app
        .request(Method::POST, "/api/v1/train/rf100vl", Some(rf100vl_submission()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.request(Method::GET, "/api/v1/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().expect("array").len(), 1);

    let (status, body) = app
        .request(Method::GET, "/api/v1/jobs?status=completed", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().expect("array").len(), 1);

    let (status, body) = app
        .request(Method::GET, "/api/v1/jobs?status=failed", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().expect("array").is_empty());
}

// ---------------------------------------------------------------------------
// Test: log snapshot endpoint with tail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn log_snapshot_returns_captured_lines() {
    let app = spawn_test_app();
    app.write_config("base.yaml");
    app.write_script("train_rf100vl.sh", "echo alpha\necho beta");

    let (_, body) = app
        .request(Method::POST, "/api/v1/train/rf100vl", Some(rf100vl_submission()))
        .await;
    let job_id = body["data"]["job_id"].as_str().expect("job id").to_string();

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/jobs/{job_id}/logs"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let lines: Vec<&str> = body["data"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(lines.contains(&"alpha"));
    assert!(lines.contains(&"beta"));

    // Tail returns only the most recent lines.
    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/jobs/{job_id}/logs?tail=1"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().expect("array").len(), 1);
}

// ---------------------------------------------------------------------------
// Test: cancelling a running job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_running_job_reaches_cancelled() {
    let app = spawn_test_app();
    app.write_config("base.yaml");
    app.write_script("train_rf100vl.sh", "echo started\nexec sleep 30");

    let (_, body) = app
        .request(
            Method::POST,
            "/api/v1/train/rf100vl",
            Some(json!({"base_config": "base.yaml"})),
        )
        .await;
    let job_id = body["data"]["job_id"].as_str().expect("job id").to_string();

    // Wait until the subprocess is actually running.
    for _ in 0..100 {
        let (_, body) = app
            .request(Method::GET, &format!("/api/v1/jobs/{job_id}/status"), None)
            .await;
        if body["data"]["status"] == "running" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    let (status, _) = app
        .request(Method::POST, &format!("/api/v1/jobs/{job_id}/cancel"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let final_view = app.wait_for_terminal(&job_id).await;
    assert_eq!(final_view["status"], "cancelled");
    assert!(final_view["exit_code"].is_null());
}

// ---------------------------------------------------------------------------
// Test: delete lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_rejected_while_running_then_succeeds_when_terminal() {
    let app = spawn_test_app();
    app.write_config("base.yaml");
    app.write_script("train_rf100vl.sh", "exec sleep 30");

    let (_, body) = app
        .request(
            Method::POST,
            "/api/v1/train/rf100vl",
            Some(json!({"base_config": "base.yaml"})),
        )
        .await;
    let job_id = body["data"]["job_id"].as_str().expect("job id").to_string();

    // Deleting a pending/running job is rejected.
    let (status, body) = app
        .request(Method::DELETE, &format!("/api/v1/jobs/{job_id}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    // Cancel, wait for the terminal state, then delete.
    let (status, _) = app
        .request(Method::POST, &format!("/api/v1/jobs/{job_id}/cancel"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    app.wait_for_terminal(&job_id).await;

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/jobs/{job_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The record is gone.
    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/jobs/{job_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}
