//! End-to-end tests for the HTTP adapter
//!
//! Each test binds a server to an ephemeral port and talks to it with
//! reqwest.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use doclink::job::CommandLineToolLibrary;
use doclink::server::{serve, AppContext, ExitCodePolicy};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn start(ctx: AppContext) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, ctx, std::future::pending()));
    addr
}

fn default_ctx() -> AppContext {
    AppContext::new(Arc::new(CommandLineToolLibrary))
}

async fn post(addr: SocketAddr, path: &str, body: &Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}{}", addr, path))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

fn grep_tool() -> Value {
    json!({
        "class": "CommandLineTool",
        "baseCommand": "grep",
        "inputs": [
            {"id": "#pattern", "type": "string", "inputBinding": {"position": 1}},
            {"id": "#file", "type": "File", "inputBinding": {"position": 2}},
            {"id": "#count", "type": "boolean?", "inputBinding": {"prefix": "-c"}}
        ],
        "outputs": [
            {"id": "#matches", "type": "File", "outputBinding": {"glob": "matches.txt"}}
        ],
        "stdout": "matches.txt",
        "successCodes": [0, 1]
    })
}

// ============================================================================
// /get_command_line
// ============================================================================

#[tokio::test]
async fn test_get_command_line() {
    let addr = start(default_ctx()).await;

    let (status, body) = post(
        addr,
        "/get_command_line",
        &json!({
            "tool_cfg": grep_tool(),
            "input_map": {
                "search.pattern": "ERROR",
                "search.file": {"class": "File", "path": "/logs/app.log"},
                "search.count": true
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "arguments": ["grep", "-c", "ERROR", "/logs/app.log"],
            "stdin": null,
            "stdout": "matches.txt"
        })
    );
}

#[tokio::test]
async fn test_body_parsed_without_json_content_type() {
    let addr = start(default_ctx()).await;
    let payload = json!({
        "tool_cfg": {"baseCommand": ["echo", "hi"]},
        "input_map": {}
    });

    let response = reqwest::Client::new()
        .post(format!("http://{}/get_command_line", addr))
        .header("content-type", "text/plain")
        .body(payload.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["arguments"], json!(["echo", "hi"]));
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let addr = start(default_ctx()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/get_command_line", addr))
        .body("{\"tool_cfg\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));
}

#[tokio::test]
async fn test_library_error_is_500() {
    let addr = start(default_ctx()).await;

    let (status, body) = post(
        addr,
        "/get_command_line",
        &json!({"tool_cfg": grep_tool(), "input_map": {"search.pattern": "x"}}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("DL-022: Required input 'file' has no value"));
}

#[tokio::test]
async fn test_invalid_tool_class_is_500() {
    let addr = start(default_ctx()).await;

    let (status, body) = post(
        addr,
        "/get_command_line",
        &json!({"tool_cfg": {"class": "Workflow"}, "input_map": {}}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("DL-020"));
}

// ============================================================================
// /get_outputs
// ============================================================================

#[tokio::test]
async fn test_get_outputs_reprefixes_keys() {
    let job_dir = TempDir::new().unwrap();
    fs::write(job_dir.path().join("matches.txt"), "3\n").unwrap();
    let addr = start(default_ctx()).await;

    let (status, body) = post(
        addr,
        "/get_outputs",
        &json!({
            "tool_cfg": grep_tool(),
            "input_map": {"wf.search.pattern": "ERROR", "wf.search.file": "/logs/app.log"},
            "job_dir": job_dir.path(),
            "exit_code": 0
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("SUCCESS"));
    let matches = &body["outputs"]["wf.search.matches"];
    assert_eq!(matches["class"], json!("File"));
    assert_eq!(matches["basename"], json!("matches.txt"));
    assert_eq!(matches["size"], json!(2));
}

#[tokio::test]
async fn test_ignore_policy_reports_success_for_any_exit_code() {
    let job_dir = TempDir::new().unwrap();
    let addr = start(default_ctx()).await;

    let (status, body) = post(
        addr,
        "/get_outputs",
        &json!({
            "tool_cfg": grep_tool(),
            "input_map": {"s.pattern": "x", "s.file": "/f"},
            "job_dir": job_dir.path(),
            "exit_code": 2
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("SUCCESS"));
    assert_eq!(body["outputs"], json!({"s.matches": null}));
}

#[tokio::test]
async fn test_success_codes_policy() {
    let job_dir = TempDir::new().unwrap();
    let addr = start(default_ctx().with_exit_codes(ExitCodePolicy::SuccessCodes)).await;

    let request = |exit_code: i32| {
        json!({
            "tool_cfg": grep_tool(),
            "input_map": {"s.pattern": "x", "s.file": "/f"},
            "job_dir": job_dir.path(),
            "exit_code": exit_code
        })
    };

    let (_, body) = post(addr, "/get_outputs", &request(1)).await;
    assert_eq!(body["status"], json!("SUCCESS"));

    let (_, body) = post(addr, "/get_outputs", &request(2)).await;
    assert_eq!(body["status"], json!("FAILURE"));
}

#[tokio::test]
async fn test_empty_input_map_leaves_keys_unprefixed() {
    let job_dir = TempDir::new().unwrap();
    fs::write(job_dir.path().join("report.txt"), "ok").unwrap();
    let addr = start(default_ctx()).await;

    let (status, body) = post(
        addr,
        "/get_outputs",
        &json!({
            "tool_cfg": {
                "baseCommand": "report",
                "outputs": [{"id": "report", "type": "File", "outputBinding": {"glob": "*.txt"}}]
            },
            "job_dir": job_dir.path()
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outputs"]["report"]["basename"], json!("report.txt"));
}

#[tokio::test]
async fn test_missing_job_dir_is_500() {
    let job_dir = TempDir::new().unwrap();
    let addr = start(default_ctx()).await;

    let (status, body) = post(
        addr,
        "/get_outputs",
        &json!({
            "tool_cfg": {"baseCommand": "true"},
            "input_map": {},
            "job_dir": job_dir.path().join("gone")
        }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("DL-026"));
}
