//! Request handlers

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use super::{AppContext, ExitCodePolicy};
use crate::error::DoclinkError;
use crate::job::{namespace_prefix, strip_namespace, CommandLine, ExecutionContext, Job, Outputs, ToolDescriptor};

/// Id given to every job built by the adapter
pub const ADAPTER_JOB_ID: &str = "adapter-job";

#[derive(Debug, Deserialize)]
pub struct CommandLineRequest {
    pub tool_cfg: Value,
    #[serde(default)]
    pub input_map: IndexMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct OutputsRequest {
    pub tool_cfg: Value,
    #[serde(default)]
    pub input_map: IndexMap<String, Value>,
    pub job_dir: PathBuf,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Success,
    Failure,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutputsResponse {
    pub status: JobStatus,
    pub outputs: Outputs,
}

/// Handler failure, rendered as `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
    /// Body is not the expected JSON
    BadRequest(String),
    /// Raised by the job library
    Job(DoclinkError),
    Internal(String),
}

impl From<DoclinkError> for ApiError {
    fn from(e: DoclinkError) -> Self {
        ApiError::Job(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => {
                warn!(%message, "rejected request body");
                (StatusCode::BAD_REQUEST, message)
            }
            ApiError::Job(e) => {
                error!(error = %e, "job library error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Internal(message) => {
                error!(%message, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Parse the body as JSON whatever the declared content type
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))
}

/// Build the tool, strip input namespaces, bind, and wrap into a job
fn prepare_job(
    ctx: &AppContext,
    tool_cfg: &Value,
    input_map: IndexMap<String, Value>,
    execution: ExecutionContext,
) -> Result<Job, DoclinkError> {
    let tool = ctx.library.build_tool(tool_cfg)?;
    let stripped: IndexMap<String, Value> = input_map
        .into_iter()
        .map(|(id, value)| (strip_namespace(&id).to_string(), value))
        .collect();
    let inputs = ctx.library.bind_inputs(stripped, &tool)?;
    Ok(Job::new(ADAPTER_JOB_ID, Arc::new(tool), inputs, ctx.resources, execution))
}

fn classify(policy: ExitCodePolicy, tool: &ToolDescriptor, exit_code: Option<i32>) -> JobStatus {
    match policy {
        ExitCodePolicy::Ignore => JobStatus::Success,
        ExitCodePolicy::SuccessCodes if tool.is_success(exit_code.unwrap_or(0)) => JobStatus::Success,
        ExitCodePolicy::SuccessCodes => JobStatus::Failure,
    }
}

#[instrument(skip_all)]
pub async fn get_command_line(
    State(ctx): State<AppContext>,
    body: Bytes,
) -> Result<Json<CommandLine>, ApiError> {
    let request: CommandLineRequest = parse_body(&body)?;
    let job = prepare_job(&ctx, &request.tool_cfg, request.input_map, ctx.execution.clone())?;
    let command_line = ctx.library.make_command_line(&job)?;

    info!(arguments = ?command_line.arguments, "command line");
    Ok(Json(command_line))
}

#[instrument(skip_all)]
pub async fn get_outputs(
    State(ctx): State<AppContext>,
    body: Bytes,
) -> Result<Json<OutputsResponse>, ApiError> {
    let request: OutputsRequest = parse_body(&body)?;
    let prefix = request
        .input_map
        .keys()
        .next()
        .map(|id| namespace_prefix(id).to_string())
        .unwrap_or_default();

    let response = tokio::task::spawn_blocking(move || -> Result<OutputsResponse, DoclinkError> {
        let execution = ExecutionContext {
            outdir: request.job_dir.clone(),
            ..ctx.execution.clone()
        };
        let job = prepare_job(&ctx, &request.tool_cfg, request.input_map, execution)?;
        let status = classify(ctx.exit_codes, &job.tool, request.exit_code);
        let outputs = ctx
            .library
            .extract_outputs(&job, &request.job_dir)?
            .into_iter()
            .map(|(id, value)| (format!("{}{}", prefix, id), value))
            .collect();
        Ok(OutputsResponse { status, outputs })
    })
    .await
    .map_err(|e| ApiError::Internal(format!("output collection task failed: {}", e)))??;

    info!(status = ?response.status, outputs = response.outputs.len(), "outputs");
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::CommandLineToolLibrary;
    use serde_json::json;

    fn ctx() -> AppContext {
        AppContext::new(Arc::new(CommandLineToolLibrary))
    }

    fn body(value: Value) -> Bytes {
        Bytes::from(serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn classify_respects_policy() {
        let tool = ToolDescriptor::from_config(&json!({"successCodes": [0, 3]})).unwrap();

        assert_eq!(classify(ExitCodePolicy::Ignore, &tool, Some(1)), JobStatus::Success);
        assert_eq!(classify(ExitCodePolicy::SuccessCodes, &tool, Some(3)), JobStatus::Success);
        assert_eq!(classify(ExitCodePolicy::SuccessCodes, &tool, Some(1)), JobStatus::Failure);
        assert_eq!(classify(ExitCodePolicy::SuccessCodes, &tool, None), JobStatus::Success);
    }

    #[tokio::test]
    async fn command_line_strips_namespaces() {
        let Json(cmd) = get_command_line(
            State(ctx()),
            body(json!({
                "tool_cfg": {
                    "baseCommand": "head",
                    "inputs": [
                        {"id": "#lines", "type": "int", "inputBinding": {"prefix": "-n"}},
                        {"id": "#file", "type": "File", "inputBinding": {"position": 1}}
                    ]
                },
                "input_map": {"wf.head.lines": 5, "wf.head.file": "/data/x.txt"}
            })),
        )
        .await
        .unwrap();

        assert_eq!(cmd.arguments, vec!["head", "-n", "5", "/data/x.txt"]);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let err = get_command_line(State(ctx()), Bytes::from_static(b"{not json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn library_errors_are_server_errors() {
        let err = get_command_line(
            State(ctx()),
            body(json!({"tool_cfg": {"baseCommand": "x"}, "input_map": {"step.ghost": 1}})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Job(DoclinkError::UnknownInput { .. })));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
