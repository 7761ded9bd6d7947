//! HTTP adapter over the job library
//!
//! - `POST /get_command_line` - `{tool_cfg, input_map}` -> `{arguments, stdin, stdout}`
//! - `POST /get_outputs` - `{tool_cfg, input_map, job_dir, exit_code}` -> `{status, outputs}`
//!
//! One [`AppContext`] is built at startup and handed to every request as
//! axum state.

pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerSettings;
use crate::job::{CommandLineToolLibrary, ExecutionContext, JobLibrary, Resources};

/// How `/get_outputs` derives `status` from the job's exit code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExitCodePolicy {
    /// Always report SUCCESS
    #[default]
    Ignore,

    /// SUCCESS iff the exit code is in the tool's `successCodes`
    SuccessCodes,
}

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppContext {
    pub library: Arc<dyn JobLibrary>,
    pub resources: Resources,
    pub execution: ExecutionContext,
    pub exit_codes: ExitCodePolicy,
}

impl AppContext {
    pub fn new(library: Arc<dyn JobLibrary>) -> Self {
        Self {
            library,
            resources: Resources::default(),
            execution: ExecutionContext::default(),
            exit_codes: ExitCodePolicy::default(),
        }
    }

    /// Context for the built-in library configured from `[server]`
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            library: Arc::new(CommandLineToolLibrary),
            resources: settings.resources,
            execution: settings.execution_context(),
            exit_codes: settings.exit_codes,
        }
    }

    pub fn with_exit_codes(mut self, policy: ExitCodePolicy) -> Self {
        self.exit_codes = policy;
        self
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("library", &self.library.name())
            .field("resources", &self.resources)
            .field("execution", &self.execution)
            .field("exit_codes", &self.exit_codes)
            .finish()
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/get_command_line", post(handlers::get_command_line))
        .route("/get_outputs", post(handlers::get_outputs))
        .with_state(ctx)
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

/// Bind from settings and serve until Ctrl-C
pub async fn run(settings: &ServerSettings) -> Result<()> {
    let address = settings.bind_address()?;
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    let ctx = AppContext::from_settings(settings);

    info!(
        address = %listener.local_addr()?,
        library = ctx.library.name(),
        exit_codes = ?ctx.exit_codes,
        "serving"
    );

    serve(listener, ctx, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    })
    .await
}
