//! # Job Library
//!
//! Turns a tool description plus bound inputs into a command line, and a
//! finished job directory back into typed outputs.
//!
//! ## Overview
//!
//! - [`JobLibrary`] - the seam the HTTP adapter calls through
//! - [`CommandLineToolLibrary`] - built-in implementation for CommandLineTool
//!   descriptions
//! - [`ToolDescriptor`] - parsed tool config with typed input slots
//! - [`Job`] - a tool bound to inputs, resources and an execution context
//!
//! ## Flow
//!
//! ```rust
//! use std::sync::Arc;
//! use doclink::job::{CommandLineToolLibrary, ExecutionContext, Job, JobLibrary, Resources};
//! use serde_json::json;
//!
//! let library = CommandLineToolLibrary;
//! let tool = library
//!     .build_tool(&json!({
//!         "baseCommand": "wc",
//!         "inputs": [{"id": "#lines", "type": "boolean", "inputBinding": {"prefix": "-l"}}]
//!     }))
//!     .unwrap();
//! let inputs = library
//!     .bind_inputs([("lines".to_string(), json!(true))].into_iter().collect(), &tool)
//!     .unwrap();
//! let job = Job::new("job-1", Arc::new(tool), inputs, Resources::default(), ExecutionContext::default());
//!
//! let command_line = library.make_command_line(&job).unwrap();
//! assert_eq!(command_line.arguments, vec!["wc", "-l"]);
//! ```

mod command_line;
mod inputs;
mod outputs;
mod tool;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use command_line::{build_command_line, substitute_references};
pub use inputs::{bind_inputs, file_value, namespace_prefix, strip_namespace, BoundInputs};
pub use outputs::collect_outputs;
pub use tool::{
    Argument, ArgumentBinding, InputBinding, InputSlot, OutputSlot, ParamType, ToolDescriptor,
};

/// Output name -> value
pub type Outputs = IndexMap<String, Value>;

/// Compute resources granted to a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: u32,
    /// Memory in MiB
    pub mem: u64,
}

impl Default for Resources {
    fn default() -> Self {
        Self { cpu: 1, mem: 1024 }
    }
}

/// Where a job writes its files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub outdir: PathBuf,
    pub tmpdir: PathBuf,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("."),
            tmpdir: std::env::temp_dir(),
        }
    }
}

/// A tool invocation: descriptor, validated inputs, resources and context
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub tool: Arc<ToolDescriptor>,
    pub inputs: BoundInputs,
    pub resources: Resources,
    pub context: ExecutionContext,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        tool: Arc<ToolDescriptor>,
        inputs: BoundInputs,
        resources: Resources,
        context: ExecutionContext,
    ) -> Self {
        Self {
            id: id.into(),
            tool,
            inputs,
            resources,
            context,
        }
    }
}

/// Arguments plus stdio redirections for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub arguments: Vec<String>,
    pub stdin: Option<String>,
    pub stdout: Option<String>,
}

/// Process/job library the HTTP adapter delegates to
pub trait JobLibrary: Send + Sync {
    /// Library name for logs
    fn name(&self) -> &str;

    /// Parse a tool config into a descriptor
    fn build_tool(&self, tool_cfg: &Value) -> Result<ToolDescriptor>;

    /// Validate and coerce inputs (ids already stripped of their namespace)
    fn bind_inputs(
        &self,
        input_map: IndexMap<String, Value>,
        tool: &ToolDescriptor,
    ) -> Result<BoundInputs>;

    fn make_command_line(&self, job: &Job) -> Result<CommandLine>;

    /// Collect outputs from a finished job's directory
    fn extract_outputs(&self, job: &Job, job_dir: &Path) -> Result<Outputs>;
}

/// Built-in library for CommandLineTool descriptions
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLineToolLibrary;

impl JobLibrary for CommandLineToolLibrary {
    fn name(&self) -> &str {
        "command-line-tool"
    }

    fn build_tool(&self, tool_cfg: &Value) -> Result<ToolDescriptor> {
        ToolDescriptor::from_config(tool_cfg)
    }

    fn bind_inputs(
        &self,
        input_map: IndexMap<String, Value>,
        tool: &ToolDescriptor,
    ) -> Result<BoundInputs> {
        bind_inputs(input_map, tool)
    }

    fn make_command_line(&self, job: &Job) -> Result<CommandLine> {
        build_command_line(job)
    }

    fn extract_outputs(&self, job: &Job, job_dir: &Path) -> Result<Outputs> {
        collect_outputs(job, job_dir)
    }
}
