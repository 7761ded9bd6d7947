//! Output collection from a finished job directory

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::command_line::substitute_references;
use super::inputs::file_value;
use super::tool::ParamType;
use super::{Job, Outputs};
use crate::error::{DoclinkError, Result};

/// Match every output's glob inside `job_dir`.
///
/// Outputs without a binding, or whose glob matches nothing, are `null`.
pub fn collect_outputs(job: &Job, job_dir: &Path) -> Result<Outputs> {
    if !job_dir.is_dir() {
        return Err(DoclinkError::JobDirNotFound {
            path: job_dir.display().to_string(),
        });
    }

    let mut outputs = Outputs::with_capacity(job.tool.outputs.len());
    for slot in &job.tool.outputs {
        let value = match &slot.glob {
            None => Value::Null,
            Some(pattern) => {
                let pattern = substitute_references(pattern, job)?;
                let matches = glob_in(job_dir, &pattern)?;
                debug!(output = %slot.id, %pattern, matched = matches.len(), "collected output");
                let value = shape(&slot.param_type, &matches);
                if value.is_null() && !slot.optional {
                    warn!(output = %slot.id, %pattern, "required output matched nothing");
                }
                value
            }
        };
        outputs.insert(slot.id.clone(), value);
    }
    Ok(outputs)
}

fn glob_in(job_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = if Path::new(pattern).is_absolute() {
        PathBuf::from(pattern)
    } else {
        // The directory itself may contain glob metacharacters
        PathBuf::from(glob::Pattern::escape(&job_dir.to_string_lossy())).join(pattern)
    };

    let entries = glob::glob(&full.to_string_lossy()).map_err(|e| DoclinkError::InvalidGlob {
        pattern: pattern.to_string(),
        details: e.to_string(),
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => matches.push(path),
            Err(e) => warn!(error = %e, "skipping unreadable glob match"),
        }
    }
    matches.sort();
    Ok(matches)
}

fn shape(ty: &ParamType, matches: &[PathBuf]) -> Value {
    match ty {
        ParamType::Array(_) => Value::Array(matches.iter().map(|p| entry(p)).collect()),
        ParamType::Any => match matches {
            [] => Value::Null,
            [single] => entry(single),
            many => Value::Array(many.iter().map(|p| entry(p)).collect()),
        },
        ParamType::File | ParamType::Directory => {
            matches.first().map(|p| entry(p)).unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

/// `{class, path, basename[, size]}` for a matched path
fn entry(path: &Path) -> Value {
    let mut value = match file_value(path) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(name) = path.file_name() {
        value.insert(
            "basename".to_string(),
            Value::String(name.to_string_lossy().into_owned()),
        );
    }
    match path.metadata() {
        Ok(meta) if meta.is_dir() => {
            value.insert("class".to_string(), Value::String("Directory".to_string()));
        }
        Ok(meta) => {
            value.insert("size".to_string(), Value::from(meta.len()));
        }
        Err(_) => {}
    }
    Value::Object(value)
}
