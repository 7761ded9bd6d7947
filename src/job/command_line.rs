//! Command-line assembly
//!
//! `baseCommand`, then every argument and bound input ordered by `position`.
//! Equal positions keep declaration order, arguments first.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use super::inputs::{location_path, value_text};
use super::tool::{Argument, InputBinding};
use super::{CommandLine, Job};
use crate::error::{DoclinkError, Result};

/// `$(inputs.id)`, `$(inputs.id.path)`, `$(runtime.cores)` ...
static PARAM_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\((inputs|runtime)\.([A-Za-z_][A-Za-z0-9_]*)(?:\.([A-Za-z_][A-Za-z0-9_]*))?\)")
        .unwrap()
});

/// Build the invocation for `job`
pub fn build_command_line(job: &Job) -> Result<CommandLine> {
    let tool = &job.tool;
    let mut bound: Vec<(i32, Vec<String>)> = Vec::new();

    for argument in &tool.arguments {
        match argument {
            Argument::Literal(text) => bound.push((0, vec![substitute_references(text, job)?])),
            Argument::Bound(binding) => {
                let value = substitute_references(&binding.value_from, job)?;
                bound.push((
                    binding.position,
                    with_prefix(binding.prefix.as_deref(), binding.separate, vec![value]),
                ));
            }
        }
    }

    for slot in tool.inputs.values() {
        let Some(binding) = &slot.binding else {
            continue;
        };
        let value = job.inputs.get(&slot.id).unwrap_or(&Value::Null);
        let args = render_input(value, binding);
        if !args.is_empty() {
            bound.push((binding.position, args));
        }
    }

    bound.sort_by_key(|(position, _)| *position);

    let mut arguments = tool.base_command.clone();
    arguments.extend(bound.into_iter().flat_map(|(_, args)| args));

    let stdin = tool
        .stdin
        .as_deref()
        .map(|s| substitute_references(s, job))
        .transpose()?;
    let stdout = tool
        .stdout
        .as_deref()
        .map(|s| substitute_references(s, job))
        .transpose()?;

    debug!(job_id = %job.id, argc = arguments.len(), "command line built");
    Ok(CommandLine {
        arguments,
        stdin,
        stdout,
    })
}

/// Replace parameter references in `template` with values from `job`
pub fn substitute_references(template: &str, job: &Job) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PARAM_REF.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        let value = lookup(&caps, job).ok_or_else(|| DoclinkError::UnresolvedReference {
            reference: whole.as_str().to_string(),
        })?;
        out.push_str(&value);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

fn lookup(caps: &Captures<'_>, job: &Job) -> Option<String> {
    let name = &caps[2];
    let field = caps.get(3).map(|m| m.as_str());

    match &caps[1] {
        "inputs" => {
            let value = job.inputs.get(name)?;
            match field {
                None => value_text(value),
                Some("path") => location_path(value).map(str::to_string),
                Some("basename") => location_path(value)
                    .and_then(|p| Path::new(p).file_name())
                    .map(|n| n.to_string_lossy().into_owned()),
                Some(_) => None,
            }
        }
        "runtime" if field.is_none() => match name {
            "cores" => Some(job.resources.cpu.to_string()),
            "ram" => Some(job.resources.mem.to_string()),
            "outdir" => Some(job.context.outdir.display().to_string()),
            "tmpdir" => Some(job.context.tmpdir.display().to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn render_input(value: &Value, binding: &InputBinding) -> Vec<String> {
    let prefix = binding.prefix.as_deref();
    match value {
        Value::Null | Value::Bool(false) => Vec::new(),
        Value::Bool(true) => prefix.map(str::to_string).into_iter().collect(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().filter_map(value_text).collect();
            if rendered.is_empty() {
                return Vec::new();
            }
            match &binding.item_separator {
                Some(separator) => with_prefix(prefix, binding.separate, vec![rendered.join(separator)]),
                None => with_prefix(prefix, binding.separate, rendered),
            }
        }
        other => value_text(other)
            .map(|text| with_prefix(prefix, binding.separate, vec![text]))
            .unwrap_or_default(),
    }
}

fn with_prefix(prefix: Option<&str>, separate: bool, mut values: Vec<String>) -> Vec<String> {
    match prefix {
        None => values,
        Some(prefix) if separate => {
            values.insert(0, prefix.to_string());
            values
        }
        Some(prefix) => {
            if let Some(first) = values.first_mut() {
                first.insert_str(0, prefix);
            }
            values
        }
    }
}
