//! Input binding: namespace handling, validation and coercion

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

use super::tool::{InputSlot, ParamType, ToolDescriptor};
use crate::error::{DoclinkError, Result};

/// Validated input values, keyed by input id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundInputs(IndexMap<String, Value>);

impl BoundInputs {
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `"align.reads"` -> `"reads"`; ids without a namespace pass through
pub fn strip_namespace(id: &str) -> &str {
    match id.rfind('.') {
        Some(dot) => &id[dot + 1..],
        None => id,
    }
}

/// `"align.reads"` -> `"align."`; empty when there is no namespace
pub fn namespace_prefix(id: &str) -> &str {
    match id.rfind('.') {
        Some(dot) => &id[..=dot],
        None => "",
    }
}

/// Validate `input_map` against the tool's input slots.
///
/// Slots missing from the map take their default, or `null` when optional.
/// The result follows the tool's declaration order.
pub fn bind_inputs(mut input_map: IndexMap<String, Value>, tool: &ToolDescriptor) -> Result<BoundInputs> {
    if let Some(unknown) = input_map.keys().find(|id| tool.input(id).is_none()) {
        return Err(DoclinkError::UnknownInput {
            id: unknown.clone(),
        });
    }

    let mut bound = IndexMap::with_capacity(tool.inputs.len());
    for slot in tool.inputs.values() {
        let value = match input_map.shift_remove(&slot.id) {
            Some(value) => slot.validate(value)?,
            None => slot.validate(Value::Null)?,
        };
        bound.insert(slot.id.clone(), value);
    }
    Ok(BoundInputs(bound))
}

impl InputSlot {
    /// Validate and coerce a value for this slot.
    ///
    /// `null` falls back to the default, then to `null` for optional slots.
    pub fn validate(&self, value: Value) -> Result<Value> {
        if !value.is_null() {
            return coerce(&self.param_type, value, &self.id);
        }
        match &self.default {
            Some(default) if !default.is_null() => coerce(&self.param_type, default.clone(), &self.id),
            _ if self.optional || self.param_type == ParamType::Null => Ok(Value::Null),
            _ if self.param_type == ParamType::Any => Ok(Value::Null),
            _ => Err(DoclinkError::MissingInput { id: self.id.clone() }),
        }
    }
}

fn coerce(ty: &ParamType, value: Value, id: &str) -> Result<Value> {
    let mismatch = |found: &Value| DoclinkError::InputTypeMismatch {
        id: id.to_string(),
        expected: ty.to_string(),
        found: json_kind(found).to_string(),
    };

    match (ty, value) {
        (ParamType::Any, value) => Ok(value),
        (ParamType::Null, Value::Null) => Ok(Value::Null),

        (ParamType::String, Value::String(s)) => Ok(Value::String(s)),
        (ParamType::String, value @ (Value::Number(_) | Value::Bool(_))) => {
            Ok(Value::String(value.to_string()))
        }

        (ParamType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
        (ParamType::Int, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(n) => Ok(Value::from(n)),
            Err(_) => Err(mismatch(&Value::String(s))),
        },

        (ParamType::Float, Value::Number(n)) => Ok(Value::Number(n)),
        (ParamType::Float, Value::String(s)) => {
            match s.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Some(n) => Ok(Value::Number(n)),
                None => Err(mismatch(&Value::String(s))),
            }
        }

        (ParamType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ParamType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch(&Value::String(s))),
        },

        (ParamType::File, value) => coerce_location(value, "File").map_err(|v| mismatch(&v)),
        (ParamType::Directory, value) => {
            coerce_location(value, "Directory").map_err(|v| mismatch(&v))
        }

        (ParamType::Array(item), Value::Array(items)) => items
            .into_iter()
            .map(|v| coerce(item, v, id))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),

        (ParamType::Enum(symbols), Value::String(s)) if symbols.contains(&s) => Ok(Value::String(s)),

        (_, other) => Err(mismatch(&other)),
    }
}

/// Accept a path string or a `{class, path|location}` object
fn coerce_location(value: Value, class: &str) -> std::result::Result<Value, Value> {
    match value {
        Value::String(path) if !path.is_empty() => Ok(json!({"class": class, "path": path})),
        Value::Object(mut obj) => {
            let class_ok = obj
                .get("class")
                .and_then(Value::as_str)
                .map_or(true, |c| c == class);
            if !class_ok {
                return Err(Value::Object(obj));
            }
            if !obj.contains_key("path") {
                match obj.get("location").cloned() {
                    Some(location @ Value::String(_)) => {
                        obj.insert("path".to_string(), location);
                    }
                    _ => return Err(Value::Object(obj)),
                }
            }
            if !obj.get("path").is_some_and(Value::is_string) {
                return Err(Value::Object(obj));
            }
            obj.insert("class".to_string(), Value::String(class.to_string()));
            Ok(Value::Object(obj))
        }
        other => Err(other),
    }
}

/// File value for a path
pub fn file_value(path: &Path) -> Value {
    json!({"class": "File", "path": path.display().to_string()})
}

/// Path of a File/Directory value
pub(crate) fn location_path(value: &Value) -> Option<&str> {
    value.get("path").and_then(Value::as_str)
}

/// Text of a scalar or File value as it appears on a command line
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(_) => location_path(value).map(str::to_string),
        Value::Null | Value::Array(_) => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
