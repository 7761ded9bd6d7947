//! Tool descriptor parsing
//!
//! Accepts the CommandLineTool subset the adapter needs:
//!
//! ```yaml
//! class: CommandLineTool
//! baseCommand: [bwa, mem]
//! arguments:
//!   - {valueFrom: "$(runtime.cores)", prefix: "-t", position: 0}
//! inputs:
//!   - id: "#reference"
//!     type: File
//!     inputBinding: {position: 1}
//!   - id: "#reads"
//!     type: File[]
//!     inputBinding: {position: 2}
//! outputs:
//!   - id: "#sam"
//!     type: File
//!     outputBinding: {glob: out.sam}
//! stdout: out.sam
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DoclinkError, Result};

/// Declared type of an input or output
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    Null,
    Any,
    String,
    Int,
    Float,
    Boolean,
    File,
    Directory,
    Array(Box<ParamType>),
    Enum(Vec<String>),
}

impl ParamType {
    /// Parse a type declaration, returning the type and whether `null` is allowed
    pub fn parse(raw: &Value) -> Result<(ParamType, bool)> {
        match raw {
            Value::String(name) => Self::parse_name(name),
            Value::Array(members) => {
                let non_null: Vec<&Value> =
                    members.iter().filter(|m| m.as_str() != Some("null")).collect();
                let optional = non_null.len() < members.len();
                match non_null.as_slice() {
                    [] => Ok((ParamType::Null, true)),
                    [single] => {
                        let (ty, inner_optional) = Self::parse(single)?;
                        Ok((ty, optional || inner_optional))
                    }
                    _ => Ok((ParamType::Any, optional)),
                }
            }
            Value::Object(schema) => match schema.get("type").and_then(Value::as_str) {
                Some("array") => {
                    let items = schema.get("items").ok_or_else(|| invalid("array type without items"))?;
                    let (item, _) = Self::parse(items)?;
                    Ok((ParamType::Array(Box::new(item)), false))
                }
                Some("enum") => {
                    let symbols = schema
                        .get("symbols")
                        .and_then(Value::as_array)
                        .ok_or_else(|| invalid("enum type without symbols"))?
                        .iter()
                        .map(|s| {
                            s.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| invalid("enum symbols must be strings"))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok((ParamType::Enum(symbols), false))
                }
                _ => match schema.get("type") {
                    Some(inner) => Self::parse(inner),
                    None => Err(invalid("type object without 'type'")),
                },
            },
            other => Err(invalid(format!("unsupported type declaration {}", other))),
        }
    }

    fn parse_name(name: &str) -> Result<(ParamType, bool)> {
        if let Some(inner) = name.strip_suffix('?') {
            let (ty, _) = Self::parse_name(inner)?;
            return Ok((ty, true));
        }
        if let Some(inner) = name.strip_suffix("[]") {
            let (ty, _) = Self::parse_name(inner)?;
            return Ok((ParamType::Array(Box::new(ty)), false));
        }
        let ty = match name {
            "null" => return Ok((ParamType::Null, true)),
            "Any" => ParamType::Any,
            "string" => ParamType::String,
            "int" | "long" => ParamType::Int,
            "float" | "double" => ParamType::Float,
            "boolean" => ParamType::Boolean,
            "File" => ParamType::File,
            "Directory" => ParamType::Directory,
            other => return Err(invalid(format!("unknown type '{}'", other))),
        };
        Ok((ty, false))
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Null => write!(f, "null"),
            ParamType::Any => write!(f, "Any"),
            ParamType::String => write!(f, "string"),
            ParamType::Int => write!(f, "int"),
            ParamType::Float => write!(f, "float"),
            ParamType::Boolean => write!(f, "boolean"),
            ParamType::File => write!(f, "File"),
            ParamType::Directory => write!(f, "Directory"),
            ParamType::Array(item) => write!(f, "{}[]", item),
            ParamType::Enum(symbols) => write!(f, "one of [{}]", symbols.join(", ")),
        }
    }
}

/// How an input value becomes command-line arguments
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputBinding {
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_true")]
    pub separate: bool,
    #[serde(default)]
    pub item_separator: Option<String>,
}

/// Fixed argument with an optional parameter-reference template
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentBinding {
    pub value_from: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_true")]
    pub separate: bool,
}

/// Entry of the `arguments` list: a bare string or a binding
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Literal(String),
    Bound(ArgumentBinding),
}

/// Named input with its validator
#[derive(Debug, Clone, PartialEq)]
pub struct InputSlot {
    pub id: String,
    pub param_type: ParamType,
    pub optional: bool,
    pub default: Option<Value>,
    pub binding: Option<InputBinding>,
}

/// Named output collected from the job directory
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSlot {
    pub id: String,
    pub param_type: ParamType,
    pub optional: bool,
    pub glob: Option<String>,
}

/// Parsed tool description
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub base_command: Vec<String>,
    pub arguments: Vec<Argument>,
    /// Declaration order is kept
    pub inputs: IndexMap<String, InputSlot>,
    pub outputs: Vec<OutputSlot>,
    pub stdin: Option<String>,
    pub stdout: Option<String>,
    pub success_codes: Vec<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolRaw {
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    base_command: Option<CommandEndpoint>,
    #[serde(default)]
    arguments: Vec<Argument>,
    #[serde(default)]
    inputs: Vec<InputRaw>,
    #[serde(default)]
    outputs: Vec<OutputRaw>,
    #[serde(default)]
    stdin: Option<String>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default = "default_success_codes")]
    success_codes: Vec<i32>,
}

/// Handles string OR array for baseCommand
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandEndpoint {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputRaw {
    id: String,
    #[serde(default, rename = "type")]
    param_type: Option<Value>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    input_binding: Option<InputBinding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputRaw {
    id: String,
    #[serde(default, rename = "type")]
    param_type: Option<Value>,
    #[serde(default)]
    output_binding: Option<OutputBindingRaw>,
}

#[derive(Debug, Deserialize)]
struct OutputBindingRaw {
    #[serde(default)]
    glob: Option<String>,
}

impl ToolDescriptor {
    /// Parse a tool config (JSON value)
    pub fn from_config(tool_cfg: &Value) -> Result<Self> {
        let raw: ToolRaw =
            serde_json::from_value(tool_cfg.clone()).map_err(|e| invalid(e.to_string()))?;

        if let Some(class) = raw.class.as_deref() {
            if class != "CommandLineTool" {
                return Err(invalid(format!(
                    "class '{}' is not supported (expected CommandLineTool)",
                    class
                )));
            }
        }

        let mut inputs = IndexMap::with_capacity(raw.inputs.len());
        for input in raw.inputs {
            let id = normalize_id(&input.id);
            let (param_type, optional) = parse_declared(input.param_type.as_ref())?;
            let slot = InputSlot {
                id: id.clone(),
                param_type,
                optional,
                default: input.default,
                binding: input.input_binding,
            };
            if inputs.insert(id.clone(), slot).is_some() {
                return Err(invalid(format!("duplicate input id '{}'", id)));
            }
        }

        let outputs = raw
            .outputs
            .into_iter()
            .map(|output| {
                let (param_type, optional) = parse_declared(output.param_type.as_ref())?;
                Ok(OutputSlot {
                    id: normalize_id(&output.id),
                    param_type,
                    optional,
                    glob: output.output_binding.and_then(|b| b.glob),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let base_command = match raw.base_command {
            None => Vec::new(),
            Some(CommandEndpoint::Single(cmd)) => vec![cmd],
            Some(CommandEndpoint::Multiple(cmds)) => cmds,
        };

        Ok(Self {
            base_command,
            arguments: raw.arguments,
            inputs,
            outputs,
            stdin: raw.stdin,
            stdout: raw.stdout,
            success_codes: raw.success_codes,
        })
    }

    pub fn input(&self, id: &str) -> Option<&InputSlot> {
        self.inputs.get(id)
    }

    /// Whether `exit_code` counts as success for this tool
    pub fn is_success(&self, exit_code: i32) -> bool {
        self.success_codes.contains(&exit_code)
    }
}

fn parse_declared(raw: Option<&Value>) -> Result<(ParamType, bool)> {
    match raw {
        Some(raw) => ParamType::parse(raw),
        None => Ok((ParamType::Any, false)),
    }
}

/// Strip the `#` that draft tool documents put in front of ids
fn normalize_id(id: &str) -> String {
    id.trim_start_matches('#').to_string()
}

fn invalid(reason: impl Into<String>) -> DoclinkError {
    DoclinkError::InvalidToolConfig {
        reason: reason.into(),
    }
}

fn default_true() -> bool {
    true
}

fn default_success_codes() -> Vec<i32> {
    vec![0]
}
