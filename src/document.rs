//! Document model: the generic node tree the linker walks
//!
//! Any YAML or JSON file parses into a [`Node`]: a mapping, a sequence or a
//! scalar. Mappings keep insertion order so linked output stays stable.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{DoclinkError, Result};

/// String-keyed mapping of child nodes
pub type Mapping = IndexMap<String, Node>;

/// A node in a parsed document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

/// Leaf value of a document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
}

impl Node {
    /// Parse YAML (or JSON, which YAML accepts) text into a node tree.
    ///
    /// An empty document parses to `null`.
    pub fn parse_str(text: &str) -> std::result::Result<Node, String> {
        let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        Node::from_yaml(value)
    }

    /// Convert a raw YAML value.
    ///
    /// Scalar keys become their textual form (`1:` -> `"1"`), tags are dropped,
    /// and complex keys are rejected.
    pub fn from_yaml(value: serde_yaml::Value) -> std::result::Result<Node, String> {
        use serde_yaml::Value;

        Ok(match value {
            Value::Null => Node::Scalar(Scalar::Null),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Node::Scalar(Scalar::Number(n)),
            Value::String(s) => Node::Scalar(Scalar::String(s)),
            Value::Sequence(items) => Node::Sequence(
                items
                    .into_iter()
                    .map(Node::from_yaml)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Value::Mapping(entries) => {
                let mut mapping = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = key_to_string(key)?;
                    if mapping.contains_key(&key) {
                        return Err(format!("duplicate mapping key '{}'", key));
                    }
                    mapping.insert(key, Node::from_yaml(value)?);
                }
                Node::Mapping(mapping)
            }
            Value::Tagged(tagged) => Node::from_yaml(tagged.value)?,
        })
    }

    /// Short name of the node's shape, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Mapping(_) => "mapping",
            Node::Sequence(_) => "sequence",
            Node::Scalar(Scalar::Null) => "null",
            Node::Scalar(Scalar::Bool(_)) => "boolean",
            Node::Scalar(Scalar::Number(_)) => "number",
            Node::Scalar(Scalar::String(_)) => "string",
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }
}

fn key_to_string(key: serde_yaml::Value) -> std::result::Result<String, String> {
    use serde_yaml::Value;

    match key {
        Value::String(s) => Ok(s),
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Tagged(tagged) => key_to_string(tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => {
            Err("mapping keys must be scalars".to_string())
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(Scalar::String(s))
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Scalar(Scalar::Number(n.into()))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Scalar(Scalar::Bool(b))
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Sequence(items)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Mapping(mapping) => {
                let mut map = serializer.serialize_map(Some(mapping.len()))?;
                for (k, v) in mapping {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Node::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Scalar(scalar) => scalar.serialize(serializer),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(n) => n.serialize(serializer),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        Node::from_yaml(raw).map_err(serde::de::Error::custom)
    }
}

/// Output format for a linked document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON, two-space indent (default)
    #[default]
    Json,

    /// YAML
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Serialize a node tree in the requested format
pub fn render(node: &Node, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(node).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(node).map_err(|e| e.to_string()),
    };
    rendered.map_err(|details| DoclinkError::Render { details })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_document() {
        let node = Node::parse_str(
            r#"
            steps:
              - id: align
                run: {import: bwa.yaml}
              - 42
            "#,
        )
        .unwrap();

        let root = node.as_mapping().unwrap();
        let Node::Sequence(steps) = &root["steps"] else {
            panic!("steps should be a sequence");
        };
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1], Node::from(42));
        assert_eq!(steps[0].as_mapping().unwrap()["id"], Node::from("align"));
    }

    #[test]
    fn empty_document_is_null() {
        assert!(Node::parse_str("").unwrap().is_null());
    }

    #[test]
    fn scalar_keys_become_strings() {
        let node = Node::parse_str("1: one\ntrue: yes\n~: nothing").unwrap();
        let keys: Vec<_> = node.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["1", "true", "null"]);
    }

    #[test]
    fn complex_keys_are_rejected() {
        let err = Node::parse_str("? [a, b]\n: value").unwrap_err();
        assert!(err.contains("scalars"));
    }

    #[test]
    fn tags_are_dropped() {
        let node = Node::parse_str("value: !custom hello").unwrap();
        assert_eq!(node.as_mapping().unwrap()["value"], Node::from("hello"));
    }

    #[test]
    fn json_input_parses() {
        let node = Node::parse_str(r#"{"a": [1, 2.5, null, true]}"#).unwrap();
        let json = render(&node, OutputFormat::Json).unwrap();
        let back: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, serde_json::json!({"a": [1, 2.5, null, true]}));
    }

    #[test]
    fn json_render_uses_two_space_indent() {
        let node = Node::parse_str("a: 1").unwrap();
        assert_eq!(render(&node, OutputFormat::Json).unwrap(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn render_keeps_key_order() {
        let node = Node::parse_str("zeta: 1\nalpha: 2\nmid: 3").unwrap();
        let yaml = render(&node, OutputFormat::Yaml).unwrap();
        assert_eq!(yaml, "zeta: 1\nalpha: 2\nmid: 3\n");
    }

    #[test]
    fn deserialize_through_serde() {
        let node: Node = serde_yaml::from_str("[a, b]").unwrap();
        assert_eq!(node, Node::from(vec![Node::from("a"), Node::from("b")]));
    }
}
