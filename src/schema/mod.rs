//! Schema model: raw JSON Schema fragments, block categories and the closed
//! [`SchemaNode`] variant that the renderer dispatches on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub mod resolver;

pub use resolver::{SchemaResolver, merge};

/// Extension keyword marking a subtree as a pluggable block.
pub const BLOCK_TYPE_KEY: &str = "x-block-type";

/// The five fixed block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockCategory {
    Variable,
    Trigger,
    Condition,
    Action,
    Result,
}

impl BlockCategory {
    pub const ALL: [BlockCategory; 5] = [
        BlockCategory::Variable,
        BlockCategory::Trigger,
        BlockCategory::Condition,
        BlockCategory::Action,
        BlockCategory::Result,
    ];

    /// The lowercase tag, also used as the instance key (`{"action": "logger"}`).
    pub fn tag(&self) -> &'static str {
        match self {
            BlockCategory::Variable => "variable",
            BlockCategory::Trigger => "trigger",
            BlockCategory::Condition => "condition",
            BlockCategory::Action => "action",
            BlockCategory::Result => "result",
        }
    }

    /// The capitalized suffix of canonical block names (`loggerAction`).
    pub fn suffix(&self) -> &'static str {
        match self {
            BlockCategory::Variable => "Variable",
            BlockCategory::Trigger => "Trigger",
            BlockCategory::Condition => "Condition",
            BlockCategory::Action => "Action",
            BlockCategory::Result => "Result",
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BlockCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockCategory::ALL
            .into_iter()
            .find(|c| c.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown block category '{}'", s))
    }
}

/// Scalar schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveKind {
    pub fn tag(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Boolean => "boolean",
        }
    }

    /// The value a freshly materialized field of this kind starts with.
    pub fn default_value(&self) -> Value {
        match self {
            PrimitiveKind::String => Value::String(String::new()),
            PrimitiveKind::Number | PrimitiveKind::Integer => Value::from(0),
            PrimitiveKind::Boolean => Value::Bool(false),
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(PrimitiveKind::String),
            "number" => Some(PrimitiveKind::Number),
            "integer" => Some(PrimitiveKind::Integer),
            "boolean" => Some(PrimitiveKind::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PrimitiveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrimitiveKind::from_tag(&s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown primitive type '{}'", s))
    }
}

/// How an object schema treats keys it does not declare.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Forbidden,
    Any,
    Typed(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSchema {
    pub kind: PrimitiveKind,
    pub enum_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    /// The raw, still unresolved `items` fragment.
    pub items: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub properties: Map<String, Value>,
    pub additional: AdditionalProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRefSchema {
    pub category: BlockCategory,
}

/// A schema fragment after `$ref` resolution, classified once for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Primitive(PrimitiveSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    BlockRef(BlockRefSchema),
    Unresolved,
}

impl SchemaNode {
    /// Classifies an already resolved fragment. `None` means the reference
    /// pointed nowhere.
    pub fn classify(resolved: Option<&Value>) -> SchemaNode {
        let Some(Value::Object(schema)) = resolved else {
            return SchemaNode::Unresolved;
        };

        match schema_type(schema).as_deref() {
            Some("array") => SchemaNode::Array(ArraySchema {
                items: schema.get("items").cloned(),
            }),
            Some("object") => {
                if let Some(category) = block_category(schema) {
                    return SchemaNode::BlockRef(BlockRefSchema { category });
                }
                SchemaNode::Object(ObjectSchema {
                    properties: schema
                        .get("properties")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                    additional: additional_properties(schema),
                })
            }
            Some(tag) => match PrimitiveKind::from_tag(tag) {
                Some(kind) => SchemaNode::Primitive(PrimitiveSchema {
                    kind,
                    enum_values: enum_values(schema),
                }),
                None => SchemaNode::Unresolved,
            },
            None => SchemaNode::Unresolved,
        }
    }
}

/// The declared `type`, or the one implied by the keywords present.
pub fn schema_type(schema: &Map<String, Value>) -> Option<String> {
    match schema.get("type") {
        Some(Value::String(t)) => return Some(t.clone()),
        // `["string", "null"]` style unions: take the first non-null member.
        Some(Value::Array(types)) => {
            if let Some(t) = types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null")
            {
                return Some(t.to_string());
            }
        }
        _ => {}
    }
    if schema.contains_key("properties")
        || schema.contains_key("additionalProperties")
        || schema.contains_key(BLOCK_TYPE_KEY)
    {
        Some("object".to_string())
    } else if schema.contains_key("items") {
        Some("array".to_string())
    } else if schema.contains_key("enum") {
        Some("string".to_string())
    } else {
        None
    }
}

pub fn block_category(schema: &Map<String, Value>) -> Option<BlockCategory> {
    schema
        .get(BLOCK_TYPE_KEY)
        .and_then(Value::as_str)
        .and_then(|tag| tag.parse().ok())
}

fn enum_values(schema: &Map<String, Value>) -> Option<Vec<String>> {
    schema.get("enum").and_then(Value::as_array).map(|values| {
        values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    })
}

fn additional_properties(schema: &Map<String, Value>) -> AdditionalProperties {
    match schema.get("additionalProperties") {
        None | Some(Value::Bool(false)) | Some(Value::Null) => AdditionalProperties::Forbidden,
        Some(Value::Bool(true)) => AdditionalProperties::Any,
        Some(Value::Object(inner)) if inner.is_empty() => AdditionalProperties::Any,
        Some(other) => AdditionalProperties::Typed(other.clone()),
    }
}

/// A schema describing an existing value, used for undeclared keys of
/// free-form objects.
pub fn infer_schema(value: &Value) -> Value {
    let tag = match value {
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) | Value::Null => "string",
    };
    serde_json::json!({ "type": tag })
}
