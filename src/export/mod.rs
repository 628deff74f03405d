//! Text serializations of document values: pretty JSON and YAML.
//!
//! The `to_*` functions are total and meant for display. `parse` is the
//! fallible inverse used by text-mode editing.

use crate::error::ParseError;
use crate::store::FieldWatch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The two text representations a subtree can be edited in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextFormat {
    Json,
    Yaml,
}

impl fmt::Display for TextFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextFormat::Json => f.write_str("json"),
            TextFormat::Yaml => f.write_str("yaml"),
        }
    }
}

/// Pretty-printed JSON with a two-space indent.
pub fn to_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Error: {}", e))
}

pub fn to_yaml(value: &Value) -> String {
    serde_yaml::to_string(value).unwrap_or_else(|e| format!("Error: {}", e))
}

pub fn serialize(format: TextFormat, value: &Value) -> String {
    match format {
        TextFormat::Json => to_json(value),
        TextFormat::Yaml => to_yaml(value),
    }
}

pub fn parse(format: TextFormat, text: &str) -> Result<Value, ParseError> {
    match format {
        TextFormat::Json => {
            serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))
        }
        TextFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| ParseError::Yaml(e.to_string()))
        }
    }
}

/// Read-only rendering of a watched subtree.
pub struct Preview {
    watch: FieldWatch,
}

impl Preview {
    pub fn new(watch: FieldWatch) -> Self {
        Self { watch }
    }

    fn value(&self) -> Value {
        self.watch.current().unwrap_or(Value::Null)
    }

    pub fn json(&self) -> String {
        to_json(&self.value())
    }

    pub fn yaml(&self) -> String {
        to_yaml(&self.value())
    }

    /// Waits for the watched subtree to change. Returns `false` once the
    /// store is gone.
    pub async fn changed(&mut self) -> bool {
        self.watch.changed().await
    }
}
