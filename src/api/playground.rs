use crate::export::{TextFormat, serialize};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /playground/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// The automation document as JSON or YAML text.
    pub automation: String,
    pub format: TextFormat,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

impl ExecuteRequest {
    /// Serializes `document` in `format` for execution.
    pub fn from_document(document: &Value, format: TextFormat) -> Self {
        Self {
            automation: serialize(format, document),
            format,
            inputs: Map::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }
}

/// Outcome of a playground run. The trace is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub executed: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub trace: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}
