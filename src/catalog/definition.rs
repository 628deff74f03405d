use crate::schema::BlockCategory;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A catalog entry describing one available block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// Canonical identifier, `<baseName><Category>` (e.g. `loggerAction`).
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub examples: Vec<Value>,
}

impl BlockDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            description: None,
            schema: None,
            examples: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// The label shown to users, falling back to the canonical name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// The minimal document instance of this block:
    /// `{"<category>": "<baseName>", "alias": "<label>"}`.
    pub fn instance(&self, category: BlockCategory) -> Value {
        let mut instance = Map::new();
        instance.insert(
            category.tag().to_string(),
            Value::String(base_name(&self.name, category).to_string()),
        );
        instance.insert(
            "alias".to_string(),
            Value::String(self.display_label().to_string()),
        );
        Value::Object(instance)
    }
}

/// The schema of one block, as served by `GET /block/{name}/schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSchema {
    pub schema: Value,
    #[serde(default)]
    pub examples: Vec<Value>,
}

impl Default for BlockSchema {
    fn default() -> Self {
        Self {
            schema: json!({}),
            examples: Vec::new(),
        }
    }
}

/// Builds the canonical name: `("logger", Action)` gives `loggerAction`.
pub fn block_name(base: &str, category: BlockCategory) -> String {
    format!("{}{}", base, category.suffix())
}

/// Strips the category suffix: `loggerAction` gives `logger`. Names that do
/// not follow the convention are returned unchanged.
pub fn base_name(name: &str, category: BlockCategory) -> &str {
    name.strip_suffix(category.suffix())
        .filter(|base| !base.is_empty())
        .unwrap_or(name)
}

/// Recovers the canonical block name from an instance value such as
/// `{"action": "logger", "alias": "Logger"}`.
pub fn name_from_instance(instance: &Value, category: BlockCategory) -> Option<String> {
    instance
        .get(category.tag())
        .and_then(Value::as_str)
        .filter(|base| !base.is_empty())
        .map(|base| block_name(base, category))
}
