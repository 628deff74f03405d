//! Common test utilities: schemas, catalogs and sessions.
use async_trait::async_trait;
use blockform::catalog::BlockSchema;
use blockform::render::ModuleView;
use blockform::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The top-level automation schema used across the tests.
///
/// Covers every widget branch: primitives, a `$ref`'d enum, a primitive list,
/// a single block slot, a block list, a nested object and a free-form object.
#[allow(dead_code)]
pub fn automation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "retries": { "type": "integer" },
            "enabled": { "type": "boolean" },
            "level": { "$ref": "#/definitions/level" },
            "tags": { "type": "array", "items": { "type": "string" } },
            "trigger": { "type": "object", "x-block-type": "trigger" },
            "actions": {
                "type": "array",
                "items": { "type": "object", "x-block-type": "action" }
            },
            "settings": {
                "type": "object",
                "properties": { "timeout": { "type": "number" } }
            },
            "metadata": { "type": "object", "additionalProperties": {} }
        },
        "definitions": {
            "level": { "type": "string", "enum": ["info", "warn", "error"] }
        }
    })
}

#[allow(dead_code)]
pub fn logger_action() -> BlockDefinition {
    BlockDefinition::new("loggerAction")
        .with_label("Logger")
        .with_description("Writes a message to the log")
        .with_schema(json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "level": { "type": "string", "enum": ["info", "warn"] }
            }
        }))
}

#[allow(dead_code)]
pub fn http_action() -> BlockDefinition {
    BlockDefinition::new("httpAction")
        .with_label("HTTP Request")
        .with_description("Calls an external endpoint")
        .with_schema(json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" },
                "method": { "type": "string", "enum": ["GET", "POST"] }
            }
        }))
}

#[allow(dead_code)]
pub fn cron_trigger() -> BlockDefinition {
    BlockDefinition::new("cronTrigger")
        .with_label("Cron")
        .with_schema(json!({
            "type": "object",
            "properties": { "expression": { "type": "string" } }
        }))
}

#[allow(dead_code)]
pub fn test_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_root(BlockDefinition::new("automation").with_schema(automation_schema()))
        .with_block(BlockCategory::Action, logger_action())
        .with_block(BlockCategory::Action, http_action())
        .with_block(BlockCategory::Trigger, cron_trigger())
}

/// A session over an empty document.
#[allow(dead_code)]
pub fn open_session() -> Arc<EditorSession> {
    EditorSession::new(EditorConfig::default(), Arc::new(test_catalog()))
}

/// A session whose document holds `root` under the `root` key.
#[allow(dead_code)]
pub fn session_with_root(root: Value) -> Arc<EditorSession> {
    EditorSession::with_document(
        EditorConfig::default(),
        Arc::new(test_catalog()),
        json!({ "root": root }),
    )
}

#[allow(dead_code)]
pub fn root_path(key: &str) -> Path {
    Path::root().child(key)
}

/// A catalog wrapper that counts schema fetches and can be told to fail them.
#[allow(dead_code)]
pub struct CountingCatalog {
    inner: StaticCatalog,
    fail_schemas: bool,
    schema_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingCatalog {
    pub fn new(inner: StaticCatalog) -> Self {
        Self {
            inner,
            fail_schemas: false,
            schema_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(inner: StaticCatalog) -> Self {
        Self {
            fail_schemas: true,
            ..Self::new(inner)
        }
    }

    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockCatalog for CountingCatalog {
    async fn list_blocks(
        &self,
        category: BlockCategory,
        include_schema: bool,
    ) -> std::result::Result<Vec<BlockDefinition>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_blocks(category, include_schema).await
    }

    async fn block_schema(&self, name: &str) -> std::result::Result<BlockSchema, FetchError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_schemas {
            return Err(FetchError::Status {
                url: format!("/block/{}/schema", name),
                status: 500,
            });
        }
        self.inner.block_schema(name).await
    }

    async fn root_schema(&self) -> std::result::Result<BlockDefinition, FetchError> {
        self.inner.root_schema().await
    }
}

/// Finds the first add control with the given label.
#[allow(dead_code)]
pub fn affordance(widget: &Widget, label: &str) -> AddAffordance {
    widget
        .affordances()
        .into_iter()
        .find(|a| a.label == label)
        .cloned()
        .unwrap_or_else(|| panic!("no '{}' control in:\n{}", label, WidgetOutline::format(widget)))
}

/// The fields of a module widget, by key.
#[allow(dead_code)]
pub fn field_keys(widget: &Widget) -> Vec<String> {
    match widget {
        Widget::Module(ModuleView {
            body: ModuleBody::Fields { fields, .. },
            ..
        }) => fields.iter().map(|f| f.key.clone()).collect(),
        other => panic!("expected a structured module, got {}", other.kind_name()),
    }
}
