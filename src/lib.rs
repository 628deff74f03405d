//! # blockform - Schema-Driven Block Editing Engine
//!
//! **blockform** is the headless engine behind a visual editor for
//! "automations": documents built from typed blocks (variables, triggers,
//! conditions, actions, results) whose shape is described by server-supplied
//! JSON Schemas. A front-end draws the widgets; blockform decides which
//! widget each schema fragment needs and keeps the document consistent
//! across structured fields, JSON text and YAML text.
//!
//! ## Core Workflow
//!
//! 1.  **Open a Session**: Create an [`EditorSession`](editor::EditorSession) with a
//!     [`BlockCatalog`](catalog::BlockCatalog) (the HTTP [`ApiClient`](api::ApiClient)
//!     or an in-memory [`StaticCatalog`](catalog::StaticCatalog)).
//! 2.  **Mount the Root Editor**: `open_root` fetches the automation schema and mounts
//!     a [`ModuleEditor`](editor::ModuleEditor) at the `root` path.
//! 3.  **Render**: `hydrate` produces a [`Widget`](render::Widget) tree, fetching the
//!     schemas of nested blocks through the per-path [`SchemaCache`](cache::SchemaCache).
//! 4.  **Edit**: Feed widget interactions back with `input`, add blocks through the
//!     [`BlockPicker`](catalog::BlockPicker), or switch a subtree to JSON/YAML text.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blockform::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let catalog = StaticCatalog::new()
//!     .with_root(BlockDefinition::new("automation").with_schema(json!({
//!         "properties": {
//!             "message": { "type": "string" },
//!             "actions": { "type": "array", "items": { "type": "object", "x-block-type": "action" } }
//!         }
//!     })))
//!     .with_block(
//!         BlockCategory::Action,
//!         BlockDefinition::new("loggerAction")
//!             .with_label("Logger")
//!             .with_schema(json!({ "properties": { "level": { "enum": ["info", "warn"] } } })),
//!     );
//!
//! let session = EditorSession::new(EditorConfig::default(), Arc::new(catalog));
//! let root = session.open_root().await?;
//!
//! // Type into the `message` field.
//! root.input(&Path::root().child("message"), FieldInput::Text("Hello".into()));
//!
//! // Add a logger action through the picker.
//! let widget = root.hydrate().await;
//! let add = widget.affordances().into_iter().find(|a| a.label == "Add action").cloned().unwrap();
//! let request = AddBlockRequest::from_affordance(&add).unwrap();
//! let picker = root.open_picker(&request).await;
//! if let Some(logger) = picker.select("loggerAction") {
//!     root.insert_block(&request, &logger)?;
//! }
//!
//! println!("{}", WidgetOutline::format(&root.hydrate().await));
//! println!("{}", to_yaml(&root.value().unwrap_or_default()));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod path;
pub mod prelude;
pub mod render;
pub mod schema;
pub mod store;
