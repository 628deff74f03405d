//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the blockform crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use blockform::prelude::*;
//!
//! # async fn run_example() -> Result<()> {
//! let config = EditorConfig::from_env();
//! let client = ApiClient::new(&config)?;
//! let session = EditorSession::new(config, std::sync::Arc::new(client));
//!
//! let root = session.open_root().await?;
//! let widget = root.hydrate().await;
//! println!("{}", WidgetOutline::format(&widget));
//! # Ok(())
//! # }
//! ```

// Sessions and editors
pub use crate::editor::{
    AddBlockRequest, EditMode, EditorSession, FieldInput, ModuleDescriptor, ModuleEditor,
};

// Schemas, paths and rendering
pub use crate::path::{Path, Segment};
pub use crate::render::{AddAffordance, FieldRenderer, ModuleBody, Widget, WidgetOutline};
pub use crate::schema::{BlockCategory, PrimitiveKind, SchemaNode, SchemaResolver};

// State holders
pub use crate::cache::{CachePolicy, SchemaCache};
pub use crate::store::{FieldValueStore, FieldWatch, SetOptions};

// Catalogs and the backend client
pub use crate::api::{ApiClient, ExecuteRequest, ExecuteResponse};
pub use crate::catalog::{BlockCatalog, BlockDefinition, BlockPicker, StaticCatalog};
pub use crate::config::EditorConfig;

// Serialization
pub use crate::export::{Preview, TextFormat, to_json, to_yaml};

// Error types
pub use crate::error::{EditorError, FetchError, ParseError, SchemaError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
