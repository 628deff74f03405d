//! Block catalogs: where block definitions and their schemas come from.

use crate::error::FetchError;
use crate::schema::BlockCategory;
use ahash::AHashMap;
use async_trait::async_trait;
use serde_json::Value;

mod definition;
mod picker;

pub use definition::*;
pub use picker::BlockPicker;

/// A source of block definitions and schemas.
///
/// The HTTP implementation lives in [`crate::api::ApiClient`]; [`StaticCatalog`]
/// serves a fixed set of definitions from memory.
#[async_trait]
pub trait BlockCatalog: Send + Sync {
    /// Lists the blocks available for `category`.
    async fn list_blocks(
        &self,
        category: BlockCategory,
        include_schema: bool,
    ) -> Result<Vec<BlockDefinition>, FetchError>;

    /// Fetches the parameter schema of the block called `name`.
    async fn block_schema(&self, name: &str) -> Result<BlockSchema, FetchError>;

    /// Fetches the schema of the top-level automation document.
    async fn root_schema(&self) -> Result<BlockDefinition, FetchError>;
}

/// An in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    blocks: AHashMap<BlockCategory, Vec<BlockDefinition>>,
    root: Option<BlockDefinition>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, category: BlockCategory, definition: BlockDefinition) -> Self {
        self.blocks.entry(category).or_default().push(definition);
        self
    }

    pub fn with_root(mut self, root: BlockDefinition) -> Self {
        self.root = Some(root);
        self
    }

    /// Loads a catalog from a JSON document of the form
    /// `{"root": {...}, "blocks": {"action": [...], ...}}`.
    pub fn from_json(document: &Value) -> Result<Self, FetchError> {
        let decode = |e: serde_json::Error| FetchError::Decode {
            url: "<catalog>".to_string(),
            message: e.to_string(),
        };
        let mut catalog = Self::new();
        if let Some(root) = document.get("root") {
            catalog.root = Some(serde_json::from_value(root.clone()).map_err(decode)?);
        }
        if let Some(Value::Object(blocks)) = document.get("blocks") {
            for (tag, entries) in blocks {
                let category: BlockCategory = tag.parse().map_err(|message| FetchError::Decode {
                    url: "<catalog>".to_string(),
                    message,
                })?;
                let definitions: Vec<BlockDefinition> =
                    serde_json::from_value(entries.clone()).map_err(decode)?;
                catalog.blocks.entry(category).or_default().extend(definitions);
            }
        }
        Ok(catalog)
    }

    fn find(&self, name: &str) -> Option<&BlockDefinition> {
        self.blocks.values().flatten().find(|d| d.name == name)
    }
}

#[async_trait]
impl BlockCatalog for StaticCatalog {
    async fn list_blocks(
        &self,
        category: BlockCategory,
        include_schema: bool,
    ) -> Result<Vec<BlockDefinition>, FetchError> {
        let mut definitions = self.blocks.get(&category).cloned().unwrap_or_default();
        if !include_schema {
            for definition in &mut definitions {
                definition.schema = None;
            }
        }
        Ok(definitions)
    }

    async fn block_schema(&self, name: &str) -> Result<BlockSchema, FetchError> {
        let definition = self
            .find(name)
            .ok_or_else(|| FetchError::UnknownBlock(name.to_string()))?;
        Ok(BlockSchema {
            schema: definition.schema.clone().unwrap_or_else(|| serde_json::json!({})),
            examples: definition.examples.clone(),
        })
    }

    async fn root_schema(&self) -> Result<BlockDefinition, FetchError> {
        self.root
            .clone()
            .ok_or_else(|| FetchError::UnknownBlock("automation-definition".to_string()))
    }
}
