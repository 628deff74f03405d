use super::{BlockCatalog, BlockDefinition};
use crate::schema::BlockCategory;
use tracing::warn;

/// A list picker over the catalog of one block category.
///
/// Every `open` fetches the catalog again; nothing is cached between opens.
#[derive(Debug, Clone)]
pub struct BlockPicker {
    category: BlockCategory,
    entries: Vec<BlockDefinition>,
    query: String,
    error: Option<String>,
}

impl BlockPicker {
    /// Fetches the catalog for `category`. A failed fetch yields an empty
    /// picker carrying the error message; reopening retries.
    pub async fn open(catalog: &dyn BlockCatalog, category: BlockCategory) -> Self {
        let (entries, error) = match catalog.list_blocks(category, true).await {
            Ok(entries) => (entries, None),
            Err(e) => {
                warn!(%category, error = %e, "failed to fetch block catalog");
                (Vec::new(), Some(e.to_string()))
            }
        };
        Self {
            category,
            entries,
            query: String::new(),
            error,
        }
    }

    pub fn category(&self) -> BlockCategory {
        self.category
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn entries(&self) -> &[BlockDefinition] {
        &self.entries
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Entries whose label, name or description contains the query,
    /// ignoring case.
    pub fn visible(&self) -> Vec<&BlockDefinition> {
        let needle = self.query.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries
            .iter()
            .filter(|entry| {
                entry.display_label().to_lowercase().contains(&needle)
                    || entry.name.to_lowercase().contains(&needle)
                    || entry
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Picks the entry called `name` and closes the picker.
    pub fn select(self, name: &str) -> Option<BlockDefinition> {
        self.entries.into_iter().find(|entry| entry.name == name)
    }
}
