use super::{EditMode, FieldInput, ModuleDescriptor, ModuleEditor};
use crate::cache::SchemaCache;
use crate::catalog::{BlockCatalog, name_from_instance};
use crate::config::EditorConfig;
use crate::error::{EditorError, FetchError};
use crate::export::parse;
use crate::export::TextFormat;
use crate::path::{Path, Segment};
use crate::render::{FieldRenderer, ModuleBody, ModuleHost, ModuleRequest, ModuleRole, ModuleSource, ModuleView, Widget};
use crate::schema::SchemaResolver;
use crate::store::{FieldValueStore, SetOptions};
use ahash::AHashMap;
use parking_lot::Mutex;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Per-path state of a module editor. Lives in the session so that it
/// survives re-rendering.
#[derive(Debug, Clone, Default)]
pub(crate) struct EditorState {
    pub(crate) mode: EditMode,
    pub(crate) text: String,
    /// The text as last synchronized with the store.
    pub(crate) baseline: Option<String>,
    pub(crate) parse_error: Option<String>,
    pub(crate) fetch_error: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) descriptor: Option<ModuleDescriptor>,
    pub(crate) mount_epoch: u64,
}

/// Everything one editing session shares: the document, the schema cache,
/// the catalog and the state of every module editor.
///
/// Sessions are independent; two sessions never see each other's values or
/// schemas.
pub struct EditorSession {
    config: EditorConfig,
    store: FieldValueStore,
    cache: SchemaCache,
    catalog: Arc<dyn BlockCatalog>,
    renderer: FieldRenderer,
    pub(crate) editors: Mutex<AHashMap<String, EditorState>>,
    epochs: AtomicU64,
}

impl EditorSession {
    pub fn new(config: EditorConfig, catalog: Arc<dyn BlockCatalog>) -> Arc<Self> {
        Self::with_document(config, catalog, Value::Object(Map::new()))
    }

    /// Starts a session over an existing document.
    pub fn with_document(
        config: EditorConfig,
        catalog: Arc<dyn BlockCatalog>,
        document: Value,
    ) -> Arc<Self> {
        let renderer = FieldRenderer::new(
            SchemaResolver::new(config.max_ref_depth),
            config.max_render_depth,
        );
        Arc::new(Self {
            store: FieldValueStore::new(document),
            cache: SchemaCache::new(config.cache_policy),
            catalog,
            renderer,
            editors: Mutex::new(AHashMap::new()),
            epochs: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &FieldValueStore {
        &self.store
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn catalog(&self) -> &Arc<dyn BlockCatalog> {
        &self.catalog
    }

    pub fn renderer(&self) -> &FieldRenderer {
        &self.renderer
    }

    /// A handle to the module editor at `path`.
    pub fn editor(self: &Arc<Self>, path: Path) -> ModuleEditor {
        ModuleEditor::new(Arc::clone(self), path)
    }

    /// Fetches the top-level automation schema and mounts the root editor.
    pub async fn open_root(self: &Arc<Self>) -> Result<ModuleEditor, FetchError> {
        let root = self.catalog.root_schema().await?;
        let schema = root.schema.unwrap_or_else(|| Value::Object(Map::new()));
        let editor = self.editor(Path::root());
        editor.mount(ModuleDescriptor::inline(schema)).await;
        Ok(editor)
    }

    pub(crate) fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Applies one widget interaction to the store. Returns whether anything
    /// was written.
    pub fn input(&self, path: &Path, input: FieldInput) -> bool {
        let value = match input {
            FieldInput::Text(text) | FieldInput::Select(text) => Value::String(text),
            FieldInput::Checked(checked) => Value::Bool(checked),
            FieldInput::Number(raw) => coerce_number(&raw),
            FieldInput::RawJson(text) => match parse(TextFormat::Json, &text) {
                Ok(value) => value,
                Err(e) => {
                    debug!(path = %path, error = %e, "keeping previous value for raw JSON field");
                    return false;
                }
            },
            FieldInput::Value(value) => value,
        };
        match self.store.set(path, value, SetOptions::interactive()) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path, error = %e, "field input rejected");
                false
            }
        }
    }

    /// Removes the value at `path` together with its cached schemas and
    /// editor state. Removing a sequence element also drops the entries of
    /// the elements that shift into its place.
    pub fn remove_at(&self, path: &Path) -> Result<Value, EditorError> {
        match (path.parent(), path.last()) {
            (Some(parent), Some(Segment::Index(index))) => {
                let removed = self.store.remove(&parent, *index)?;
                self.cache.evict_from_index(&parent, *index);
                self.forget_editors(|p| {
                    p.starts_with(&parent)
                        && matches!(p.segments().get(parent.len()), Some(Segment::Index(i)) if *i >= *index)
                });
                Ok(removed)
            }
            (Some(_), Some(Segment::Key(_))) => {
                let removed = self
                    .store
                    .get(path)
                    .ok_or_else(|| EditorError::NotABlock(path.key()))?;
                self.store.reset_field(path);
                self.cache.evict(path);
                self.forget_editors(|p| p.starts_with(path));
                Ok(removed)
            }
            _ => Err(EditorError::NotABlock(path.key())),
        }
    }

    /// Moves the sequence element at `from` to `to`. Every element between
    /// the two positions changes index, so their cached schemas and editor
    /// states are dropped.
    pub fn move_at(&self, array: &Path, from: usize, to: usize) -> Result<(), EditorError> {
        self.store.move_item(array, from, to)?;
        if from == to {
            return Ok(());
        }
        let shifted = from.min(to)..=from.max(to);
        for index in shifted.clone() {
            self.cache.evict(&array.index(index));
        }
        self.forget_editors(|p| {
            p.starts_with(array)
                && matches!(
                    p.segments().get(array.len()),
                    Some(Segment::Index(i)) if shifted.contains(i)
                )
        });
        debug!(path = %array, from, to, "sequence element moved");
        Ok(())
    }

    pub(crate) fn forget_editors(&self, doomed: impl Fn(&Path) -> bool) {
        self.editors
            .lock()
            .retain(|key, _| !doomed(&Path::parse(key)));
    }

    pub(crate) fn state(&self, path: &Path) -> Option<EditorState> {
        self.editors.lock().get(&path.key()).cloned()
    }
}

impl ModuleHost for EditorSession {
    fn value(&self, path: &Path) -> Option<Value> {
        self.store.get(path)
    }

    fn render_module(&self, renderer: &FieldRenderer, request: ModuleRequest) -> Widget {
        let path = request.path;
        let mut state = self.state(&path);

        let role = match request.role {
            ModuleRole::Block { category, name } => {
                let live = self
                    .store
                    .get(&path)
                    .and_then(|v| name_from_instance(&v, category));
                if state.as_ref().is_some_and(|s| is_stale_block(s, live.as_deref())) {
                    debug!(path = %path, block = ?live, "block type changed, dropping its schema");
                    self.cache.evict(&path);
                    self.forget_editors(|p| p.starts_with(&path));
                    state = None;
                }
                let name = name
                    .or(live)
                    .or_else(|| state.as_ref().and_then(|s| s.name.clone()));
                ModuleRole::Block { category, name }
            }
            other => other,
        };
        let hidden: Vec<&str> = match &role {
            ModuleRole::Block { category, .. } => vec![category.tag(), "alias"],
            _ => Vec::new(),
        };

        let text_body = state.as_ref().and_then(|s| {
            s.mode.format().map(|format| ModuleBody::Text {
                format,
                text: s.text.clone(),
                error: s.parse_error.clone(),
            })
        });

        let body = match text_body {
            Some(body) => body,
            None => {
                let schema = match &request.source {
                    ModuleSource::Inline(schema) => {
                        self.cache.seed(&path, schema.clone());
                        Some(self.cache.peek(&path).unwrap_or_else(|| schema.clone()))
                    }
                    ModuleSource::Block(_) => self.cache.peek(&path),
                };
                match schema {
                    Some(schema) => {
                        renderer.render_fields(&schema, &path, &hidden, self, request.depth)
                    }
                    None => ModuleBody::Pending {
                        loading: self.cache.is_loading(&path),
                    },
                }
            }
        };

        Widget::Module(ModuleView {
            path,
            title: request.key,
            role,
            removable: request.removable,
            error: state.and_then(|s| s.fetch_error),
            body,
        })
    }
}

/// Whether a structured block editor was mounted for a different block than
/// the instance now stored at its path. Only editors that derived their name
/// from the instance qualify; an explicitly named editor keeps its block.
fn is_stale_block(state: &EditorState, live: Option<&str>) -> bool {
    let derived = state
        .descriptor
        .as_ref()
        .is_some_and(|d| d.category.is_some() && d.name.is_none() && d.schema.is_none());
    derived
        && state.mode == EditMode::Structured
        && live.is_some()
        && state.name.as_deref() != live
}

/// Turns numeric text into a JSON number. Text that is not a finite number
/// becomes `null`; rejecting it is left to validation.
fn coerce_number(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::from(integer);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}
