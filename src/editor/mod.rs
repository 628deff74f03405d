//! Module editors: per-path controllers that switch a subtree between the
//! generated form and raw JSON/YAML text, and keep every representation in
//! sync with the value store.

use crate::catalog::{BlockDefinition, BlockPicker, name_from_instance};
use crate::error::{EditorError, ValidationError};
use crate::export::{TextFormat, parse, serialize};
use crate::path::Path;
use crate::render::{
    AddAffordance, AddKind, ModuleHost, ModuleRequest, ModuleRole, ModuleSource, Widget,
};
use crate::schema::{BlockCategory, PrimitiveKind};
use crate::store::SetOptions;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

mod session;

pub use session::EditorSession;

/// How a module editor presents its subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Structured,
    Json,
    Yaml,
}

impl EditMode {
    /// The text format of a text mode; `None` for the structured form.
    pub fn format(&self) -> Option<TextFormat> {
        match self {
            EditMode::Structured => None,
            EditMode::Json => Some(TextFormat::Json),
            EditMode::Yaml => Some(TextFormat::Yaml),
        }
    }
}

/// A user interaction with a single field widget.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Text(String),
    /// Raw text from a numeric input.
    Number(String),
    Checked(bool),
    Select(String),
    /// Text of a raw-JSON fallback field.
    RawJson(String),
    Value(Value),
}

/// What a module editor knows about its subtree before it mounts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleDescriptor {
    pub name: Option<String>,
    pub category: Option<BlockCategory>,
    pub schema: Option<Value>,
}

impl ModuleDescriptor {
    /// A module whose schema is already known.
    pub fn inline(schema: Value) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// A block whose schema is fetched by its canonical name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A block of `category`; the name is derived from the instance value.
    pub fn block(category: BlockCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }
}

/// A request to insert a nested block, produced by a block "add" control.
#[derive(Debug, Clone, PartialEq)]
pub struct AddBlockRequest {
    pub category: BlockCategory,
    pub target: Path,
    pub is_array: bool,
}

impl AddBlockRequest {
    pub fn from_affordance(add: &AddAffordance) -> Option<Self> {
        match add.kind {
            AddKind::Block { category, is_array } => Some(Self {
                category,
                target: add.target.clone(),
                is_array,
            }),
            AddKind::Item { .. } => None,
        }
    }
}

/// A handle to the module editor at one path of a session.
///
/// Handles are cheap; the editor's state lives in the [`EditorSession`], keyed
/// by path, so two handles for the same path see the same editor.
#[derive(Clone)]
pub struct ModuleEditor {
    session: Arc<EditorSession>,
    path: Path,
}

impl ModuleEditor {
    pub(crate) fn new(session: Arc<EditorSession>, path: Path) -> Self {
        Self { session, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> &Arc<EditorSession> {
        &self.session
    }

    pub fn mode(&self) -> EditMode {
        self.session
            .state(&self.path)
            .map(|s| s.mode)
            .unwrap_or_default()
    }

    /// The text buffer, when in a text mode.
    pub fn text(&self) -> Option<String> {
        self.session
            .state(&self.path)
            .filter(|s| s.mode != EditMode::Structured)
            .map(|s| s.text)
    }

    pub fn parse_error(&self) -> Option<String> {
        self.session.state(&self.path).and_then(|s| s.parse_error)
    }

    pub fn fetch_error(&self) -> Option<String> {
        self.session.state(&self.path).and_then(|s| s.fetch_error)
    }

    pub fn block_name(&self) -> Option<String> {
        self.session.state(&self.path).and_then(|s| s.name)
    }

    pub fn value(&self) -> Option<Value> {
        self.session.store().get(&self.path)
    }

    /// Resolves the schema for this subtree through the schema cache.
    ///
    /// The loader returns the descriptor's embedded schema, or fetches the
    /// block schema by name. Without a schema the editor falls back to JSON
    /// mode, and a failed fetch is recorded as a visible error. A mount that
    /// completes after its block was removed changes nothing.
    pub async fn mount(&self, descriptor: ModuleDescriptor) -> EditMode {
        let value = self.value();
        let name = descriptor.name.clone().or_else(|| {
            descriptor
                .category
                .zip(value.as_ref())
                .and_then(|(category, value)| name_from_instance(value, category))
        });

        let epoch = self.session.next_epoch();
        {
            let mut editors = self.session.editors.lock();
            let state = editors.entry(self.path.key()).or_default();
            state.name = name.clone();
            state.descriptor = Some(descriptor.clone());
            state.mount_epoch = epoch;
        }

        let catalog = Arc::clone(self.session.catalog());
        let embedded = descriptor.schema;
        let loader_name = name.clone();
        let outcome = self
            .session
            .cache()
            .get(&self.path, move || async move {
                match (embedded, loader_name) {
                    (Some(schema), _) => Ok(Some(schema)),
                    (None, Some(name)) => catalog.block_schema(&name).await.map(|s| Some(s.schema)),
                    (None, None) => Ok(None),
                }
            })
            .await;

        let mut editors = self.session.editors.lock();
        let Some(state) = editors
            .get_mut(&self.path.key())
            .filter(|s| s.mount_epoch == epoch)
        else {
            debug!(path = %self.path, "mount finished for a module that is gone");
            return EditMode::Structured;
        };

        match outcome {
            Ok(Some(_)) => {
                state.fetch_error = None;
            }
            Ok(None) => {
                debug!(path = %self.path, "no schema available, editing as JSON");
                enter_text_mode(state, TextFormat::Json, self.session.store().get(&self.path));
            }
            Err(e) => {
                warn!(path = %self.path, block = ?name, error = %e, "schema fetch failed");
                state.fetch_error = Some(e.to_string());
                enter_text_mode(state, TextFormat::Json, self.session.store().get(&self.path));
            }
        }
        state.mode
    }

    /// Moves the editor to `target`.
    ///
    /// Leaving a text mode parses the buffer first; when that fails the
    /// transition is refused and the editor stays where it is.
    pub fn switch_mode(&self, target: EditMode) -> Result<(), EditorError> {
        let store = self.session.store();
        let mut editors = self.session.editors.lock();
        let state = editors.entry(self.path.key()).or_default();

        if state.mode == target {
            return Ok(());
        }

        match (state.mode.format(), target.format()) {
            (None, Some(format)) => {
                enter_text_mode(state, format, store.get(&self.path));
            }
            (Some(current), next) => {
                let parsed = match parse(current, &state.text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        state.parse_error = Some(e.to_string());
                        return Err(e.into());
                    }
                };
                if state.baseline.as_deref() != Some(state.text.as_str()) {
                    store.set(&self.path, parsed.clone(), SetOptions::interactive())?;
                }
                state.parse_error = None;
                match next {
                    Some(format) => enter_text_mode(state, format, Some(parsed)),
                    None => {
                        state.mode = EditMode::Structured;
                        state.text.clear();
                        state.baseline = None;
                    }
                }
            }
            (None, None) => {}
        }
        debug!(path = %self.path, mode = ?target, "edit mode changed");
        Ok(())
    }

    /// Applies a keystroke in a text mode.
    ///
    /// Parseable text is written to the store; otherwise the store keeps its
    /// last valid value and the parse error is recorded. Has no effect in
    /// structured mode.
    pub fn input_text(&self, text: impl Into<String>) -> Result<(), EditorError> {
        let text = text.into();
        let mut editors = self.session.editors.lock();
        let state = editors.entry(self.path.key()).or_default();
        let Some(format) = state.mode.format() else {
            return Ok(());
        };

        state.text = text;
        match parse(format, &state.text) {
            Ok(value) => {
                self.session
                    .store()
                    .set(&self.path, value, SetOptions::interactive())?;
                state.parse_error = None;
                state.baseline = Some(state.text.clone());
                Ok(())
            }
            Err(e) => {
                state.parse_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Renders this module and everything below it.
    pub fn render(&self) -> Widget {
        let state = self.session.state(&self.path);
        let descriptor = state.and_then(|s| s.descriptor).unwrap_or_default();
        let (source, role) = match (descriptor.schema, descriptor.category) {
            (Some(schema), _) => (ModuleSource::Inline(schema), ModuleRole::Object),
            (None, Some(category)) => (
                ModuleSource::Block(category),
                ModuleRole::Block {
                    category,
                    name: descriptor.name,
                },
            ),
            (None, None) => match descriptor.name {
                Some(name) => (
                    ModuleSource::Block(category_of(&name)),
                    ModuleRole::Block {
                        category: category_of(&name),
                        name: Some(name),
                    },
                ),
                None => (
                    ModuleSource::Inline(json!({ "additionalProperties": {} })),
                    ModuleRole::Object,
                ),
            },
        };

        let session: &EditorSession = &self.session;
        session.render_module(
            session.renderer(),
            ModuleRequest {
                key: None,
                path: self.path.clone(),
                source,
                role,
                removable: false,
                depth: 0,
            },
        )
    }

    /// Renders, mounting nested block modules until none is left waiting
    /// for a schema.
    pub async fn hydrate(&self) -> Widget {
        let mut widget = self.render();
        for _ in 0..=self.session.config().max_render_depth {
            let pending: Vec<(Path, Option<BlockCategory>)> = widget
                .pending_modules()
                .into_iter()
                .filter(|view| !self.session.cache().is_loading(&view.path))
                .map(|view| {
                    let category = match view.role {
                        ModuleRole::Block { category, .. } => Some(category),
                        _ => None,
                    };
                    (view.path.clone(), category)
                })
                .collect();
            if pending.is_empty() {
                break;
            }
            for (path, category) in pending {
                let descriptor = category.map(ModuleDescriptor::block).unwrap_or_default();
                self.session.editor(path).mount(descriptor).await;
            }
            widget = self.render();
        }
        widget
    }

    /// Acts on an "add" control: generic items are appended directly, block
    /// controls open a picker for the caller to choose from.
    pub async fn activate(&self, add: &AddAffordance) -> Result<Option<BlockPicker>, EditorError> {
        match &add.kind {
            AddKind::Item { template } => {
                self.append_item(&add.target, template.clone())?;
                Ok(None)
            }
            AddKind::Block { category, .. } => Ok(Some(
                BlockPicker::open(self.session.catalog().as_ref(), *category).await,
            )),
        }
    }

    /// Opens the block picker for a nested block request.
    pub async fn open_picker(&self, request: &AddBlockRequest) -> BlockPicker {
        BlockPicker::open(self.session.catalog().as_ref(), request.category).await
    }

    /// Inserts a new instance of `definition`: appended for sequence
    /// targets, assigned (replacing any previous block) otherwise. Returns
    /// the path of the new instance.
    pub fn insert_block(
        &self,
        request: &AddBlockRequest,
        definition: &BlockDefinition,
    ) -> Result<Path, EditorError> {
        let instance = definition.instance(request.category);
        let store = self.session.store();
        let inserted = if request.is_array {
            let index = store.append(&request.target, instance)?;
            request.target.index(index)
        } else {
            store.set(&request.target, instance, SetOptions::interactive())?;
            request.target.clone()
        };
        self.session.cache().evict(&inserted);
        self.session.forget_editors(|p| p.starts_with(&inserted));
        debug!(path = %inserted, block = %definition.name, "block inserted");
        Ok(inserted)
    }

    /// Removes the block instance at `path` and evicts its cached schema.
    pub fn remove_block(&self, path: &Path) -> Result<Value, EditorError> {
        self.session.remove_at(path)
    }

    /// Moves the block at `from` of the sequence at `array` to `to`. The
    /// blocks in between change index, so their schemas are dropped and
    /// fetched again on the next hydrate.
    pub fn move_block(&self, array: &Path, from: usize, to: usize) -> Result<(), EditorError> {
        self.session.move_at(array, from, to)
    }

    /// Reorders a generic list the same way as [`ModuleEditor::move_block`].
    pub fn move_item(&self, array: &Path, from: usize, to: usize) -> Result<(), EditorError> {
        self.session.move_at(array, from, to)
    }

    pub fn append_item(&self, path: &Path, item: Value) -> Result<usize, EditorError> {
        Ok(self.session.store().append(path, item)?)
    }

    pub fn remove_item(&self, path: &Path, index: usize) -> Result<Value, EditorError> {
        self.session.remove_at(&path.index(index))
    }

    pub fn input(&self, path: &Path, input: FieldInput) -> bool {
        self.session.input(path, input)
    }

    /// Adds an undeclared property to this module's schema.
    ///
    /// The key is merged into the cached schema so the next render shows the
    /// field, and the value is created immediately with the type's default.
    pub fn add_dynamic_property(&self, key: &str, kind: PrimitiveKind) -> Result<(), EditorError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::EmptyKey.into());
        }

        let cache = self.session.cache();
        let store = self.session.store();
        let mut schema = cache
            .peek(&self.path)
            .unwrap_or_else(|| json!({ "additionalProperties": {} }));
        let field_path = self.path.child(key);

        let declared = schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|p| p.contains_key(key));
        if declared || store.get(&field_path).is_some() {
            return Err(ValidationError::DuplicateKey(key.to_string()).into());
        }

        if !schema.is_object() {
            schema = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut schema {
            let properties = map
                .entry("properties")
                .or_insert_with(|| Value::Object(Map::new()));
            if !properties.is_object() {
                *properties = Value::Object(Map::new());
            }
            if let Value::Object(properties) = properties {
                properties.insert(key.to_string(), json!({ "type": kind.tag() }));
            }
        }
        cache.set(&self.path, schema);
        store.set(
            &field_path,
            kind.default_value(),
            SetOptions {
                mark_dirty: true,
                ..SetOptions::default()
            },
        )?;
        Ok(())
    }
}

fn enter_text_mode(state: &mut session::EditorState, format: TextFormat, value: Option<Value>) {
    let value = value.unwrap_or(Value::Null);
    state.text = serialize(format, &value);
    state.baseline = Some(state.text.clone());
    state.parse_error = None;
    state.mode = match format {
        TextFormat::Json => EditMode::Json,
        TextFormat::Yaml => EditMode::Yaml,
    };
}

/// Reads the category from a canonical block name's suffix, defaulting to
/// actions for names that do not follow the convention.
fn category_of(name: &str) -> BlockCategory {
    BlockCategory::ALL
        .into_iter()
        .find(|c| name.ends_with(c.suffix()) && name.len() > c.suffix().len())
        .unwrap_or(BlockCategory::Action)
}
