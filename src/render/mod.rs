//! Field renderer: picks the editor widget for a schema fragment.
//!
//! Rendering is a pure function of (schema, root schema, path) plus whatever
//! the value store and schema cache currently hold. Nested objects and block
//! instances are handed to a [`ModuleHost`], which renders them as module
//! editors and calls back into the renderer for their fields.

use crate::export::to_json;
use crate::path::Path;
use crate::schema::{
    AdditionalProperties, ArraySchema, BlockCategory, ObjectSchema, PrimitiveKind, PrimitiveSchema,
    SchemaNode, SchemaResolver, infer_schema, merge,
};
use serde_json::{Map, Value, json};
use tracing::warn;

mod outline;
mod widget;

pub use outline::WidgetOutline;
pub use widget::*;

/// Default bound on nested rendering before a field degrades to raw JSON.
pub const DEFAULT_MAX_RENDER_DEPTH: usize = 32;

/// Where a nested module gets its schema from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleSource {
    /// A schema known at render time (plain nested objects).
    Inline(Value),
    /// A block instance whose schema is fetched by block name.
    Block(BlockCategory),
}

#[derive(Debug, Clone)]
pub struct ModuleRequest {
    pub key: Option<String>,
    pub path: Path,
    pub source: ModuleSource,
    pub role: ModuleRole,
    pub removable: bool,
    pub depth: usize,
}

/// The seam through which the renderer reaches module editors and values.
pub trait ModuleHost {
    /// The current value at `path`.
    fn value(&self, path: &Path) -> Option<Value>;

    /// Renders a nested module editor.
    fn render_module(&self, renderer: &FieldRenderer, request: ModuleRequest) -> Widget;
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRenderer {
    resolver: SchemaResolver,
    max_depth: usize,
}

impl Default for FieldRenderer {
    fn default() -> Self {
        Self::new(SchemaResolver::default(), DEFAULT_MAX_RENDER_DEPTH)
    }
}

impl FieldRenderer {
    pub fn new(resolver: SchemaResolver, max_depth: usize) -> Self {
        Self {
            resolver,
            max_depth,
        }
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Chooses and builds the widget for the field `key` at `path`.
    pub fn render(
        &self,
        key: &str,
        schema: &Value,
        root: &Value,
        path: &Path,
        host: &dyn ModuleHost,
    ) -> Widget {
        self.render_at(key, schema, root, path, host, 0)
    }

    pub fn render_at(
        &self,
        key: &str,
        schema: &Value,
        root: &Value,
        path: &Path,
        host: &dyn ModuleHost,
        depth: usize,
    ) -> Widget {
        let value = host.value(path);
        if depth > self.max_depth {
            return Widget::RawJson {
                path: path.clone(),
                text: to_json(value.as_ref().unwrap_or(&Value::Null)),
            };
        }

        let resolved = match self.resolver.resolve(schema, root) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(field = key, path = %path, error = %e, "schema resolution failed");
                return Widget::Text {
                    path: path.clone(),
                    value: text_value(value.as_ref()),
                    diagnostic: Some(e.to_string()),
                };
            }
        };

        match SchemaNode::classify(resolved.as_ref()) {
            SchemaNode::Array(array) => self.render_array(key, &array, root, path, host, depth),
            SchemaNode::BlockRef(block) => {
                let present = value.as_ref().is_some_and(|v| !v.is_null());
                let (instance, add) = if present {
                    let module = host.render_module(
                        self,
                        ModuleRequest {
                            key: Some(key.to_string()),
                            path: path.clone(),
                            source: ModuleSource::Block(block.category),
                            role: ModuleRole::Block {
                                category: block.category,
                                name: None,
                            },
                            removable: true,
                            depth: depth + 1,
                        },
                    );
                    (Some(Box::new(module)), None)
                } else {
                    let add = AddAffordance::block(block.category, path.clone(), false);
                    (None, Some(add))
                };
                Widget::BlockSlot {
                    path: path.clone(),
                    category: block.category,
                    instance,
                    add,
                }
            }
            SchemaNode::Object(object) => {
                let schema = if object.properties.is_empty() {
                    self.free_form_schema(&object, root)
                } else {
                    merge(root, resolved.as_ref().unwrap_or(&Value::Null))
                };
                host.render_module(
                    self,
                    ModuleRequest {
                        key: Some(key.to_string()),
                        path: path.clone(),
                        source: ModuleSource::Inline(schema),
                        role: ModuleRole::Object,
                        removable: false,
                        depth: depth + 1,
                    },
                )
            }
            SchemaNode::Primitive(primitive) => primitive_widget(&primitive, path, value.as_ref()),
            SchemaNode::Unresolved => Widget::Text {
                path: path.clone(),
                value: text_value(value.as_ref()),
                diagnostic: None,
            },
        }
    }

    fn render_array(
        &self,
        key: &str,
        array: &ArraySchema,
        root: &Value,
        path: &Path,
        host: &dyn ModuleHost,
        depth: usize,
    ) -> Widget {
        let current = host.value(path);
        let count = current.as_ref().and_then(Value::as_array).map_or(0, Vec::len);
        let items = array.items.clone().unwrap_or(Value::Null);
        let resolved_items = match self.resolver.resolve(&items, root) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(field = key, path = %path, error = %e, "item schema resolution failed");
                None
            }
        };

        match SchemaNode::classify(resolved_items.as_ref()) {
            SchemaNode::BlockRef(block) => Widget::BlockList {
                path: path.clone(),
                category: block.category,
                items: (0..count)
                    .map(|i| {
                        host.render_module(
                            self,
                            ModuleRequest {
                                key: Some(format!("{}[{}]", key, i)),
                                path: path.index(i),
                                source: ModuleSource::Block(block.category),
                                role: ModuleRole::Block {
                                    category: block.category,
                                    name: None,
                                },
                                removable: true,
                                depth: depth + 1,
                            },
                        )
                    })
                    .collect(),
                add: AddAffordance::block(block.category, path.clone(), true),
            },
            SchemaNode::Primitive(primitive) => Widget::PrimitiveList {
                path: path.clone(),
                kind: primitive.kind,
                items: (0..count)
                    .map(|i| {
                        let item_path = path.index(i);
                        let item = host.value(&item_path);
                        primitive_widget(&primitive, &item_path, item.as_ref())
                    })
                    .collect(),
                add: AddAffordance::item(path.clone(), primitive.kind.default_value()),
            },
            SchemaNode::Object(object) => {
                let (schema, template) = if object.properties.is_empty() {
                    (self.free_form_schema(&object, root), Map::new())
                } else {
                    let template = object
                        .properties
                        .keys()
                        .map(|k| (k.clone(), Value::Null))
                        .collect();
                    let schema = merge(root, resolved_items.as_ref().unwrap_or(&Value::Null));
                    (schema, template)
                };
                Widget::ObjectList {
                    path: path.clone(),
                    items: (0..count)
                        .map(|i| {
                            host.render_module(
                                self,
                                ModuleRequest {
                                    key: Some(format!("{}[{}]", key, i)),
                                    path: path.index(i),
                                    source: ModuleSource::Inline(schema.clone()),
                                    role: ModuleRole::ListItem,
                                    removable: true,
                                    depth: depth + 1,
                                },
                            )
                        })
                        .collect(),
                    add: AddAffordance::item(path.clone(), Value::Object(template)),
                }
            }
            SchemaNode::Array(_) | SchemaNode::Unresolved => Widget::RawJson {
                path: path.clone(),
                text: to_json(current.as_ref().unwrap_or(&json!([]))),
            },
        }
    }

    /// The module schema of an object without declared properties.
    ///
    /// A typed `additionalProperties` is resolved against `root`, and the
    /// root's definitions travel along so references inside it still resolve
    /// once the module schema becomes the lookup root.
    fn free_form_schema(&self, object: &ObjectSchema, root: &Value) -> Value {
        let additional = match &object.additional {
            AdditionalProperties::Typed(typed) => match self.resolver.resolve(typed, root) {
                Ok(Some(resolved)) => resolved,
                _ => typed.clone(),
            },
            _ => json!({}),
        };
        let mut schema = Map::new();
        for key in ["definitions", "$defs"] {
            if let Some(definitions) = root.get(key) {
                schema.insert(key.to_string(), definitions.clone());
            }
        }
        schema.insert("additionalProperties".to_string(), additional);
        Value::Object(schema)
    }

    /// Renders the fields of a module whose own schema is `schema`.
    ///
    /// The module schema doubles as the root for `$ref` lookups. Keys listed in
    /// `hidden` are never shown as fields.
    pub fn render_fields(
        &self,
        schema: &Value,
        path: &Path,
        hidden: &[&str],
        host: &dyn ModuleHost,
        depth: usize,
    ) -> ModuleBody {
        let resolved = self.resolver.resolve(schema, schema).ok().flatten();
        let object = match SchemaNode::classify(resolved.as_ref()) {
            SchemaNode::Object(object) => object,
            _ => {
                // A module over a non-object schema edits the value itself.
                let widget = self.render_at("value", schema, schema, path, host, depth);
                return ModuleBody::Fields {
                    fields: vec![FieldView {
                        key: "value".to_string(),
                        widget,
                    }],
                    adder: None,
                };
            }
        };

        let mut fields: Vec<FieldView> = object
            .properties
            .iter()
            .filter(|(key, _)| !hidden.contains(&key.as_str()))
            .map(|(key, property)| FieldView {
                key: key.clone(),
                widget: self.render_at(key, property, schema, &path.child(key), host, depth),
            })
            .collect();

        let adder = match &object.additional {
            AdditionalProperties::Forbidden => None,
            additional => {
                if let Some(Value::Object(current)) = host.value(path) {
                    for (key, value) in current {
                        if object.properties.contains_key(&key) || hidden.contains(&key.as_str()) {
                            continue;
                        }
                        let property = match additional {
                            AdditionalProperties::Typed(typed) => typed.clone(),
                            _ => infer_schema(&value),
                        };
                        let widget =
                            self.render_at(&key, &property, schema, &path.child(&key), host, depth);
                        fields.push(FieldView { key, widget });
                    }
                }
                Some(PropertyAdder { path: path.clone() })
            }
        };

        ModuleBody::Fields { fields, adder }
    }
}

fn primitive_widget(primitive: &PrimitiveSchema, path: &Path, value: Option<&Value>) -> Widget {
    match primitive.kind {
        PrimitiveKind::Boolean => Widget::Checkbox {
            path: path.clone(),
            checked: value.and_then(Value::as_bool).unwrap_or(false),
        },
        PrimitiveKind::Number | PrimitiveKind::Integer => Widget::Number {
            path: path.clone(),
            value: value.and_then(Value::as_f64),
            integer: primitive.kind == PrimitiveKind::Integer,
        },
        PrimitiveKind::String => match &primitive.enum_values {
            Some(options) => Widget::Select {
                path: path.clone(),
                options: options.clone(),
                selected: value.and_then(Value::as_str).map(str::to_string),
            },
            None => Widget::Text {
                path: path.clone(),
                value: text_value(value),
                diagnostic: None,
            },
        },
    }
}

fn text_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
