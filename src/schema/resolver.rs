use crate::error::SchemaError;
use serde_json::Value;

/// Default bound on chained `$ref` hops before a reference is treated as cyclic.
pub const DEFAULT_MAX_REF_DEPTH: usize = 32;

/// Resolves local `$ref` pointers (`#/definitions/foo`) against a root schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver {
    max_depth: usize,
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REF_DEPTH)
    }
}

impl SchemaResolver {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Returns the fragment a schema stands for.
    ///
    /// A schema without `$ref` comes back unchanged. A pointer that leads
    /// nowhere yields `Ok(None)`; callers fall back to a plain string field.
    /// Chains of references are followed until a concrete fragment is found
    /// or `max_depth` hops have been taken.
    pub fn resolve(&self, schema: &Value, root: &Value) -> Result<Option<Value>, SchemaError> {
        let mut current = schema;
        for _ in 0..=self.max_depth {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return Ok(Some(current.clone()));
            };
            match lookup(reference, root)? {
                Some(target) => current = target,
                None => return Ok(None),
            }
        }
        let reference = current
            .get("$ref")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Err(SchemaError::RefCycle {
            reference,
            max_depth: self.max_depth,
        })
    }
}

fn lookup<'a>(reference: &str, root: &'a Value) -> Result<Option<&'a Value>, SchemaError> {
    let pointer = reference
        .strip_prefix("#/")
        .or_else(|| reference.strip_prefix('#'))
        .ok_or_else(|| SchemaError::UnsupportedRef(reference.to_string()))?;

    if pointer.is_empty() {
        return Ok(Some(root));
    }

    let mut node = root;
    for raw in pointer.split('/') {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        let next = match node {
            Value::Object(map) => map.get(&segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => node = value,
            None => return Ok(None),
        }
    }
    Ok(Some(node))
}

/// Shallow merge of two object schemas; keys of `overlay` win.
///
/// Nested objects are rendered against `merge(root, resolved)` so that they
/// keep access to the root's reference targets.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    let mut merged = base.as_object().cloned().unwrap_or_default();
    if let Some(overlay) = overlay.as_object() {
        for (key, value) in overlay {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}
