//! The field value store: the single in-memory copy of the edited document.

use crate::error::StoreError;
use crate::path::{Path, Segment};
use ahash::AHashSet;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::watch as channel;

mod watch;

pub use watch::FieldWatch;
use watch::Subscriber;

/// Most `null` padding one write may add past the end of a sequence.
pub const MAX_PADDING: usize = 1024;

/// Bookkeeping flags attached to a write. None of them gate the write itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub validate: bool,
    pub mark_dirty: bool,
    pub mark_touched: bool,
}

impl SetOptions {
    /// A write coming from user interaction: dirty, touched, validation requested.
    pub fn interactive() -> Self {
        Self {
            validate: true,
            mark_dirty: true,
            mark_touched: true,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    document: Value,
    dirty: AHashSet<String>,
    touched: AHashSet<String>,
    validation_requested: AHashSet<String>,
    subscribers: Vec<Subscriber>,
}

impl StoreInner {
    fn record(&mut self, path: &Path, options: SetOptions) {
        let key = path.key();
        if options.mark_dirty {
            self.dirty.insert(key.clone());
        }
        if options.mark_touched {
            self.touched.insert(key.clone());
        }
        if options.validate {
            self.validation_requested.insert(key);
        }
    }

    fn notify(&mut self, path: &Path) {
        self.subscribers.retain(|s| !s.sender.is_closed());
        for subscriber in &self.subscribers {
            if subscriber.path.is_related(path) {
                let value = lookup(&self.document, &subscriber.path).cloned();
                subscriber.sender.send_replace(value);
            }
        }
    }
}

/// A tree of values addressed by [`Path`], shared by every editor of a session.
///
/// Writes are synchronous and applied in the order they are issued.
pub struct FieldValueStore {
    inner: RwLock<StoreInner>,
}

impl Default for FieldValueStore {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl FieldValueStore {
    pub fn new(document: Value) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                document,
                ..StoreInner::default()
            }),
        }
    }

    /// The value at `path`; `None` when it or one of its ancestors is missing.
    pub fn get(&self, path: &Path) -> Option<Value> {
        lookup(&self.inner.read().document, path).cloned()
    }

    /// A copy of the whole document.
    pub fn snapshot(&self) -> Value {
        self.inner.read().document.clone()
    }

    /// Writes `value` at `path`, creating intermediate containers as needed.
    ///
    /// Sequences are padded with `null` up to an index segment, by at most
    /// [`MAX_PADDING`] elements; a path reaching further is rejected and the
    /// document is left untouched.
    pub fn set(&self, path: &Path, value: Value, options: SetOptions) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        check_padding(&inner.document, path)?;
        *ensure_slot(&mut inner.document, path) = value;
        inner.record(path, options);
        inner.notify(path);
        Ok(())
    }

    /// Appends `item` to the sequence at `path` and returns its index.
    pub fn append(&self, path: &Path, item: Value) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        check_padding(&inner.document, path)?;
        let slot = ensure_slot(&mut inner.document, path);
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        let Value::Array(items) = slot else {
            return Err(StoreError::NotASequence(path.key()));
        };
        items.push(item);
        let index = items.len() - 1;
        inner.record(path, SetOptions::interactive());
        inner.notify(path);
        Ok(index)
    }

    /// Removes and returns the element at `index` of the sequence at `path`.
    pub fn remove(&self, path: &Path, index: usize) -> Result<Value, StoreError> {
        let mut inner = self.inner.write();
        let items = match lookup_mut(&mut inner.document, path) {
            Some(Value::Array(items)) => items,
            _ => return Err(StoreError::NotASequence(path.key())),
        };
        if index >= items.len() {
            return Err(StoreError::IndexOutOfBounds {
                path: path.key(),
                index,
                len: items.len(),
            });
        }
        let removed = items.remove(index);
        inner.record(path, SetOptions::interactive());
        inner.notify(path);
        Ok(removed)
    }

    /// Moves the element at `from` of the sequence at `path` to position
    /// `to`, shifting the elements in between.
    pub fn move_item(&self, path: &Path, from: usize, to: usize) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let items = match lookup_mut(&mut inner.document, path) {
            Some(Value::Array(items)) => items,
            _ => return Err(StoreError::NotASequence(path.key())),
        };
        let len = items.len();
        if let Some(index) = [from, to].into_iter().find(|i| *i >= len) {
            return Err(StoreError::IndexOutOfBounds {
                path: path.key(),
                index,
                len,
            });
        }
        let item = items.remove(from);
        items.insert(to, item);
        inner.record(path, SetOptions::interactive());
        inner.notify(path);
        Ok(())
    }

    /// Clears `path` back to undefined. Sequence slots become `null`, since a
    /// sequence cannot hold a hole.
    pub fn reset_field(&self, path: &Path) {
        let mut inner = self.inner.write();
        match (path.parent(), path.last()) {
            (Some(parent), Some(last)) => match (lookup_mut(&mut inner.document, &parent), last) {
                (Some(Value::Object(map)), Segment::Key(key)) => {
                    map.shift_remove(key);
                }
                (Some(Value::Array(items)), Segment::Index(index)) => {
                    if let Some(slot) = items.get_mut(*index) {
                        *slot = Value::Null;
                    }
                }
                _ => return,
            },
            _ => inner.document = Value::Object(Map::new()),
        }
        let key = path.key();
        inner.dirty.retain(|k| !Path::parse(k).starts_with(path));
        inner.touched.remove(&key);
        inner.validation_requested.remove(&key);
        inner.notify(path);
    }

    /// Subscribes to the value at `path`.
    pub fn watch(&self, path: &Path) -> FieldWatch {
        let mut inner = self.inner.write();
        let (sender, receiver) = channel::channel(lookup(&inner.document, path).cloned());
        inner.subscribers.push(Subscriber {
            path: path.clone(),
            sender,
        });
        FieldWatch::new(path.clone(), receiver)
    }

    pub fn is_dirty(&self, path: &Path) -> bool {
        self.inner.read().dirty.contains(&path.key())
    }

    pub fn is_touched(&self, path: &Path) -> bool {
        self.inner.read().touched.contains(&path.key())
    }

    pub fn validation_requested(&self, path: &Path) -> bool {
        self.inner.read().validation_requested.contains(&path.key())
    }
}

fn lookup<'a>(mut node: &'a Value, path: &Path) -> Option<&'a Value> {
    for segment in path.segments() {
        node = match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => map.get(key)?,
            (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

fn lookup_mut<'a>(mut node: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    for segment in path.segments() {
        node = match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (Segment::Index(index), Value::Array(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Rejects paths whose index segments lie more than [`MAX_PADDING`] past
/// the end of the sequence they address.
fn check_padding(document: &Value, path: &Path) -> Result<(), StoreError> {
    let mut node = Some(document);
    for segment in path.segments() {
        node = match segment {
            Segment::Key(key) => node.and_then(|n| n.get(key.as_str())),
            Segment::Index(index) => {
                let len = node.and_then(Value::as_array).map_or(0, Vec::len);
                if index.saturating_sub(len) > MAX_PADDING {
                    return Err(StoreError::IndexTooFar {
                        path: path.key(),
                        index: *index,
                        len,
                    });
                }
                node.and_then(|n| n.get(*index))
            }
        };
    }
    Ok(())
}

/// Walks to `path`, turning missing or scalar ancestors into containers.
fn ensure_slot<'a>(mut node: &'a mut Value, path: &Path) -> &'a mut Value {
    for segment in path.segments() {
        node = match segment {
            Segment::Key(key) => {
                if !node.is_object() {
                    *node = Value::Object(Map::new());
                }
                match node {
                    Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                    _ => unreachable!("slot was just replaced by an object"),
                }
            }
            Segment::Index(index) => {
                if !node.is_array() {
                    *node = Value::Array(Vec::new());
                }
                match node {
                    Value::Array(items) => {
                        if items.len() <= *index {
                            items.resize(*index + 1, Value::Null);
                        }
                        &mut items[*index]
                    }
                    _ => unreachable!("slot was just replaced by an array"),
                }
            }
        };
    }
    node
}
