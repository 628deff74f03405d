use crate::path::Path;
use serde_json::Value;
use tokio::sync::watch;

pub(super) struct Subscriber {
    pub(super) path: Path,
    pub(super) sender: watch::Sender<Option<Value>>,
}

/// A live view of one path in a [`FieldValueStore`](super::FieldValueStore).
///
/// The view refreshes whenever a write touches the watched path, one of its
/// ancestors or one of its descendants.
pub struct FieldWatch {
    path: Path,
    receiver: watch::Receiver<Option<Value>>,
}

impl FieldWatch {
    pub(super) fn new(path: Path, receiver: watch::Receiver<Option<Value>>) -> Self {
        Self { path, receiver }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The latest value; `None` when the path does not exist.
    pub fn current(&self) -> Option<Value> {
        self.receiver.borrow().clone()
    }

    /// True when a write has happened since the last `current_and_mark`/`changed`.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Returns the latest value and marks it as seen.
    pub fn current_and_mark(&mut self) -> Option<Value> {
        self.receiver.borrow_and_update().clone()
    }

    /// Waits for the next related write. Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}
