//! Session-scoped schema cache keyed by document path.
//!
//! Entries are keyed by logical path rather than by the editor that asked for
//! them, so navigating back to a path can reuse the schema it had. Removing a
//! block evicts its entries; a loader that finishes after its path was evicted
//! has its result dropped.

use crate::error::FetchError;
use crate::path::{Path, Segment};
use ahash::AHashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::debug;

type LoadOutcome = Result<Option<Value>, FetchError>;

/// Whether `get` may answer from an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Return the cached schema when one exists.
    #[default]
    Reuse,
    /// Run the loader on every `get`; entries are still written for `peek`.
    AlwaysRefetch,
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reuse" => Ok(CachePolicy::Reuse),
            "refetch" | "always-refetch" => Ok(CachePolicy::AlwaysRefetch),
            other => Err(format!("unknown cache policy '{}'", other)),
        }
    }
}

struct InFlight {
    generation: u64,
    outcome: watch::Receiver<Option<LoadOutcome>>,
}

#[derive(Default)]
struct CacheInner {
    entries: AHashMap<String, Value>,
    in_flight: AHashMap<String, InFlight>,
    generations: AHashMap<String, u64>,
}

impl CacheInner {
    fn next_generation(&mut self, key: &str) -> u64 {
        let generation = self.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }
}

enum Plan {
    Hit(Value),
    Wait(watch::Receiver<Option<LoadOutcome>>),
    Load(u64, watch::Sender<Option<LoadOutcome>>),
}

/// Clears the loading flag when a load future is dropped before finishing.
struct LoadGuard<'a> {
    cache: &'a SchemaCache,
    key: &'a str,
    generation: u64,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.release(self.key, self.generation);
        }
    }
}

/// Schemas of one editing session, keyed by the path of the module they
/// describe, with per-path loading state.
pub struct SchemaCache {
    policy: CachePolicy,
    inner: Mutex<CacheInner>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl SchemaCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Whether stored entries are reused or every `get` reloads.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Returns the schema for `path`, running `loader` when needed.
    ///
    /// Only the call that starts a load runs its loader; concurrent callers
    /// for the same path wait for that outcome. A `None` result is returned
    /// to the caller but never stored.
    pub async fn get<F, Fut>(&self, path: &Path, loader: F) -> Result<Option<Value>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Value>, FetchError>>,
    {
        let key = path.key();
        let plan = {
            let mut inner = self.inner.lock();
            if let (CachePolicy::Reuse, Some(hit)) = (self.policy, inner.entries.get(&key)) {
                Plan::Hit(hit.clone())
            } else if let Some(in_flight) = inner.in_flight.get(&key) {
                Plan::Wait(in_flight.outcome.clone())
            } else {
                let generation = inner.next_generation(&key);
                let (tx, rx) = watch::channel(None);
                inner.in_flight.insert(
                    key.clone(),
                    InFlight {
                        generation,
                        outcome: rx,
                    },
                );
                Plan::Load(generation, tx)
            }
        };

        match plan {
            Plan::Hit(schema) => {
                debug!(path = %key, "schema cache hit");
                Ok(Some(schema))
            }
            Plan::Wait(mut outcome) => {
                debug!(path = %key, "joining in-flight schema load");
                match outcome.wait_for(Option::is_some).await {
                    Ok(done) => done.clone().unwrap_or(Ok(None)),
                    Err(_) => Err(FetchError::Abandoned(key)),
                }
            }
            Plan::Load(generation, tx) => {
                debug!(path = %key, generation, "loading schema");
                let mut guard = LoadGuard {
                    cache: self,
                    key: &key,
                    generation,
                    armed: true,
                };
                let outcome = loader().await;
                guard.armed = false;
                self.commit(&key, generation, &outcome);
                tx.send_replace(Some(outcome.clone()));
                outcome
            }
        }
    }

    fn release(&self, key: &str, generation: u64) {
        let mut inner = self.inner.lock();
        if inner
            .in_flight
            .get(key)
            .is_some_and(|f| f.generation == generation)
        {
            inner.in_flight.remove(key);
        }
    }

    fn commit(&self, key: &str, generation: u64, outcome: &LoadOutcome) {
        let mut inner = self.inner.lock();
        let current = inner
            .in_flight
            .get(key)
            .is_some_and(|f| f.generation == generation);
        if !current {
            debug!(path = %key, generation, "discarding schema load for evicted path");
            return;
        }
        inner.in_flight.remove(key);
        if let Ok(Some(schema)) = outcome {
            inner.entries.insert(key.to_string(), schema.clone());
        }
    }

    /// Reads the current entry without loading.
    pub fn peek(&self, path: &Path) -> Option<Value> {
        self.inner.lock().entries.get(&path.key()).cloned()
    }

    /// True when an entry is stored for exactly `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().entries.contains_key(&path.key())
    }

    /// Overwrites the entry for `path`.
    pub fn set(&self, path: &Path, schema: Value) {
        let key = path.key();
        debug!(path = %key, "schema cache set");
        self.inner.lock().entries.insert(key, schema);
    }

    /// Inserts `schema` only when `path` has no entry yet.
    pub fn seed(&self, path: &Path, schema: Value) {
        self.inner.lock().entries.entry(path.key()).or_insert(schema);
    }

    /// Removes the entry for `path` and every entry below it.
    ///
    /// Any load in flight for those paths is orphaned: its eventual result is
    /// not committed.
    pub fn evict(&self, path: &Path) {
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .entries
            .keys()
            .chain(inner.in_flight.keys())
            .filter(|k| Path::parse(k).starts_with(path))
            .cloned()
            .collect();
        for key in doomed {
            inner.entries.remove(&key);
            if inner.in_flight.remove(&key).is_some() {
                inner.next_generation(&key);
            }
        }
        debug!(path = %path, "schema cache evict");
    }

    /// Evicts the elements of the sequence at `array` from `index` onwards.
    ///
    /// Used after a removal, when later elements shift down and their old
    /// entries no longer describe the value at that index.
    pub fn evict_from_index(&self, array: &Path, index: usize) {
        let keys: Vec<String> = {
            let inner = self.inner.lock();
            inner
                .entries
                .keys()
                .chain(inner.in_flight.keys())
                .cloned()
                .collect()
        };
        let depth = array.len();
        for key in keys {
            let path = Path::parse(&key);
            if !path.starts_with(array) {
                continue;
            }
            if let Some(Segment::Index(i)) = path.segments().get(depth) {
                if *i >= index {
                    self.evict(&array.index(*i));
                }
            }
        }
    }

    /// True while a load for `path` is in flight.
    pub fn is_loading(&self, path: &Path) -> bool {
        self.inner.lock().in_flight.contains_key(&path.key())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
