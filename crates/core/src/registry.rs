//! A concurrent, snapshot-swapping registry keyed by name.
//!
//! Used for providers and action handlers that are registered once at
//! startup and read on every call. Readers take a cheap `Arc` snapshot;
//! writers build a complete new map and swap it in, so a lookup sees
//! either the old state or the new one, never a half-applied batch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Snapshot<T> = Arc<HashMap<String, Arc<T>>>;

pub struct Registry<T: ?Sized> {
    entries: RwLock<Snapshot<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    fn snapshot(&self) -> Snapshot<T> {
        let guard = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    fn swap(&self, apply: impl FnOnce(&mut HashMap<String, Arc<T>>)) {
        let mut guard = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next: HashMap<String, Arc<T>> = (**guard).clone();
        apply(&mut next);
        *guard = Arc::new(next);
    }

    /// Register an entry. Replaces any existing entry with the same name.
    pub fn register(&self, name: impl Into<String>, entry: Arc<T>) {
        let name = name.into();
        tracing::debug!(name = %name, "Registering entry");
        self.swap(|map| {
            map.insert(name, entry);
        });
    }

    /// Register several entries as one atomic update.
    pub fn register_all(&self, entries: impl IntoIterator<Item = (String, Arc<T>)>) {
        let entries: Vec<_> = entries.into_iter().collect();
        self.swap(|map| map.extend(entries));
    }

    /// Remove an entry, returning whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut removed = false;
        self.swap(|map| removed = map.remove(name).is_some());
        removed
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.snapshot().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
