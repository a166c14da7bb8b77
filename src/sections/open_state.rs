//! Which sections are expanded in the editor.
//!
//! Stored only in session-scoped storage under `<scope>-open` as a JSON
//! object of section id to bool. Never written to the section store and
//! never merged into section records.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Session-scoped key/value storage.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

pub fn storage_key(scope: &str) -> String {
    format!("{scope}-open")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenSections {
    scope: String,
    open: BTreeMap<String, bool>,
}

impl OpenSections {
    /// Read the state for `scope`. Missing or malformed data yields an empty map.
    pub fn load(storage: &dyn SessionStorage, scope: &str) -> Self {
        let key = storage_key(scope);
        let open = match storage.get(&key) {
            Some(raw) => match serde_json::from_str::<BTreeMap<String, bool>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        error = %e,
                        "discarding malformed open-section state"
                    );
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };
        Self {
            scope: scope.to_string(),
            open,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_open(&self, section_id: &str) -> bool {
        self.open.get(section_id).copied().unwrap_or(false)
    }

    pub fn set_open(&mut self, section_id: &str, open: bool) {
        self.open.insert(section_id.to_string(), open);
    }

    /// Flip a section and return its new state.
    pub fn toggle(&mut self, section_id: &str) -> bool {
        let next = !self.is_open(section_id);
        self.set_open(section_id, next);
        next
    }

    /// Replace the whole map, e.g. from a client-side payload.
    pub fn replace(&mut self, open: BTreeMap<String, bool>) {
        self.open = open;
    }

    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.open
    }

    pub fn save(&self, storage: &dyn SessionStorage) {
        match serde_json::to_string(&self.open) {
            Ok(raw) => storage.set(&storage_key(&self.scope), raw),
            Err(e) => tracing::warn!(
                scope = %self.scope,
                error = %e,
                "failed to encode open-section state"
            ),
        }
    }
}
