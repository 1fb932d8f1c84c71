//! Per-artifact key/value knowledge
//!
//! Last write wins. Nothing expires and nothing is persisted.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// In-memory knowledge owned by a single artifact
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    entries: DashMap<String, Value>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, replacing any previous value
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Current value under `name`
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.get(name).map(|v| v.value().clone())
    }

    /// Current value under `name`, deserialized
    ///
    /// `None` when absent or when the stored value has another shape.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.get(name)?;
        serde_json::from_value(value).ok()
    }

    /// Remove and return the value under `name`
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.entries.remove(name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
