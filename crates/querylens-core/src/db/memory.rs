//! In-memory key-value store

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{KeyValueStore, UpdateFn};
use crate::error::Result;

/// Key-value store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no keys are stored
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<()> {
        let mut entries = self.entries.lock();
        match f(entries.get(key).cloned())? {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}
