//! Storage layer for QueryLens
//!
//! Everything persisted goes through the [`KeyValueStore`] trait: one key per
//! bounded list, each value a JSON array. Two backends ship with the crate,
//! an in-memory map and a directory of JSON files.

mod file;
mod memory;
mod metrics;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use metrics::{estimate_complexity, MetricStore};

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::Result;

/// Read-modify-write callback: receives the current value, returns the new one
/// (`None` removes the key).
pub type UpdateFn<'a> = dyn FnMut(Option<String>) -> Result<Option<String>> + 'a;

/// Ordered key-value storage with atomic read-modify-write
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value (no-op if absent)
    fn remove(&self, key: &str) -> Result<()>;

    /// Apply `f` to the current value without interleaving other writers
    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<()>;
}

/// Decode a persisted JSON list, treating missing or corrupt data as empty
pub fn decode_list<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    match serde_json::from_str(raw) {
        Ok(items) => items,
        Err(e) => {
            warn!(key, error = %e, "Discarding unparsable persisted data");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_list_missing_is_empty() {
        let items: Vec<u32> = decode_list("k", None);
        assert!(items.is_empty());
    }

    #[test]
    fn test_decode_list_corrupt_is_empty() {
        let items: Vec<u32> = decode_list("k", Some("{not json"));
        assert!(items.is_empty());
    }

    #[test]
    fn test_decode_list_valid() {
        let items: Vec<u32> = decode_list("k", Some("[3, 1, 2]"));
        assert_eq!(items, vec![3, 1, 2]);
    }
}
