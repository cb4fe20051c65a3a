//! Bounded history of quality suite runs

use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::{decode_list, KeyValueStore};
use crate::error::Result;
use crate::models::TestSuiteResult;

/// Newest-first, capped list of suite results
#[derive(Clone)]
pub struct SuiteStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    capacity: usize,
}

impl SuiteStore {
    /// Create a store keeping at most `capacity` suites under `key`
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            kv,
            key: key.into(),
            capacity,
        }
    }

    /// Prepend a suite result, evicting the oldest beyond the cap
    pub fn save(&self, result: &TestSuiteResult) -> Result<()> {
        let key = self.key.clone();
        let capacity = self.capacity;

        self.kv.update(&self.key, &mut |current| {
            let mut history: Vec<TestSuiteResult> = decode_list(&key, current.as_deref());
            history.insert(0, result.clone());
            history.truncate(capacity);
            Ok(Some(serde_json::to_string(&history)?))
        })?;

        debug!(suite = %result.suite_name, "Saved suite result");
        Ok(())
    }

    /// All retained suites, newest first. Storage failures read as empty.
    pub fn list(&self) -> Vec<TestSuiteResult> {
        match self.kv.get(&self.key) {
            Ok(raw) => decode_list(&self.key, raw.as_deref()),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read suite results");
                Vec::new()
            }
        }
    }

    /// Most recent suite, if any
    pub fn latest(&self) -> Option<TestSuiteResult> {
        self.list().into_iter().next()
    }

    /// Drop all history
    pub fn clear(&self) -> Result<()> {
        self.kv.remove(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn suite(n: i64) -> TestSuiteResult {
        let timestamp = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap() + Duration::hours(n);
        TestSuiteResult::from_results(format!("run {n}"), Vec::new(), timestamp)
    }

    #[test]
    fn test_capacity_keeps_most_recent() {
        let store = SuiteStore::new(Arc::new(MemoryStore::new()), "results", 10);
        for n in 0..11 {
            store.save(&suite(n)).unwrap();
        }

        let history = store.list();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].suite_name, "run 10");
        assert_eq!(history[9].suite_name, "run 1");
        assert!(history.iter().all(|s| s.suite_name != "run 0"));
    }

    #[test]
    fn test_latest_and_clear() {
        let store = SuiteStore::new(Arc::new(MemoryStore::new()), "results", 10);
        assert!(store.latest().is_none());

        store.save(&suite(1)).unwrap();
        store.save(&suite(2)).unwrap();
        assert_eq!(store.latest().unwrap().suite_name, "run 2");

        store.clear().unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_corrupt_history_is_replaced() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("results", "[{\"broken\":").unwrap();

        let store = SuiteStore::new(kv, "results", 10);
        assert!(store.list().is_empty());

        store.save(&suite(1)).unwrap();
        assert_eq!(store.list().len(), 1);
    }
}
