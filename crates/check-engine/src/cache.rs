//! Result cache keyed by process identity
//!
//! Each entry records the generation it was stored at, taken from a
//! counter that only ever increases, so callers can tell which of two
//! results is newer. A missing entry means "not run yet"; a null result
//! means "ran and crashed". The two are never conflated.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};
use crate::result::CheckResult;
use crate::storage::{BlobStore, Payload};
use crate::types::{Mode, ProcessId};

/// A stored result with the generation and mode it was produced at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub generation: u64,
    pub mode: Mode,
    pub result: Arc<CheckResult>,
}

/// Last computed result per process
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<ProcessId, CachedResult>,
    generation: u64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for a process
    pub fn get(&self, process_id: &str) -> Option<Arc<CheckResult>> {
        self.entries.get(process_id).map(|e| e.result.clone())
    }

    /// Cached entry including its generation
    pub fn entry(&self, process_id: &str) -> Option<&CachedResult> {
        self.entries.get(process_id)
    }

    /// Store a result, replacing any previous one
    pub fn put(
        &mut self,
        process_id: impl Into<ProcessId>,
        mode: Mode,
        result: CheckResult,
    ) -> Arc<CheckResult> {
        self.generation += 1;
        let result = Arc::new(result);
        self.entries.insert(
            process_id.into(),
            CachedResult {
                generation: self.generation,
                mode,
                result: result.clone(),
            },
        );
        result
    }

    pub fn contains(&self, process_id: &str) -> bool {
        self.entries.contains_key(process_id)
    }

    /// Drop one entry; returns whether it existed
    pub fn clear(&mut self, process_id: &str) -> bool {
        self.entries.remove(process_id).is_some()
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached_results: self.entries.len(),
            generation: self.generation,
        }
    }

    /// Serialize all entries into one payload keyed by process id
    pub fn snapshot(&self) -> Result<Payload> {
        let mut payload = Payload::new();
        for (id, entry) in &self.entries {
            payload.insert(id.clone(), serde_json::to_value(entry)?);
        }
        Ok(payload)
    }

    /// Replace all entries with a snapshot
    ///
    /// The generation counter moves past every restored entry. A null result
    /// with item lists is rejected and the cache is left unchanged.
    pub fn restore(&mut self, snapshot: Payload) -> Result<()> {
        let mut entries = HashMap::with_capacity(snapshot.len());
        for (id, value) in snapshot {
            let entry: CachedResult = serde_json::from_value(value)?;
            let result = &entry.result;
            if result.is_null()
                && !(result.failed_items().is_empty() && result.fixed_items().is_empty())
            {
                return Err(QaError::storage(format!(
                    "Stored null result for '{}' carries items",
                    id
                )));
            }
            entries.insert(id, entry);
        }
        let newest = entries.values().map(|e| e.generation).max().unwrap_or(0);
        self.generation = self.generation.max(newest);
        self.entries = entries;
        Ok(())
    }

    /// Persist all entries under `data_id`
    pub fn save_to(&self, store: &mut BlobStore, data_id: &str) -> Result<()> {
        store.set_payload(data_id, self.snapshot()?);
        Ok(())
    }

    /// Load entries saved with [`ResultCache::save_to`]
    ///
    /// Returns `false` and leaves the cache alone when `data_id` is absent.
    pub fn load_from(&mut self, store: &BlobStore, data_id: &str) -> Result<bool> {
        match store.get(data_id) {
            Some(snapshot) => {
                self.restore(snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Statistics about the result cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub cached_results: usize,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_replaces_entry() {
        let mut cache = ResultCache::new();
        let first = cache.put("names", Mode::Query, CheckResult::failed(["a"]));
        let second = cache.put("names", Mode::Fix, CheckResult::fixed(["a"]));

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&cache.get("names").unwrap(), &second));
        assert_eq!(cache.entry("names").unwrap().mode, Mode::Fix);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_generation_increases() {
        let mut cache = ResultCache::new();
        cache.put("a", Mode::Query, CheckResult::success());
        cache.put("b", Mode::Query, CheckResult::success());
        let a = cache.entry("a").unwrap().generation;
        let b = cache.entry("b").unwrap().generation;
        assert!(b > a);
        assert_eq!(
            cache.stats(),
            CacheStats {
                cached_results: 2,
                generation: 2
            }
        );
    }

    #[test]
    fn test_miss_differs_from_null() {
        let mut cache = ResultCache::new();
        assert!(cache.get("a").is_none());
        cache.put("a", Mode::Query, CheckResult::null("crashed"));
        assert!(cache.get("a").unwrap().is_null());

        assert!(cache.clear("a"));
        assert!(!cache.clear("a"));
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_save_and_load_through_blob_store() {
        let mut cache = ResultCache::new();
        cache.put("names", Mode::Query, CheckResult::failed(["nodeX"]));
        cache.put("lights", Mode::Query, CheckResult::success());

        let mut store = BlobStore::new("qa_");
        cache.save_to(&mut store, "results").unwrap();

        let mut restored = ResultCache::new();
        assert!(!restored.load_from(&store, "missing").unwrap());
        assert!(restored.load_from(&store, "results").unwrap());
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get("names").unwrap().failed_items(), ["nodeX"]);
        assert_eq!(restored.stats().generation, 2);

        restored.put("names", Mode::Query, CheckResult::success());
        assert_eq!(restored.entry("names").unwrap().generation, 3);
    }

    #[test]
    fn test_restore_rejects_null_result_with_items() {
        let mut source = ResultCache::new();
        source.put("names", Mode::Query, CheckResult::null("crashed"));
        let mut snapshot = source.snapshot().unwrap();
        snapshot["names"]["result"]["failedItems"] = serde_json::json!(["nodeX"]);

        let mut cache = ResultCache::new();
        cache.put("lights", Mode::Query, CheckResult::success());
        let err = cache.restore(snapshot).unwrap_err();

        assert!(matches!(err, QaError::Storage(_)));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("lights"));
    }
}
