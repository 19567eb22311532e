//! Process-local in-memory cache backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CacheBackend, CacheEntry, CacheError, CacheKey};

/// In-memory backend: fastest, process-local, lost on restart.
///
/// Entries are evicted only by TTL (checked lazily by the layer) or an
/// explicit clear; there is no size bound.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the map intact; recover the
    // guard instead of propagating poisoning into unrelated requests.
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries().get(&key.flat()).cloned())
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries().insert(key.flat(), entry);
        Ok(())
    }

    async fn clear(&self, namespace: Option<&str>) -> Result<(), CacheError> {
        let mut entries = self.entries();
        match namespace {
            Some(prefix) => {
                // Match whole namespace segments: clearing "open" must not
                // evict "openalex" keys
                let flat_prefix = format!("{}:", prefix.replace('/', ":"));
                entries.retain(|key, _| !key.starts_with(&flat_prefix));
            }
            None => entries.clear(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn entry(value: i64) -> CacheEntry {
        CacheEntry::new(json!(value), 0, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let backend = MemoryBackend::new();
        let key = CacheKey::for_operation("openalex", "get_paper", &json!({"id": "W1"}));

        assert!(backend.get(&key).await.unwrap().is_none());

        backend.set(&key, entry(1)).await.unwrap();
        assert_eq!(backend.get(&key).await.unwrap().unwrap().payload, json!(1));

        backend.set(&key, entry(2)).await.unwrap();
        assert_eq!(backend.get(&key).await.unwrap().unwrap().payload, json!(2));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_namespace_prefix() {
        let backend = MemoryBackend::new();
        let paper = CacheKey::for_operation("openalex", "get_paper", &json!({"id": "W1"}));
        let author = CacheKey::for_operation("openalex", "get_author", &json!({"id": "A1"}));
        let scopus = CacheKey::for_operation("scopus", "get_paper", &json!({"id": "E1"}));

        for key in [&paper, &author, &scopus] {
            backend.set(key, entry(1)).await.unwrap();
        }

        // Clearing a provider prefix removes all of its operations
        backend.clear(Some("openalex")).await.unwrap();
        assert!(backend.get(&paper).await.unwrap().is_none());
        assert!(backend.get(&author).await.unwrap().is_none());
        assert!(backend.get(&scopus).await.unwrap().is_some());

        backend.clear(None).await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_clear_matches_whole_namespace_segments() {
        let backend = MemoryBackend::new();
        let short = CacheKey::for_operation("open", "get_paper", &json!({"id": "W1"}));
        let long = CacheKey::for_operation("openalex", "get_paper", &json!({"id": "W1"}));

        backend.set(&short, entry(1)).await.unwrap();
        backend.set(&long, entry(2)).await.unwrap();

        // "open" is a prefix of "openalex" but a different provider
        backend.clear(Some("open")).await.unwrap();
        assert!(backend.get(&short).await.unwrap().is_none());
        assert!(backend.get(&long).await.unwrap().is_some());
    }
}
