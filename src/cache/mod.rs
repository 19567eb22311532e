//! Content-addressed read-through cache with pluggable backends.
//!
//! Keys are (provider namespace, operation, canonicalized argument tuple);
//! values are immutable once written and expire lazily at read time. The
//! layer re-validates TTL itself on every read, so backend-side expiry
//! timing is never trusted. Backend failures are reported to the caller as
//! [`CacheError`] and are expected to be swallowed: a broken cache must
//! never fail a request.

mod disk;
mod memory;
mod redis;

pub use disk::DiskBackend;
pub use memory::MemoryBackend;
pub use redis::RedisBackend;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised by cache backends. Never surfaced to gateway callers.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Composite cache key.
///
/// The namespace is `provider/operation`, which isolates providers from
/// one another (two providers may return entities with colliding raw ids)
/// and operations within a provider. The digest is an md5 of the
/// canonicalized argument JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    digest: String,
}

impl CacheKey {
    /// Build a key for one operation invocation.
    pub fn for_operation(provider: &str, operation: &str, args: &Value) -> Self {
        let canonical = canonical_json(args);
        let digest = format!("{:x}", md5::compute(canonical.as_bytes()));
        Self {
            namespace: format!("{}/{}", provider, operation),
            digest,
        }
    }

    /// `provider/operation` namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Argument digest within the namespace.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Flat `provider:operation:digest` form for key-value backends.
    pub fn flat(&self) -> String {
        format!("{}:{}", self.namespace.replace('/', ":"), self.digest)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.digest)
    }
}

/// Serialize JSON with object keys sorted recursively, so logically equal
/// argument tuples always map to the same digest.
pub(crate) fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap_or_default(), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let fields: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", fields.join(","))
        }
        other => other.to_string(),
    }
}

/// One cached value: serialized payload plus insertion time and TTL.
/// Immutable once written; expiry is computed lazily at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized normalized result
    pub payload: Value,

    /// Insertion time, seconds since the Unix epoch
    pub inserted_at: u64,

    /// Time to live in seconds
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(payload: Value, inserted_at: u64, ttl: Duration) -> Self {
        Self {
            payload,
            inserted_at,
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Expired when `now - inserted_at >= ttl`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_sub(self.inserted_at) >= self.ttl_secs
    }
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Storage backend contract. All backends implement identical semantics: a
/// value written with TTL T is retrievable until T elapses; eviction
/// promptness beyond "not earlier than T" is not guaranteed, which is why
/// the layer validates TTL on read.
#[async_trait]
pub trait CacheBackend: Send + Sync + std::fmt::Debug {
    /// Fetch an entry, expired or not. `None` on absence.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry. Overwrites any previous value for the key.
    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), CacheError>;

    /// Drop all entries whose namespace starts with `namespace`, or
    /// everything when `None`.
    async fn clear(&self, namespace: Option<&str>) -> Result<(), CacheError>;
}

/// Read-through cache front: one backend plus the configured TTL.
#[derive(Debug, Clone)]
pub struct CacheLayer {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl CacheLayer {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Fetch a still-valid payload, treating expired entries as misses.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        self.get_at(key, unix_now()).await
    }

    /// TTL validation against an explicit clock, used by tests.
    pub async fn get_at(&self, key: &CacheKey, now: u64) -> Result<Option<Value>, CacheError> {
        match self.backend.get(key).await? {
            Some(entry) if !entry.is_expired_at(now) => {
                tracing::debug!(%key, "cache hit");
                Ok(Some(entry.payload))
            }
            Some(_) => {
                tracing::debug!(%key, "cache entry expired");
                Ok(None)
            }
            None => {
                tracing::debug!(%key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Write a payload through with the layer's TTL.
    pub async fn put(&self, key: &CacheKey, payload: Value) -> Result<(), CacheError> {
        self.put_at(key, payload, unix_now()).await
    }

    /// Write with an explicit insertion time, used by tests.
    pub async fn put_at(&self, key: &CacheKey, payload: Value, now: u64) -> Result<(), CacheError> {
        self.backend
            .set(key, CacheEntry::new(payload, now, self.ttl))
            .await
    }

    /// Clear one namespace prefix, or everything.
    pub async fn clear(&self, namespace: Option<&str>) -> Result<(), CacheError> {
        self.backend.clear(namespace).await
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_stable_across_field_order() {
        let a = CacheKey::for_operation(
            "openalex",
            "search_papers",
            &json!({"keyword": "transformer", "page": 1, "page_size": 5}),
        );
        let b = CacheKey::for_operation(
            "openalex",
            "search_papers",
            &json!({"page_size": 5, "keyword": "transformer", "page": 1}),
        );
        assert_eq!(a, b);
        assert_eq!(a.namespace(), "openalex/search_papers");
    }

    #[test]
    fn test_keys_isolate_providers_and_operations() {
        let args = json!({"id": "W123"});
        let a = CacheKey::for_operation("openalex", "get_paper", &args);
        let b = CacheKey::for_operation("scopus", "get_paper", &args);
        let c = CacheKey::for_operation("openalex", "get_author", &args);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_canonical_json_sorts_nested_maps() {
        let value = json!({"b": {"z": 1, "a": 2}, "a": [3, {"y": 4, "x": 5}]});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":[3,{"x":5,"y":4}],"b":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let entry = CacheEntry::new(json!(1), 1_000, Duration::from_secs(60));
        assert!(!entry.is_expired_at(1_000));
        assert!(!entry.is_expired_at(1_059));
        assert!(entry.is_expired_at(1_060));
        assert!(entry.is_expired_at(1_061));
    }

    #[tokio::test]
    async fn test_layer_validates_ttl_on_read() {
        let layer = CacheLayer::new(Arc::new(MemoryBackend::new()), Duration::from_secs(60));
        let key = CacheKey::for_operation("openalex", "get_paper", &json!({"id": "W1"}));

        layer.put_at(&key, json!({"title": "T"}), 1_000).await.unwrap();

        // Present at T - 1, absent at T and after
        assert!(layer.get_at(&key, 1_059).await.unwrap().is_some());
        assert!(layer.get_at(&key, 1_060).await.unwrap().is_none());
        assert!(layer.get_at(&key, 2_000).await.unwrap().is_none());
    }
}
