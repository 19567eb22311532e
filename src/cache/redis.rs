//! Distributed cache backend over a Redis-compatible key-value store.
//!
//! Required for multi-instance deployments: it avoids redundant upstream
//! calls across instances and keeps answers consistent regardless of which
//! instance serves a request. Entries are stored as JSON under the flat
//! `provider:operation:digest` key with a server-side `EX` expiry as a
//! hygiene measure; readers still validate TTL themselves.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{CacheBackend, CacheEntry, CacheError, CacheKey};

/// Backend speaking standard GET/SET/EXPIRE commands against an external
/// store shared by all service instances.
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connect to the store, e.g. `redis://localhost:6379/0`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|err| CacheError::Backend(format!("invalid store URL: {}", err)))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| CacheError::Backend(format!("connection failed: {}", err)))?;
        tracing::info!("distributed cache connected");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection
            .get(key.flat())
            .await
            .map_err(|err| CacheError::Backend(err.to_string()))?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let json = serde_json::to_string(&entry)?;
        // Server-side expiry is best effort only; the layer re-checks TTL
        connection
            .set_ex::<_, _, ()>(key.flat(), json, entry.ttl_secs.max(1))
            .await
            .map_err(|err| CacheError::Backend(err.to_string()))?;
        Ok(())
    }

    async fn clear(&self, namespace: Option<&str>) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        // The separator keeps the match on whole namespace segments, so
        // clearing "open" leaves "openalex" keys alone
        let pattern = match namespace {
            Some(prefix) => format!("{}:*", prefix.replace('/', ":")),
            None => "*".to_string(),
        };

        let keys: Vec<String> = connection
            .keys(&pattern)
            .await
            .map_err(|err| CacheError::Backend(err.to_string()))?;

        if !keys.is_empty() {
            connection
                .del::<_, ()>(keys)
                .await
                .map_err(|err| CacheError::Backend(err.to_string()))?;
        }
        Ok(())
    }
}
