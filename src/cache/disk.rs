//! On-disk cache backend: survives restarts.
//!
//! Layout mirrors the namespace structure, one JSON file per key:
//!
//! ```text
//! <base>/
//!   openalex/
//!     get_paper/
//!       <digest>.json
//!     search_papers/
//!       <digest>.json
//!   scopus/
//!     ...
//! ```
//!
//! Namespacing by provider and operation keeps providers that return
//! entities with colliding raw ids from clobbering each other.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CacheBackend, CacheEntry, CacheError, CacheKey};

/// File-based backend rooted at a base directory.
#[derive(Debug, Clone)]
pub struct DiskBackend {
    base_dir: PathBuf,
}

impl DiskBackend {
    /// Open (and create) a cache directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        tracing::info!(dir = %base_dir.display(), "disk cache initialized");
        Ok(Self { base_dir })
    }

    /// Default platform cache directory for the gateway.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("academic-gateway")
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.base_dir
            .join(key.namespace())
            .join(format!("{}.json", key.digest()))
    }

    fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// Run blocking file IO off the async worker. `spawn_blocking` works on
/// every runtime flavor, including current-thread.
async fn on_blocking<T, F>(work: F) -> Result<T, CacheError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CacheError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| CacheError::Backend(format!("blocking task failed: {}", err)))?
}

#[async_trait]
impl CacheBackend for DiskBackend {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        on_blocking(move || Self::read_entry(&path)).await
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        on_blocking(move || {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string(&entry)?;
            fs::write(&path, content)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, namespace: Option<&str>) -> Result<(), CacheError> {
        let target = match namespace {
            Some(prefix) => self.base_dir.join(prefix),
            None => self.base_dir.clone(),
        };
        let base_dir = self.base_dir.clone();
        on_blocking(move || {
            match fs::remove_dir_all(&target) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            fs::create_dir_all(&base_dir)?;
            Ok(())
        })
        .await
    }
}
