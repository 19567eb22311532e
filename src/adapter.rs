//! Resilient front for one provider.
//!
//! The adapter composes the pieces every request passes through: argument
//! validation, the read-through cache, governor admission and bounded
//! retries. Providers stay pure transport-and-normalize; everything
//! cross-cutting lives here, so each of the six operations is the same
//! pipeline with a different fetch closure.
//!
//! Cache failures never fail a request: a broken backend logs a warning
//! and the call degrades to a direct fetch, skipping the write-through
//! for that call as well.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::{CacheKey, CacheLayer};
use crate::error::{GatewayError, Lookup};
use crate::models::{Author, CitationDirection, CitationRelations, Journal, Paper, SearchOptions};
use crate::providers::Provider;
use crate::resilience::{RateGovernor, RetryPolicy};

/// One provider wrapped with pacing, retry and caching.
#[derive(Debug, Clone)]
pub struct Adapter {
    provider: Arc<dyn Provider>,
    governor: Arc<RateGovernor>,
    retry: RetryPolicy,
    cache: Option<CacheLayer>,
}

impl Adapter {
    pub fn new(
        provider: Arc<dyn Provider>,
        governor: Arc<RateGovernor>,
        retry: RetryPolicy,
        cache: Option<CacheLayer>,
    ) -> Self {
        Self {
            provider,
            governor,
            retry,
            cache,
        }
    }

    /// Name of the wrapped provider.
    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    /// Fetch one paper by id.
    pub async fn get_paper(&self, id: &str) -> Result<Lookup<Paper>, GatewayError> {
        let id = non_empty(id, "paper id")?;
        self.execute("get_paper", json!({ "id": id }), || {
            self.provider.get_paper(id)
        })
        .await
    }

    /// Keyword search over papers.
    pub async fn search_papers(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Paper>, GatewayError> {
        let keyword = non_empty(keyword, "search keyword")?;
        let options = self.validated(options)?;
        let args = json!({
            "keyword": keyword,
            "start_year": options.start_year,
            "end_year": options.end_year,
            "page": options.page,
            "page_size": options.page_size,
        });
        self.execute("search_papers", args, || {
            self.provider.search_papers(keyword, &options)
        })
        .await
    }

    /// Fetch one author by id.
    pub async fn get_author(&self, id: &str) -> Result<Lookup<Author>, GatewayError> {
        let id = non_empty(id, "author id")?;
        self.execute("get_author", json!({ "id": id }), || {
            self.provider.get_author(id)
        })
        .await
    }

    /// Papers published by an author.
    pub async fn get_author_papers(
        &self,
        author_id: &str,
        options: &SearchOptions,
    ) -> Result<Lookup<Vec<Paper>>, GatewayError> {
        let author_id = non_empty(author_id, "author id")?;
        let options = self.validated(options)?;
        let args = json!({
            "author_id": author_id,
            "start_year": options.start_year,
            "end_year": options.end_year,
            "page": options.page,
            "page_size": options.page_size,
        });
        self.execute("get_author_papers", args, || {
            self.provider.get_author_papers(author_id, &options)
        })
        .await
    }

    /// Citation relations of a paper.
    pub async fn get_citations(
        &self,
        paper_id: &str,
        direction: CitationDirection,
    ) -> Result<Lookup<CitationRelations>, GatewayError> {
        let paper_id = non_empty(paper_id, "paper id")?;
        let args = json!({ "paper_id": paper_id, "direction": direction });
        self.execute("get_citations", args, || {
            self.provider.get_citations(paper_id, direction)
        })
        .await
    }

    /// Fetch one journal by id.
    pub async fn get_journal(&self, id: &str) -> Result<Lookup<Journal>, GatewayError> {
        let id = non_empty(id, "journal id")?;
        self.execute("get_journal", json!({ "id": id }), || {
            self.provider.get_journal(id)
        })
        .await
    }

    /// Drop every cached result belonging to this provider.
    pub async fn clear_cache(&self) -> Result<(), GatewayError> {
        if let Some(cache) = &self.cache {
            cache
                .clear(Some(self.provider.id()))
                .await
                .map_err(|err| GatewayError::Configuration(format!("cache clear: {}", err)))?;
        }
        Ok(())
    }

    /// Clamp the page size and reject out-of-range paging. Validation runs
    /// before the cache key is built, so the key always reflects the
    /// arguments actually sent upstream.
    fn validated(&self, options: &SearchOptions) -> Result<SearchOptions, GatewayError> {
        if options.page == 0 {
            return Err(GatewayError::InvalidRequest(
                "page is 1-based and must be positive".to_string(),
            ));
        }
        if options.page_size == 0 {
            return Err(GatewayError::InvalidRequest(
                "page_size must be positive".to_string(),
            ));
        }
        Ok(options.clamped(self.provider.max_page_size()))
    }

    /// The shared request pipeline: cache probe, governed fetch with
    /// retries, write-through.
    async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        args: Value,
        fetch: F,
    ) -> Result<T, GatewayError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let key = CacheKey::for_operation(self.provider.id(), operation, &args);

        let mut cache_usable = self.cache.is_some();
        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(payload)) => match serde_json::from_value(payload) {
                    Ok(value) => return Ok(value),
                    // Treat an undecodable entry as a miss; the
                    // write-through below overwrites it
                    Err(err) => {
                        tracing::warn!(%key, %err, "discarding undecodable cache entry");
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%key, %err, "cache read failed, degrading to direct fetch");
                    cache_usable = false;
                }
            }
        }

        let value = self.retry.run(&self.governor, fetch).await?;

        if cache_usable {
            if let Some(cache) = &self.cache {
                match serde_json::to_value(&value) {
                    Ok(payload) => {
                        if let Err(err) = cache.put(&key, payload).await {
                            tracing::warn!(%key, %err, "cache write failed");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%key, %err, "result not serializable for caching");
                    }
                }
            }
        }

        Ok(value)
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str, GatewayError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidRequest(format!(
            "{} must not be empty",
            what
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, CacheEntry, CacheError, MemoryBackend};
    use crate::providers::mock::{sample_papers, MockProvider};
    use async_trait::async_trait;
    use std::time::Duration;

    fn adapter_with(provider: Arc<MockProvider>, cache: Option<CacheLayer>) -> Adapter {
        Adapter::new(
            provider,
            Arc::new(RateGovernor::new(0.0)),
            RetryPolicy::new(3, Duration::from_millis(10)),
            cache,
        )
    }

    fn memory_cache() -> CacheLayer {
        CacheLayer::new(Arc::new(MemoryBackend::new()), Duration::from_secs(3600))
    }

    /// Backend that fails every call, for degrade tests.
    #[derive(Debug)]
    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Backend("store unreachable".to_string()))
        }

        async fn set(&self, _key: &CacheKey, _entry: CacheEntry) -> Result<(), CacheError> {
            Err(CacheError::Backend("store unreachable".to_string()))
        }

        async fn clear(&self, _namespace: Option<&str>) -> Result<(), CacheError> {
            Err(CacheError::Backend("store unreachable".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_call_served_from_cache() {
        let provider = Arc::new(MockProvider::new("mock"));
        for paper in sample_papers("attention", 10, "mock") {
            provider.add_paper(paper);
        }
        let adapter = adapter_with(provider.clone(), Some(memory_cache()));
        let options = SearchOptions::default().page_size(5);

        let first = adapter.search_papers("attention", &options).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(provider.dispatch_count(), 1);

        // Identical call: answered from cache, upstream untouched
        let second = adapter.search_papers("attention", &options).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(provider.dispatch_count(), 1);

        // Different page: a distinct key, so upstream is hit again
        adapter
            .search_papers("attention", &options.clone().page(2))
            .await
            .unwrap();
        assert_eq!(provider.dispatch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_lookup_is_cached() {
        let provider = Arc::new(MockProvider::new("mock"));
        let adapter = adapter_with(provider.clone(), Some(memory_cache()));

        assert!(adapter.get_paper("missing").await.unwrap().is_not_found());
        assert!(adapter.get_paper("missing").await.unwrap().is_not_found());
        assert_eq!(provider.dispatch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_cache_degrades_to_direct_fetch() {
        let provider = Arc::new(MockProvider::new("mock"));
        provider.add_paper(Paper::new("P1", "Resilience", "mock"));
        let cache = CacheLayer::new(Arc::new(BrokenBackend), Duration::from_secs(3600));
        let adapter = adapter_with(provider.clone(), Some(cache));

        // No cache error escapes; every call goes upstream
        let result = adapter.get_paper("P1").await.unwrap();
        assert_eq!(result.found().unwrap().title, "Resilience");
        adapter.get_paper("P1").await.unwrap();
        assert_eq!(provider.dispatch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried_then_cached() {
        let provider = Arc::new(MockProvider::new("mock"));
        provider.add_paper(Paper::new("P1", "Retry", "mock"));
        provider.push_failure(GatewayError::Timeout);
        let adapter = adapter_with(provider.clone(), Some(memory_cache()));

        let result = adapter.get_paper("P1").await.unwrap();
        assert!(result.is_found());
        assert_eq!(provider.dispatch_count(), 2);

        // The retried success was written through
        adapter.get_paper("P1").await.unwrap();
        assert_eq!(provider.dispatch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_paging_rejected_before_dispatch() {
        let provider = Arc::new(MockProvider::new("mock"));
        let adapter = adapter_with(provider.clone(), None);

        let zero_page = adapter
            .search_papers("x", &SearchOptions::default().page(0))
            .await;
        assert!(matches!(zero_page, Err(GatewayError::InvalidRequest(_))));

        let empty_keyword = adapter.search_papers("  ", &SearchOptions::default()).await;
        assert!(matches!(empty_keyword, Err(GatewayError::InvalidRequest(_))));

        assert_eq!(provider.dispatch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_size_clamped_to_provider_maximum() {
        let provider = Arc::new(MockProvider::new("mock").with_max_page_size(25));
        for paper in sample_papers("scale", 60, "mock") {
            provider.add_paper(paper);
        }
        let adapter = adapter_with(provider.clone(), None);

        let page = adapter
            .search_papers("scale", &SearchOptions::default().page_size(100))
            .await
            .unwrap();
        assert_eq!(page.len(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_journal_marker() {
        let provider = Arc::new(MockProvider::new("mock"));
        let adapter = adapter_with(provider, Some(memory_cache()));
        assert!(adapter.get_journal("J1").await.unwrap().is_unsupported());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_forces_refetch() {
        let provider = Arc::new(MockProvider::new("mock"));
        provider.add_paper(Paper::new("P1", "Evict", "mock"));
        let adapter = adapter_with(provider.clone(), Some(memory_cache()));

        adapter.get_paper("P1").await.unwrap();
        adapter.get_paper("P1").await.unwrap();
        assert_eq!(provider.dispatch_count(), 1);

        adapter.clear_cache().await.unwrap();
        adapter.get_paper("P1").await.unwrap();
        assert_eq!(provider.dispatch_count(), 2);
    }
}
