//! Provider registry and dispatch.
//!
//! Holds one [`Adapter`] per provider name, built lazily on first use so
//! a missing Scopus key only matters once something asks for Scopus. The
//! cache layer is shared across adapters; governors are per adapter, one
//! pacing regime per upstream quota.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::adapter::Adapter;
use crate::cache::{CacheLayer, DiskBackend, MemoryBackend, RedisBackend};
use crate::config::{CacheBackendKind, GatewayConfig};
use crate::error::GatewayError;
use crate::providers::{OpenAlexProvider, Provider, ScienceDirectProvider, ScopusProvider};
use crate::resilience::{RateGovernor, RetryPolicy};

/// Built-in provider names, in default dispatch order.
pub const BUILTIN_PROVIDERS: &[&str] = &["openalex", "scopus", "sciencedirect"];

/// Lazily-populated map from provider name to its adapter.
#[derive(Debug)]
pub struct AdapterRegistry {
    config: GatewayConfig,
    cache: Option<CacheLayer>,
    adapters: RwLock<HashMap<String, Arc<Adapter>>>,
}

impl AdapterRegistry {
    /// Build a registry, connecting the configured cache backend.
    pub async fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let cache = build_cache_layer(&config).await?;
        Ok(Self {
            config,
            cache,
            adapters: RwLock::new(HashMap::new()),
        })
    }

    /// Adapter for a provider name, building it on first request.
    pub async fn get(&self, name: &str) -> Result<Arc<Adapter>, GatewayError> {
        if let Some(adapter) = self.adapters.read().unwrap().get(name) {
            return Ok(adapter.clone());
        }

        let adapter = Arc::new(self.build_adapter(name)?);

        let mut adapters = self.adapters.write().unwrap();
        // Another task may have built it while we were constructing ours
        let adapter = adapters
            .entry(name.to_string())
            .or_insert(adapter)
            .clone();
        Ok(adapter)
    }

    /// Adapter for the configured default provider.
    pub async fn default_adapter(&self) -> Result<Arc<Adapter>, GatewayError> {
        let name = self.config.default_provider.clone();
        self.get(&name).await
    }

    /// Install (or replace) an adapter under a name at runtime. Used for
    /// custom providers and for swapping implementations without restart.
    pub fn register(&self, name: impl Into<String>, adapter: Arc<Adapter>) {
        let name = name.into();
        tracing::info!(provider = %name, "adapter registered");
        self.adapters.write().unwrap().insert(name, adapter);
    }

    /// Wrap a raw provider with this registry's cache and the configured
    /// resilience settings, then install it.
    pub fn register_provider(&self, provider: Arc<dyn Provider>) {
        let name = provider.id().to_string();
        let settings = self.config.provider(&name);
        let adapter = Adapter::new(
            provider,
            Arc::new(RateGovernor::new(settings.rate_limit)),
            RetryPolicy::new(settings.retry_times, settings.retry_delay()),
            self.cache.clone(),
        );
        self.register(name, Arc::new(adapter));
    }

    /// Names with a live adapter instance.
    pub fn active_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn build_adapter(&self, name: &str) -> Result<Adapter, GatewayError> {
        let settings = self.config.provider(name);
        let provider: Arc<dyn Provider> = match name {
            "openalex" => Arc::new(OpenAlexProvider::new(&settings)?),
            "scopus" => Arc::new(ScopusProvider::new(&settings)?),
            "sciencedirect" => Arc::new(ScienceDirectProvider::new(&settings)?),
            other => {
                return Err(GatewayError::Configuration(format!(
                    "unknown provider: {}",
                    other
                )))
            }
        };

        tracing::info!(
            provider = name,
            rate_limit = settings.rate_limit,
            retry_times = settings.retry_times,
            "adapter built"
        );

        Ok(Adapter::new(
            provider,
            Arc::new(RateGovernor::new(settings.rate_limit)),
            RetryPolicy::new(settings.retry_times, settings.retry_delay()),
            self.cache.clone(),
        ))
    }
}

async fn build_cache_layer(config: &GatewayConfig) -> Result<Option<CacheLayer>, GatewayError> {
    let settings = &config.cache;
    if !settings.enabled {
        tracing::info!("caching disabled");
        return Ok(None);
    }

    let layer = match settings.backend {
        CacheBackendKind::Memory => {
            CacheLayer::new(Arc::new(MemoryBackend::new()), settings.ttl())
        }
        CacheBackendKind::Disk => {
            let dir = settings
                .directory
                .clone()
                .unwrap_or_else(DiskBackend::default_dir);
            let backend = DiskBackend::new(dir)
                .map_err(|err| GatewayError::Configuration(format!("disk cache: {}", err)))?;
            CacheLayer::new(Arc::new(backend), settings.ttl())
        }
        CacheBackendKind::Distributed => {
            let url = settings.store_url.as_deref().ok_or_else(|| {
                GatewayError::Configuration(
                    "distributed cache requires cache.store_url".to_string(),
                )
            })?;
            let backend = RedisBackend::connect(url)
                .await
                .map_err(|err| GatewayError::Configuration(format!("distributed cache: {}", err)))?;
            CacheLayer::new(Arc::new(backend), settings.ttl())
        }
    };

    Ok(Some(layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;

    fn test_config() -> GatewayConfig {
        GatewayConfig::default()
    }

    #[tokio::test]
    async fn test_lazy_build_returns_one_instance() {
        let registry = AdapterRegistry::new(test_config()).await.unwrap();

        let first = registry.get("openalex").await.unwrap();
        let second = registry.get("openalex").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.active_providers(), vec!["openalex"]);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_configuration_error() {
        let registry = AdapterRegistry::new(test_config()).await.unwrap();
        let result = registry.get("wos").await;
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_at_build() {
        let mut config = test_config();
        config.providers.get_mut("scopus").unwrap().api_key = None;
        let registry = AdapterRegistry::new(config).await.unwrap();

        let result = registry.get("scopus").await;
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_default_adapter_follows_config() {
        let registry = AdapterRegistry::new(test_config()).await.unwrap();
        let adapter = registry.default_adapter().await.unwrap();
        assert_eq!(adapter.provider_id(), "openalex");
    }

    #[tokio::test]
    async fn test_registered_provider_shadows_builtin() {
        let registry = AdapterRegistry::new(test_config()).await.unwrap();
        registry.register_provider(Arc::new(MockProvider::new("openalex")));

        let adapter = registry.get("openalex").await.unwrap();
        assert_eq!(adapter.provider_id(), "openalex");
        // The mock answers NotFound instead of hitting the network
        assert!(adapter.get_paper("W1").await.unwrap().is_not_found());
    }
}
