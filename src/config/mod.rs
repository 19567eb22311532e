//! Configuration management.
//!
//! Read once at startup and passed into adapter construction. A TOML file
//! is layered under an `ACADEMIC_GATEWAY`-prefixed environment source, so
//! e.g. `ACADEMIC_GATEWAY__CACHE__BACKEND=disk` overrides the file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Provider answering requests when the caller names none
    #[serde(default = "default_provider_name")]
    pub default_provider: String,

    /// Per-provider settings keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,

    /// Cache backend selection and TTL
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "openalex".to_string(),
            ProviderSettings {
                base_url: Some("https://api.openalex.org".to_string()),
                rate_limit: 10.0,
                ..ProviderSettings::default()
            },
        );
        providers.insert(
            "scopus".to_string(),
            ProviderSettings {
                base_url: Some("https://api.elsevier.com/content".to_string()),
                api_key: std::env::var("SCOPUS_API_KEY").ok(),
                rate_limit: 0.8,
                retry_delay_ms: 2000,
                ..ProviderSettings::default()
            },
        );
        providers.insert(
            "sciencedirect".to_string(),
            ProviderSettings {
                base_url: Some("https://api.elsevier.com/content".to_string()),
                api_key: std::env::var("SCIENCEDIRECT_API_KEY").ok(),
                rate_limit: 0.5,
                retry_delay_ms: 2000,
                ..ProviderSettings::default()
            },
        );

        Self {
            default_provider: default_provider_name(),
            providers,
            cache: CacheSettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Settings for one provider, falling back to defaults for names the
    /// file does not mention.
    pub fn provider(&self, name: &str) -> ProviderSettings {
        self.providers.get(name).cloned().unwrap_or_default()
    }
}

fn default_provider_name() -> String {
    "openalex".to_string()
}

/// Settings for one upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// API base URL; providers supply their canonical default when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key, for providers that require one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Contracted quota in calls per second; non-positive disables pacing
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Total request attempts, including the first
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    /// Base backoff delay between attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            rate_limit: default_rate_limit(),
            retry_times: default_retry_times(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_rate_limit() -> f64 {
    1.0
}

fn default_retry_times() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

/// Which cache backend serves the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Process-local map, lost on restart
    Memory,
    /// One file-set per namespace, survives restart
    Disk,
    /// External key-value store shared across instances
    Distributed,
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Disable to bypass caching entirely
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Backend selection
    #[serde(default = "default_backend")]
    pub backend: CacheBackendKind,

    /// Time to live for cached results, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Directory for the disk backend (platform cache dir when unset)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Store URL for the distributed backend
    #[serde(default)]
    pub store_url: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_backend(),
            ttl_secs: default_ttl_secs(),
            directory: None,
            store_url: None,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_backend() -> CacheBackendKind {
    CacheBackendKind::Memory
}

fn default_ttl_secs() -> u64 {
    3600
}

/// Load configuration from an optional TOML file plus the environment.
pub fn load_config(path: Option<&PathBuf>) -> Result<GatewayConfig, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("ACADEMIC_GATEWAY").separator("__"),
    );
    builder.build()?.try_deserialize()
}
