//! Unified, resilient access to heterogeneous scholarly literature APIs.
//!
//! Three upstreams with very different shapes (OpenAlex's open REST API
//! and Elsevier's commercial Scopus and ScienceDirect APIs) are exposed
//! behind one canonical entity model. Every request flows through the
//! same pipeline: per-provider rate pacing, bounded retry with backoff,
//! and a read-through cache with pluggable backends.
//!
//! ```no_run
//! use academic_gateway::{AdapterRegistry, GatewayConfig, SearchOptions};
//!
//! # async fn run() -> Result<(), academic_gateway::GatewayError> {
//! let registry = AdapterRegistry::new(GatewayConfig::default()).await?;
//! let openalex = registry.get("openalex").await?;
//!
//! let papers = openalex
//!     .search_papers("sparse attention", &SearchOptions::new().page_size(5))
//!     .await?;
//! for paper in papers {
//!     println!("{}", paper);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod registry;
pub mod resilience;

pub use adapter::Adapter;
pub use config::{load_config, CacheSettings, GatewayConfig, ProviderSettings};
pub use error::{GatewayError, Lookup};
pub use models::{Author, CitationDirection, CitationRelations, Journal, Paper, SearchOptions};
pub use registry::AdapterRegistry;

/// Crate version, for diagnostics and user agent strings.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
