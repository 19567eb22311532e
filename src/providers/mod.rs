//! Upstream provider clients and their normalizers.
//!
//! Each provider module owns the raw HTTP transport to one upstream API
//! and the pure normalizer functions that map its idiosyncratic JSON into
//! the canonical entity model. Providers perform no caching, pacing or
//! retrying themselves; that discipline lives in [`crate::Adapter`].
//!
//! A provider that structurally cannot support an operation returns
//! [`Lookup::Unsupported`] instead of erroring.

mod openalex;
mod sciencedirect;
mod scopus;

pub mod mock;

pub use mock::MockProvider;
pub use openalex::OpenAlexProvider;
pub use sciencedirect::ScienceDirectProvider;
pub use scopus::ScopusProvider;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{GatewayError, Lookup};
use crate::models::{Author, CitationDirection, CitationRelations, Journal, Paper, SearchOptions};

/// Capability set every provider implements.
///
/// All operations are idempotent and side-effect-free from the caller's
/// perspective. `search`-shaped operations return pages in upstream order;
/// pages may legitimately come back shorter than `page_size` when a year
/// filter had to be applied client-side.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Provider name used for cache namespaces and registry lookup.
    fn id(&self) -> &str;

    /// Largest page size the upstream accepts; requests are clamped to it.
    fn max_page_size(&self) -> usize;

    /// Fetch one paper by its provider-scoped id.
    async fn get_paper(&self, id: &str) -> Result<Lookup<Paper>, GatewayError>;

    /// Keyword search over papers.
    async fn search_papers(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Paper>, GatewayError>;

    /// Fetch one author by id.
    async fn get_author(&self, id: &str) -> Result<Lookup<Author>, GatewayError>;

    /// Papers published by an author. Providers without an author index
    /// return [`Lookup::Unsupported`].
    async fn get_author_papers(
        &self,
        author_id: &str,
        options: &SearchOptions,
    ) -> Result<Lookup<Vec<Paper>>, GatewayError>;

    /// Citation relations of a paper.
    async fn get_citations(
        &self,
        paper_id: &str,
        direction: CitationDirection,
    ) -> Result<Lookup<CitationRelations>, GatewayError>;

    /// Fetch one journal by id. Most commercial providers lack a journal
    /// endpoint, hence the default.
    async fn get_journal(&self, _id: &str) -> Result<Lookup<Journal>, GatewayError> {
        Ok(Lookup::Unsupported)
    }
}

/// Issue a GET and parse the JSON body, classifying failures into the
/// gateway taxonomy. 404 comes back as `UpstreamStatus { 404 }`; callers
/// that treat absence as a valid answer map it with [`lookup_on_404`].
pub(crate) async fn get_json(
    client: &Client,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<Value, GatewayError> {
    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request.send().await.map_err(GatewayError::from)?;
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(GatewayError::RateLimited { retry_after });
    }

    if !status.is_success() {
        return Err(GatewayError::from_status(
            status.as_u16(),
            format!("GET {}", url),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| GatewayError::MalformedPayload(format!("invalid JSON body: {}", err)))
}

/// Convert a 404 into a `NotFound` lookup; propagate everything else.
pub(crate) fn lookup_on_404<T>(
    result: Result<T, GatewayError>,
) -> Result<Lookup<T>, GatewayError> {
    match result {
        Ok(value) => Ok(Lookup::Found(value)),
        Err(GatewayError::UpstreamStatus { status: 404, .. }) => Ok(Lookup::NotFound),
        Err(err) => Err(err),
    }
}

/// Build a reqwest client with the per-provider timeout and the crate's
/// user agent.
pub(crate) fn build_http_client(
    timeout: std::time::Duration,
) -> Result<Client, GatewayError> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|err| GatewayError::Configuration(format!("HTTP client: {}", err)))
}

// ===== Payload walking helpers =====
//
// The Elsevier APIs return a bare object where a single-element list is
// meant, and numbers as strings; these helpers absorb that.

/// Treat a value as a list, accepting a bare object as a one-element list.
pub(crate) fn as_array_or_single(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Parse a count that may arrive as a number or a numeric string;
/// absent or negative means "unknown", mapped to zero for cumulative counts.
pub(crate) fn count_or_zero(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().map(|v| v as u32).unwrap_or(0),
        Some(Value::String(s)) => s.parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}

/// Like [`count_or_zero`] but preserving "unknown" for structural
/// metadata such as h-index.
pub(crate) fn count_or_unknown(value: Option<&Value>) -> Option<u32> {
    match value {
        Some(Value::Number(n)) => n.as_u64().map(|v| v as u32),
        Some(Value::String(s)) => s.parse::<u32>().ok(),
        _ => None,
    }
}

/// Year from an ISO `YYYY-MM-DD` date string.
pub(crate) fn year_from_date(date: &str) -> Option<i32> {
    date.split('-').next()?.parse().ok()
}

/// Last path segment of an OpenAlex-style URL id
/// (`https://openalex.org/W123` -> `W123`).
pub(crate) fn trailing_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Non-empty string field.
pub(crate) fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_or_single() {
        let list = json!([1, 2]);
        assert_eq!(as_array_or_single(&list).len(), 2);

        let single = json!({"a": 1});
        assert_eq!(as_array_or_single(&single).len(), 1);

        assert!(as_array_or_single(&Value::Null).is_empty());
    }

    #[test]
    fn test_counts() {
        assert_eq!(count_or_zero(Some(&json!(42))), 42);
        assert_eq!(count_or_zero(Some(&json!("17"))), 17);
        assert_eq!(count_or_zero(Some(&json!("n/a"))), 0);
        assert_eq!(count_or_zero(None), 0);

        assert_eq!(count_or_unknown(Some(&json!(5))), Some(5));
        assert_eq!(count_or_unknown(None), None);
        assert_eq!(count_or_unknown(Some(&json!(null))), None);
    }

    #[test]
    fn test_trailing_id_and_year() {
        assert_eq!(trailing_id("https://openalex.org/W123"), "W123");
        assert_eq!(trailing_id("W123"), "W123");
        assert_eq!(year_from_date("2023-05-01"), Some(2023));
        assert_eq!(year_from_date("unknown"), None);
    }
}
