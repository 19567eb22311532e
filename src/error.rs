//! Error taxonomy for the gateway and the `Lookup` result markers.
//!
//! The taxonomy distinguishes "try again later" (transient) failures from
//! "this will never succeed" (permanent) failures. Absent entities and
//! structurally unsupported operations are not errors at all: they are
//! expressed through [`Lookup`].

use serde::{Deserialize, Serialize};

/// Errors that can occur when talking to an upstream provider.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or invalid configuration, fatal at adapter construction
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Upstream rejected the configured credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Upstream returned 429 despite governor pacing
    #[error("upstream rate limit exceeded (retry after {retry_after:?} seconds)")]
    RateLimited { retry_after: Option<u64> },

    /// Upstream returned an unexpected HTTP status
    #[error("upstream returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Network or connection error
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// A transient failure survived all retry attempts
    #[error("upstream unavailable after {attempts} attempts: {source}")]
    UpstreamUnavailable {
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },

    /// Normalizer could not map required fields from the upstream payload
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),

    /// Caller supplied invalid arguments (e.g. page 0)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// Whether a retry has a chance of succeeding.
    ///
    /// Transient: connection failures, timeouts, 429 and the retryable
    /// 5xx family. Everything else is permanent and surfaced immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout | GatewayError::RateLimited { .. } => {
                true
            }
            GatewayError::UpstreamStatus { status, .. } => {
                matches!(status, 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Classify a non-success HTTP status into the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => GatewayError::Authentication(message.into()),
            429 => GatewayError::RateLimited { retry_after: None },
            _ => GatewayError::UpstreamStatus {
                status,
                message: message.into(),
            },
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if let Some(status) = err.status() {
            GatewayError::from_status(status.as_u16(), err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::MalformedPayload(format!("JSON: {}", err))
    }
}

/// Outcome of a by-id lookup.
///
/// `NotFound` is a valid answer for "no such id"; `Unsupported` means the
/// provider structurally lacks the capability (e.g. Scopus has no journal
/// endpoint). Both serialize, so negative lookups are cacheable like any
/// other result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "entity", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Unsupported,
}

impl<T> Lookup<T> {
    /// Returns the entity if one was found.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Lookup::Unsupported)
    }

    /// Map the found entity, preserving the marker variants.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Unsupported => Lookup::Unsupported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::Timeout.is_transient());
        assert!(GatewayError::Network("connection refused".to_string()).is_transient());
        assert!(GatewayError::RateLimited { retry_after: Some(30) }.is_transient());
        assert!(GatewayError::UpstreamStatus {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());

        assert!(!GatewayError::UpstreamStatus {
            status: 404,
            message: "not found".to_string()
        }
        .is_transient());
        assert!(!GatewayError::Authentication("bad key".to_string()).is_transient());
        assert!(!GatewayError::MalformedPayload("missing id".to_string()).is_transient());
        assert!(!GatewayError::InvalidRequest("page 0".to_string()).is_transient());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            GatewayError::from_status(401, "denied"),
            GatewayError::Authentication(_)
        ));
        assert!(matches!(
            GatewayError::from_status(429, "slow down"),
            GatewayError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            GatewayError::from_status(500, "boom"),
            GatewayError::UpstreamStatus { status: 500, .. }
        ));
    }

    #[test]
    fn test_lookup_roundtrip() {
        let found: Lookup<String> = Lookup::Found("W1".to_string());
        let json = serde_json::to_string(&found).unwrap();
        let back: Lookup<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(found, back);

        let missing: Lookup<String> = Lookup::NotFound;
        let json = serde_json::to_string(&missing).unwrap();
        let back: Lookup<String> = serde_json::from_str(&json).unwrap();
        assert!(back.is_not_found());
    }
}
