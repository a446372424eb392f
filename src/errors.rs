//! Error types for the search core
//!
//! Provides:
//! - Distinct error types for transient vs. permanent source failures
//! - Programming-contract violations surfaced as hard errors
//! - Transience classification used by the retry policy

use crate::models::SourceName;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using SearchError
pub type Result<T> = std::result::Result<T, SearchError>;

/// Search core error types.
///
/// The originating source lives in `source_name` (a plain tag, not an
/// error cause, so it must not collide with thiserror's `source`).
#[derive(Error, Debug)]
pub enum SearchError {
    // Per-source transient failures
    #[error("{source_name} rate limited the request")]
    RateLimited {
        source_name: SourceName,
        retry_after: Option<Duration>,
    },

    #[error("{source_name} timed out after {timeout_ms}ms")]
    Timeout {
        source_name: SourceName,
        timeout_ms: u64,
    },

    #[error("{source_name} upstream error {status}: {message}")]
    Upstream {
        source_name: SourceName,
        status: u16,
        message: String,
    },

    // Per-source permanent failures
    #[error("{source_name} rejected the request: {message}")]
    Rejected {
        source_name: SourceName,
        message: String,
    },

    #[error("{source_name} returned a malformed payload: {message}")]
    MalformedPayload {
        source_name: SourceName,
        message: String,
    },

    #[error("source not configured: {source_name}")]
    SourceUnavailable { source_name: SourceName },

    // Query / run-level failures
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("no sources available for this query")]
    NoSourcesAvailable,

    // Programming-contract violations
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("score arrays have mismatched lengths: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("weights must sum to 1.0, got {sum}")]
    InvalidWeights { sum: f64 },

    // External service errors
    #[error("embedding service error: {message}")]
    Embedding { message: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // Internal errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SearchError {
    /// Whether the retry policy may retry this error.
    ///
    /// Timeouts, 429s, and 5xx responses are transient; everything else
    /// (4xx, malformed payloads, contract violations) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::RateLimited { .. } | SearchError::Timeout { .. } => true,
            SearchError::Upstream { status, .. } => *status >= 500,
            SearchError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Whether this error came from a vendor rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SearchError::RateLimited { .. })
    }

    /// The source this error is attributable to, if any.
    pub fn source_name(&self) -> Option<SourceName> {
        match self {
            SearchError::RateLimited { source_name, .. }
            | SearchError::Timeout { source_name, .. }
            | SearchError::Upstream { source_name, .. }
            | SearchError::Rejected { source_name, .. }
            | SearchError::MalformedPayload { source_name, .. }
            | SearchError::SourceUnavailable { source_name } => Some(*source_name),
            _ => None,
        }
    }
}
