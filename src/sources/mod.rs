//! Source clients
//!
//! One client per external source, each an isolated failure domain.
//! Every client normalizes its vendor payload into `CanonicalRecord`s
//! at the boundary and consumes one rate-limiter slot per outbound
//! call before the request is issued.

mod arxiv;
mod corpus;
mod pubmed;
mod semantic_scholar;

pub use arxiv::ArxivClient;
pub use corpus::LocalCorpusIndex;
pub use pubmed::PubMedClient;
pub use semantic_scholar::SemanticScholarClient;

use crate::errors::{Result, SearchError};
use crate::models::{CanonicalRecord, SearchFilters, SourceName};
use async_trait::async_trait;
use std::time::Duration;

/// Common contract for all sources, remote and local.
///
/// `limit` is a soft upper bound; vendor APIs silently cap it.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Run one query against this source
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CanonicalRecord>>;

    /// Which source this client fronts
    fn name(&self) -> SourceName;
}

/// Map a non-success HTTP response to the error taxonomy.
///
/// 429 becomes a distinguished `RateLimited` (with any `Retry-After`
/// hint) so the orchestrator backs off instead of treating the source
/// as permanently down; 5xx is transient; other 4xx is permanent.
pub(crate) fn classify_response(
    source: SourceName,
    status: reqwest::StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> SearchError {
    if status.as_u16() == 429 {
        SearchError::RateLimited {
            source_name: source,
            retry_after,
        }
    } else if status.is_server_error() {
        SearchError::Upstream {
            source_name: source,
            status: status.as_u16(),
            message: truncate(&body, 200),
        }
    } else {
        SearchError::Rejected {
            source_name: source,
            message: format!("{}: {}", status, truncate(&body, 200)),
        }
    }
}

/// Parse a `Retry-After` header value given in seconds
pub(crate) fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<f64>()
        .ok()
        .map(Duration::from_secs_f64)
}

/// Apply the year filter client-side and enforce the soft limit.
/// Used by vendors whose API cannot filter server-side.
pub(crate) fn apply_filters(
    mut records: Vec<CanonicalRecord>,
    limit: usize,
    filters: &SearchFilters,
) -> Vec<CanonicalRecord> {
    records.retain(|r| filters.year_matches(r.year));
    records.truncate(limit);
    records
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::record;

    #[test]
    fn test_classify_429_is_rate_limited() {
        let err = classify_response(
            SourceName::SemanticScholar,
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(2)),
            String::new(),
        );
        assert!(err.is_rate_limited());
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_5xx_transient_4xx_permanent() {
        let transient = classify_response(
            SourceName::Arxiv,
            reqwest::StatusCode::BAD_GATEWAY,
            None,
            "gateway".into(),
        );
        assert!(transient.is_transient());

        let permanent = classify_response(
            SourceName::Arxiv,
            reqwest::StatusCode::BAD_REQUEST,
            None,
            "bad query".into(),
        );
        assert!(!permanent.is_transient());
    }

    #[test]
    fn test_apply_filters_respects_year_and_limit() {
        let mut a = record(SourceName::Arxiv, "1", "a");
        a.year = Some(2015);
        let mut b = record(SourceName::Arxiv, "2", "b");
        b.year = Some(2023);
        let mut c = record(SourceName::Arxiv, "3", "c");
        c.year = None;

        let filters = SearchFilters {
            year_range: Some((2020, 2024)),
            min_score: None,
        };
        let kept = apply_filters(vec![a, b, c], 10, &filters);
        // 2015 dropped; missing year passes
        assert_eq!(kept.len(), 2);

        let filters = SearchFilters::default();
        let mut many = Vec::new();
        for i in 0..5 {
            many.push(record(SourceName::Arxiv, &i.to_string(), "t"));
        }
        assert_eq!(apply_filters(many, 3, &filters).len(), 3);
    }
}
