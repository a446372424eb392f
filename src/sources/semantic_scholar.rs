//! Semantic Scholar graph API client
//!
//! JSON API; supports server-side year filtering and caps `limit`
//! at 100 per request. An API key raises the vendor quota but is
//! optional.

use super::{apply_filters, classify_response, parse_retry_after, SourceClient};
use crate::config::SourceConfig;
use crate::errors::{Result, SearchError};
use crate::models::{CanonicalRecord, SearchFilters, SourceName};
use crate::ratelimit::SlidingWindowLimiter;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const MAX_VENDOR_LIMIT: usize = 100;
const FIELDS: &str = "paperId,title,abstract,year,citationCount,authors,externalIds,url";

pub struct SemanticScholarClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    limiter: Arc<SlidingWindowLimiter>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    paper_id: String,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    citation_count: Option<u32>,
    #[serde(default)]
    authors: Vec<Author>,
    external_ids: Option<ExternalIds>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            limiter: Arc::new(SlidingWindowLimiter::new(config.max_calls, config.window())),
        })
    }

    fn parse_response(body: &str) -> Result<Vec<CanonicalRecord>> {
        let response: SearchResponse =
            serde_json::from_str(body).map_err(|e| SearchError::MalformedPayload {
                source_name: SourceName::SemanticScholar,
                message: e.to_string(),
            })?;

        let retrieved_at = Utc::now();
        Ok(response
            .data
            .into_iter()
            .map(|paper| CanonicalRecord {
                id: paper.paper_id,
                title: paper.title.unwrap_or_default(),
                abstract_text: paper.abstract_text.unwrap_or_default(),
                authors: paper.authors.into_iter().filter_map(|a| a.name).collect(),
                year: paper.year,
                source: SourceName::SemanticScholar,
                citation_count: paper.citation_count,
                doi: paper.external_ids.and_then(|ids| ids.doi),
                url: paper.url,
                retrieved_at,
                embedding: None,
            })
            .collect())
    }
}

#[async_trait]
impl SourceClient for SemanticScholarClient {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CanonicalRecord>> {
        self.limiter.acquire().await;

        let url = format!("{}/paper/search", self.base_url);
        let capped = limit.min(MAX_VENDOR_LIMIT).to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("query", query.trim().to_string()),
            ("limit", capped),
            ("fields", FIELDS.to_string()),
        ];
        if let Some((start, end)) = filters.year_range {
            params.push(("year", format!("{}-{}", start, end)));
        }

        let mut request = self.client.get(&url).query(&params);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(
                SourceName::SemanticScholar,
                status,
                retry_after,
                body,
            ));
        }

        let body = response.text().await?;
        let records = Self::parse_response(&body)?;
        tracing::debug!(count = records.len(), "semantic scholar results");

        // Year filtering happened server-side; keep the limit honest.
        Ok(apply_filters(records, limit, &SearchFilters::default()))
    }

    fn name(&self) -> SourceName {
        SourceName::SemanticScholar
    }
}
