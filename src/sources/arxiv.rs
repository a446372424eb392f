//! arXiv API client
//!
//! Atom XML over HTTP; no API key, but the vendor asks for a
//! descriptive User-Agent and roughly one call every three seconds.
//! Year filtering is not supported server-side, so it is applied to
//! the normalized records.

use super::{apply_filters, classify_response, parse_retry_after, SourceClient};
use crate::config::SourceConfig;
use crate::errors::{Result, SearchError};
use crate::models::{CanonicalRecord, SearchFilters, SourceName};
use crate::ratelimit::SlidingWindowLimiter;
use async_trait::async_trait;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "http://export.arxiv.org/api/query";
const MAX_VENDOR_LIMIT: usize = 1000;
const USER_AGENT: &str = concat!("paperscout/", env!("CARGO_PKG_VERSION"));

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    limiter: Arc<SlidingWindowLimiter>,
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    doi: String,
    url: Option<String>,
    authors: Vec<String>,
}

impl EntryBuilder {
    fn build(self) -> CanonicalRecord {
        // Atom ids look like http://arxiv.org/abs/2301.00001v1
        let id = self
            .id
            .rsplit('/')
            .next()
            .unwrap_or(self.id.as_str())
            .to_string();
        let year = self.published.get(..4).and_then(|y| y.parse().ok());

        CanonicalRecord {
            id,
            title: collapse_whitespace(&self.title),
            abstract_text: collapse_whitespace(&self.summary),
            authors: self.authors,
            year,
            source: SourceName::Arxiv,
            citation_count: None,
            doi: if self.doi.is_empty() {
                None
            } else {
                Some(self.doi)
            },
            url: self.url,
            retrieved_at: Utc::now(),
            embedding: None,
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ArxivClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            limiter: Arc::new(SlidingWindowLimiter::new(config.max_calls, config.window())),
        })
    }

    /// Prefix bare queries with the all-fields selector
    fn format_query(query: &str) -> String {
        let trimmed = query.trim();
        if trimmed.starts_with("ti:")
            || trimmed.starts_with("au:")
            || trimmed.starts_with("abs:")
            || trimmed.starts_with("all:")
        {
            trimmed.to_string()
        } else {
            format!("all:{}", trimmed)
        }
    }

    /// Parse an Atom feed into canonical records.
    ///
    /// Uses local names throughout, so the atom/arxiv namespace
    /// prefixes do not matter.
    fn parse_feed(xml: &str) -> Result<Vec<CanonicalRecord>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut records = Vec::new();
        let mut entry: Option<EntryBuilder> = None;
        let mut in_author = false;
        let mut field: Option<&'static str> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"entry" => entry = Some(EntryBuilder::default()),
                    b"author" => in_author = true,
                    b"id" if entry.is_some() => field = Some("id"),
                    b"title" if entry.is_some() => field = Some("title"),
                    b"summary" => field = Some("summary"),
                    b"published" => field = Some("published"),
                    b"doi" => field = Some("doi"),
                    b"name" if in_author => field = Some("name"),
                    _ => field = None,
                },
                Ok(Event::Empty(e)) => {
                    if e.local_name().as_ref() == b"link" {
                        if let Some(builder) = entry.as_mut() {
                            let mut href = None;
                            let mut is_pdf = false;
                            for attr in e.attributes().flatten() {
                                let value =
                                    String::from_utf8_lossy(attr.value.as_ref()).into_owned();
                                match attr.key.local_name().as_ref() {
                                    b"href" => href = Some(value),
                                    b"type" if value == "application/pdf" => is_pdf = true,
                                    b"title" if value == "pdf" => is_pdf = true,
                                    _ => {}
                                }
                            }
                            if is_pdf || builder.url.is_none() {
                                if let Some(href) = href {
                                    builder.url = Some(href);
                                }
                            }
                        }
                    }
                }
                Ok(Event::Text(t)) => {
                    if let (Some(builder), Some(name)) = (entry.as_mut(), field) {
                        let text = t.unescape().unwrap_or_default();
                        let target = match name {
                            "id" => &mut builder.id,
                            "title" => &mut builder.title,
                            "summary" => &mut builder.summary,
                            "published" => &mut builder.published,
                            "doi" => &mut builder.doi,
                            "name" => {
                                builder.authors.push(text.trim().to_string());
                                field = None;
                                continue;
                            }
                            _ => unreachable!(),
                        };
                        if !target.is_empty() {
                            target.push(' ');
                        }
                        target.push_str(text.as_ref());
                    }
                }
                Ok(Event::End(e)) => {
                    field = None;
                    match e.local_name().as_ref() {
                        b"author" => in_author = false,
                        b"entry" => {
                            if let Some(builder) = entry.take() {
                                records.push(builder.build());
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SearchError::MalformedPayload {
                        source_name: SourceName::Arxiv,
                        message: e.to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl SourceClient for ArxivClient {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CanonicalRecord>> {
        self.limiter.acquire().await;

        let params: Vec<(&str, String)> = vec![
            ("search_query", Self::format_query(query)),
            ("start", "0".to_string()),
            ("max_results", limit.min(MAX_VENDOR_LIMIT).to_string()),
            ("sortBy", "relevance".to_string()),
            ("sortOrder", "descending".to_string()),
        ];

        let response = self.client.get(&self.base_url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(SourceName::Arxiv, status, retry_after, body));
        }

        let body = response.text().await?;
        let records = Self::parse_feed(&body)?;
        tracing::debug!(count = records.len(), "arxiv results");

        Ok(apply_filters(records, limit, filters))
    }

    fn name(&self) -> SourceName {
        SourceName::Arxiv
    }
}
