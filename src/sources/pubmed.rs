//! PubMed / NCBI E-utilities client
//!
//! Two-step protocol: `esearch` returns matching PMIDs as JSON,
//! `efetch` returns full article XML. Each HTTP call consumes one
//! rate-limiter slot (NCBI allows 3 calls/s without an API key).
//! The registered contact email travels in the `email` parameter as
//! the vendor requests.

use super::{apply_filters, classify_response, parse_retry_after, SourceClient};
use crate::config::SourceConfig;
use crate::errors::{Result, SearchError};
use crate::models::{CanonicalRecord, SearchFilters, SourceName};
use crate::ratelimit::SlidingWindowLimiter;
use async_trait::async_trait;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const MAX_VENDOR_LIMIT: usize = 1000;

pub struct PubMedClient {
    client: reqwest::Client,
    email: Option<String>,
    base_url: String,
    limiter: Arc<SlidingWindowLimiter>,
}

#[derive(Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Default)]
struct ArticleBuilder {
    pmid: String,
    title: String,
    abstract_sections: Vec<String>,
    year: Option<i32>,
    authors: Vec<String>,
    doi: String,
    last_name: String,
    fore_name: String,
}

impl ArticleBuilder {
    fn build(self) -> CanonicalRecord {
        let url = if self.pmid.is_empty() {
            None
        } else {
            Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid))
        };

        CanonicalRecord {
            id: self.pmid,
            title: self.title.trim().to_string(),
            abstract_text: self.abstract_sections.join(" "),
            authors: self.authors,
            year: self.year,
            source: SourceName::PubMed,
            citation_count: None,
            doi: if self.doi.is_empty() {
                None
            } else {
                Some(self.doi)
            },
            url,
            retrieved_at: Utc::now(),
            embedding: None,
        }
    }

    fn finish_author(&mut self) {
        let name = match (self.fore_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.fore_name, self.last_name),
            (true, false) => self.last_name.clone(),
            (false, true) => self.fore_name.clone(),
            (true, true) => return,
        };
        self.authors.push(name);
        self.fore_name.clear();
        self.last_name.clear();
    }
}

impl PubMedClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            email: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            limiter: Arc::new(SlidingWindowLimiter::new(config.max_calls, config.window())),
        })
    }

    async fn esearch(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.limiter.acquire().await;

        let url = format!("{}/esearch.fcgi", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            ("db", "pubmed".to_string()),
            ("term", query.trim().to_string()),
            ("retmax", limit.min(MAX_VENDOR_LIMIT).to_string()),
            ("retmode", "json".to_string()),
        ];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(SourceName::PubMed, status, retry_after, body));
        }

        let body: ESearchResponse =
            response
                .json()
                .await
                .map_err(|e| SearchError::MalformedPayload {
                    source_name: SourceName::PubMed,
                    message: e.to_string(),
                })?;
        Ok(body.esearchresult.idlist)
    }

    async fn efetch(&self, ids: &[String]) -> Result<String> {
        self.limiter.acquire().await;

        let url = format!("{}/efetch.fcgi", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("rettype", "xml".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(SourceName::PubMed, status, retry_after, body));
        }

        Ok(response.text().await?)
    }

    /// Parse efetch XML into canonical records.
    ///
    /// Year is taken only from the journal `PubDate` (the article
    /// carries several other `Year` elements); the first PMID per
    /// article wins (later ones belong to comment references).
    fn parse_articles(xml: &str) -> Result<Vec<CanonicalRecord>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut records = Vec::new();
        let mut article: Option<ArticleBuilder> = None;
        let mut in_pubdate = false;
        let mut in_author = false;
        let mut field: Option<&'static str> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"PubmedArticle" => article = Some(ArticleBuilder::default()),
                    b"PubDate" => in_pubdate = true,
                    b"Author" => in_author = true,
                    b"PMID" => field = Some("pmid"),
                    b"ArticleTitle" => field = Some("title"),
                    b"AbstractText" => field = Some("abstract"),
                    b"Year" if in_pubdate => field = Some("year"),
                    b"LastName" if in_author => field = Some("last"),
                    b"ForeName" if in_author => field = Some("fore"),
                    b"ArticleId" => {
                        let is_doi = e.attributes().flatten().any(|attr| {
                            attr.key.local_name().as_ref() == b"IdType"
                                && attr.value.as_ref() == b"doi"
                        });
                        field = if is_doi { Some("doi") } else { None };
                    }
                    _ => field = None,
                },
                Ok(Event::Text(t)) => {
                    if let (Some(builder), Some(name)) = (article.as_mut(), field) {
                        let text = t.unescape().unwrap_or_default();
                        match name {
                            "pmid" if builder.pmid.is_empty() => {
                                builder.pmid = text.trim().to_string()
                            }
                            "title" => builder.title.push_str(text.as_ref()),
                            "abstract" => builder.abstract_sections.push(text.trim().to_string()),
                            "year" => builder.year = text.trim().parse().ok(),
                            "last" => builder.last_name = text.trim().to_string(),
                            "fore" => builder.fore_name = text.trim().to_string(),
                            "doi" if builder.doi.is_empty() => {
                                builder.doi = text.trim().to_string()
                            }
                            _ => {}
                        }
                    }
                }
                Ok(Event::End(e)) => {
                    field = None;
                    match e.local_name().as_ref() {
                        b"PubDate" => in_pubdate = false,
                        b"Author" => {
                            in_author = false;
                            if let Some(builder) = article.as_mut() {
                                builder.finish_author();
                            }
                        }
                        b"PubmedArticle" => {
                            if let Some(builder) = article.take() {
                                records.push(builder.build());
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SearchError::MalformedPayload {
                        source_name: SourceName::PubMed,
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
impl SourceClient for PubMedClient {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CanonicalRecord>> {
        let ids = self.esearch(query, limit).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let xml = self.efetch(&ids).await?;
        let records = Self::parse_articles(&xml)?;
        tracing::debug!(count = records.len(), "pubmed results");

        Ok(apply_filters(records, limit, filters))
    }

    fn name(&self) -> SourceName {
        SourceName::PubMed
    }
}
