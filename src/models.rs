//! Core data model
//!
//! `CanonicalRecord` is the unit record every source client produces.
//! Records are immutable once constructed; downstream stages annotate
//! copies (`DedupedRecord`, `RankedRecord`) rather than mutating in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifies which source client produced a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceName {
    SemanticScholar,
    Arxiv,
    PubMed,
    LocalCorpus,
}

impl SourceName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceName::SemanticScholar => "semantic_scholar",
            SourceName::Arxiv => "arxiv",
            SourceName::PubMed => "pubmed",
            SourceName::LocalCorpus => "local_corpus",
        }
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized internal representation of one literature item,
/// independent of the vendor schema it came from.
///
/// `(source, id)` is unique within one source's output but not across
/// sources; cross-source identity is established only via DOI equality
/// or normalized-title match during deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Source-local identifier (paper ID, arXiv ID, PMID)
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub abstract_text: String,

    /// Author display names in vendor order
    #[serde(default)]
    pub authors: Vec<String>,

    /// Publication year; absence is valid and must not be read as year 0
    pub year: Option<i32>,

    /// Source client that produced this record
    pub source: SourceName,

    pub citation_count: Option<u32>,

    /// Strong dedup key when present
    pub doi: Option<String>,

    pub url: Option<String>,

    /// When this record was fetched
    pub retrieved_at: DateTime<Utc>,

    /// Populated lazily by the embedding provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl CanonicalRecord {
    /// Lowercased, whitespace-collapsed title used as a dedup key when
    /// no DOI is available.
    pub fn normalized_title(&self) -> String {
        self.title
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Text fed to the embedding provider: title plus abstract.
    pub fn embedding_text(&self) -> String {
        if self.abstract_text.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.abstract_text)
        }
    }
}

/// A deduplicated record with its cross-source history.
///
/// The first-seen record wins during deduplication, but every source
/// that returned a match is retained so coverage attribution stays
/// correct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupedRecord {
    pub record: CanonicalRecord,

    /// Every source that returned this record, first-seen first
    pub seen_in: Vec<SourceName>,
}

/// A record with its final relevance scores and rank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedRecord {
    pub record: CanonicalRecord,

    pub seen_in: Vec<SourceName>,

    /// Keyword/term-overlap score in [0, 1]
    pub lexical_score: f32,

    /// Embedding similarity score in [0, 1]; 0 when embeddings are disabled
    pub semantic_score: f32,

    /// Blended score in [0, 1] used for the final ordering
    pub hybrid_score: f32,

    /// 1-based position in the final ordering
    pub rank: usize,
}

/// Search filters applied by every source client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Inclusive (start, end) publication-year range
    pub year_range: Option<(i32, i32)>,

    /// Drop results scoring below this threshold after ranking
    pub min_score: Option<f32>,
}

impl SearchFilters {
    /// Whether a record's year passes the filter. Records without a
    /// year pass; absence of data is not evidence of being out of range.
    pub fn year_matches(&self, year: Option<i32>) -> bool {
        match (self.year_range, year) {
            (Some((start, end)), Some(y)) => y >= start && y <= end,
            _ => true,
        }
    }
}

/// One query execution request
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,

    /// Sources to fan out to; empty means all configured sources
    pub sources: Vec<SourceName>,

    /// Soft upper bound on results per source and on the final set
    pub limit: usize,

    pub filters: SearchFilters,

    /// Run-level deadline
    pub timeout: Duration,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            sources: Vec::new(),
            limit: 50,
            filters: SearchFilters::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// A per-source failure attached to the run output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceError {
    pub source: SourceName,
    pub message: String,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Minimal record constructor for tests
    pub fn record(source: SourceName, id: &str, title: &str) -> CanonicalRecord {
        CanonicalRecord {
            id: id.to_string(),
            title: title.to_string(),
            abstract_text: String::new(),
            authors: vec![],
            year: Some(2023),
            source,
            citation_count: None,
            doi: None,
            url: None,
            retrieved_at: Utc::now(),
            embedding: None,
        }
    }
}
