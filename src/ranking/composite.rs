//! Composite relevance scoring
//!
//! Fallback ranking signal used when embeddings are disabled, and the
//! lexical half of the hybrid blend. Four contributions, each in
//! [0, 1], combined with configured weights:
//! - citation count, log-scaled so heavy hitters cannot dominate
//! - recency, linear decay over a ten-year window
//! - per-source trust weight
//! - query-term overlap with the title

use super::{query_terms, term_overlap};
use crate::config::{CompositeWeights, TrustWeights};
use crate::errors::{Result, SearchError};
use crate::models::{CanonicalRecord, SourceName};
use chrono::{Datelike, Utc};

const WEIGHT_EPSILON: f64 = 1e-6;

/// Citation counts at or above this saturate the citation signal
const CITATION_CAP: f32 = 1000.0;

/// Composite scorer with configured weight split
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    weights: CompositeWeights,
    trust: TrustWeights,
}

impl CompositeScorer {
    /// Construction fails unless the composite weights sum to 1.0.
    pub fn new(weights: CompositeWeights, trust: TrustWeights) -> Result<Self> {
        let sum = weights.sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(SearchError::InvalidWeights { sum });
        }
        Ok(Self { weights, trust })
    }

    /// Score one record against pre-tokenized query terms
    pub fn score(&self, record: &CanonicalRecord, terms: &[String]) -> f32 {
        let citation = citation_signal(record.citation_count);
        let recency = recency_signal(record.year);
        let trust = self.trust_for(record.source) as f32;
        let title = term_overlap(terms, &record.title);

        self.weights.citation as f32 * citation
            + self.weights.recency as f32 * recency
            + self.weights.source_trust as f32 * trust
            + self.weights.title_match as f32 * title
    }

    /// Score a batch against a raw query string
    pub fn score_all(&self, records: &[CanonicalRecord], query: &str) -> Vec<f32> {
        let terms = query_terms(query);
        records.iter().map(|r| self.score(r, &terms)).collect()
    }

    fn trust_for(&self, source: SourceName) -> f64 {
        match source {
            SourceName::SemanticScholar => self.trust.semantic_scholar,
            SourceName::PubMed => self.trust.pubmed,
            SourceName::Arxiv => self.trust.arxiv,
            SourceName::LocalCorpus => self.trust.local_corpus,
        }
    }
}

/// Log-scaled citation contribution, saturating at `CITATION_CAP`
fn citation_signal(citations: Option<u32>) -> f32 {
    match citations {
        None | Some(0) => 0.0,
        Some(c) => {
            let scaled = (1.0 + c as f32).ln() / (1.0 + CITATION_CAP).ln();
            scaled.min(1.0)
        }
    }
}

/// Linear recency decay over a ten-year window. Missing years
/// contribute nothing rather than pretending to be current.
fn recency_signal(year: Option<i32>) -> f32 {
    match year {
        None => 0.0,
        Some(y) => {
            let age = (Utc::now().year() - y).max(0) as f32;
            (1.0 - age / 10.0).clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::record;
    use chrono::Datelike;

    fn scorer() -> CompositeScorer {
        CompositeScorer::new(CompositeWeights::default(), TrustWeights::default()).unwrap()
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let bad = CompositeWeights {
            citation: 0.5,
            recency: 0.5,
            source_trust: 0.5,
            title_match: 0.5,
        };
        assert!(matches!(
            CompositeScorer::new(bad, TrustWeights::default()),
            Err(SearchError::InvalidWeights { .. })
        ));
    }

    #[test]
    fn test_citation_signal_saturates() {
        assert_eq!(citation_signal(None), 0.0);
        assert_eq!(citation_signal(Some(0)), 0.0);
        let mid = citation_signal(Some(100));
        assert!(mid > 0.0 && mid < 1.0);
        assert_eq!(citation_signal(Some(1_000_000)), 1.0);
    }

    #[test]
    fn test_recency_decays_over_ten_years() {
        let current = Utc::now().year();
        assert_eq!(recency_signal(Some(current)), 1.0);
        let mid = recency_signal(Some(current - 5));
        assert!((mid - 0.5).abs() < 1e-6);
        assert_eq!(recency_signal(Some(current - 30)), 0.0);
        assert_eq!(recency_signal(None), 0.0);
    }

    #[test]
    fn test_missing_year_does_not_crash_scoring() {
        let mut r = record(SourceName::Arxiv, "1", "untitled preprint");
        r.year = None;
        let score = scorer().score(&r, &query_terms("untitled"));
        assert!(score.is_finite());
    }

    #[test]
    fn test_title_match_drives_relevance() {
        let s = scorer();
        let current = Utc::now().year();

        let mut on_topic = record(SourceName::Arxiv, "1", "Atrial fibrillation detection");
        on_topic.year = Some(current);
        let mut off_topic = record(SourceName::Arxiv, "2", "Quantum chromodynamics");
        off_topic.year = Some(current);

        let scores = s.score_all(
            &[on_topic, off_topic],
            "atrial fibrillation detection",
        );
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_trusted_source_scores_higher() {
        let s = scorer();
        let terms = query_terms("machine learning");
        let a = record(SourceName::SemanticScholar, "1", "Machine learning survey");
        let mut b = a.clone();
        b.source = SourceName::Arxiv;
        assert!(s.score(&a, &terms) > s.score(&b, &terms));
    }
}
