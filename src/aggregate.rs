//! Cross-source aggregation
//!
//! Merges per-source result lists into one deduplicated set and
//! produces the fallback ranking when embeddings are unavailable.
//! Identity resolution cascades through three keys: DOI, normalized
//! title, then the `(source, id)` pair. The first occurrence of a
//! record wins; later duplicates only extend its source history.

use crate::models::{CanonicalRecord, DedupedRecord, RankedRecord, SourceName};
use crate::ranking::{query_terms, term_overlap, CompositeScorer};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ResultAggregator {
    scorer: CompositeScorer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Doi(String),
    Title(String),
    SourceId(SourceName, String),
}

fn dedup_key(record: &CanonicalRecord) -> DedupKey {
    if let Some(doi) = &record.doi {
        let doi = doi.trim().to_lowercase();
        if !doi.is_empty() {
            return DedupKey::Doi(doi);
        }
    }
    let title = record.normalized_title();
    if !title.is_empty() {
        return DedupKey::Title(title);
    }
    DedupKey::SourceId(record.source, record.id.clone())
}

impl ResultAggregator {
    pub fn new(scorer: CompositeScorer) -> Self {
        Self { scorer }
    }

    /// Collapse duplicates across sources, preserving first-seen order.
    ///
    /// Idempotent: running the output back through changes nothing.
    pub fn deduplicate(&self, records: Vec<CanonicalRecord>) -> Vec<DedupedRecord> {
        let mut by_key: HashMap<DedupKey, usize> = HashMap::new();
        let mut deduped: Vec<DedupedRecord> = Vec::new();

        for record in records {
            let key = dedup_key(&record);
            match by_key.get(&key) {
                Some(&idx) => {
                    let seen_in = &mut deduped[idx].seen_in;
                    if !seen_in.contains(&record.source) {
                        seen_in.push(record.source);
                    }
                }
                None => {
                    by_key.insert(key, deduped.len());
                    deduped.push(DedupedRecord {
                        seen_in: vec![record.source],
                        record,
                    });
                }
            }
        }

        metrics::gauge!("paperscout_deduped_records").set(deduped.len() as f64);
        deduped
    }

    /// Rank deduplicated records by composite score.
    ///
    /// This is the embedding-free path: the semantic score is zero and
    /// the hybrid score is the composite score itself. Sorting is
    /// stable, so equal scores keep their first-seen order.
    pub fn rank(&self, deduped: Vec<DedupedRecord>, query: &str) -> Vec<RankedRecord> {
        let terms = query_terms(query);

        let mut ranked: Vec<RankedRecord> = deduped
            .into_iter()
            .map(|d| {
                let lexical = term_overlap(&terms, &d.record.title);
                let composite = self.scorer.score(&d.record, &terms);
                RankedRecord {
                    record: d.record,
                    seen_in: d.seen_in,
                    lexical_score: lexical,
                    semantic_score: 0.0,
                    hybrid_score: composite,
                    rank: 0,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.hybrid_score.total_cmp(&a.hybrid_score));
        for (i, r) in ranked.iter_mut().enumerate() {
            r.rank = i + 1;
        }
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompositeWeights, TrustWeights};
    use crate::models::test_support::record;

    fn aggregator() -> ResultAggregator {
        let scorer =
            CompositeScorer::new(CompositeWeights::default(), TrustWeights::default()).unwrap();
        ResultAggregator::new(scorer)
    }

    #[test]
    fn test_doi_wins_over_title() {
        let mut a = record(SourceName::SemanticScholar, "s1", "Paper A");
        a.doi = Some("10.1/X".to_string());
        let mut b = record(SourceName::Arxiv, "x1", "Completely Different Title");
        b.doi = Some("10.1/x".to_string());

        let deduped = aggregator().deduplicate(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        // First-seen record wins; both sources recorded
        assert_eq!(deduped[0].record.source, SourceName::SemanticScholar);
        assert_eq!(
            deduped[0].seen_in,
            vec![SourceName::SemanticScholar, SourceName::Arxiv]
        );
    }

    #[test]
    fn test_title_fallback_when_no_doi() {
        let a = record(SourceName::Arxiv, "x1", "Deep  Learning for NLP");
        let b = record(SourceName::PubMed, "p1", "deep learning for nlp");

        let deduped = aggregator().deduplicate(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].record.id, "x1");
    }

    #[test]
    fn test_distinct_records_survive() {
        let a = record(SourceName::Arxiv, "x1", "Paper One");
        let b = record(SourceName::Arxiv, "x2", "Paper Two");
        let c = record(SourceName::PubMed, "p1", "Paper Three");

        let deduped = aggregator().deduplicate(vec![a, b, c]);
        assert_eq!(deduped.len(), 3);
        assert!(deduped.iter().all(|d| d.seen_in.len() == 1));
    }

    #[test]
    fn test_same_source_duplicate_not_double_counted() {
        let a = record(SourceName::Arxiv, "x1", "Paper One");
        let b = record(SourceName::Arxiv, "x1b", "Paper One");

        let deduped = aggregator().deduplicate(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].seen_in, vec![SourceName::Arxiv]);
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let mut a = record(SourceName::SemanticScholar, "s1", "Paper A");
        a.doi = Some("10.1/a".to_string());
        let b = record(SourceName::Arxiv, "x1", "Paper B");
        let mut c = record(SourceName::PubMed, "p1", "Paper A variant");
        c.doi = Some("10.1/a".to_string());

        let agg = aggregator();
        let once = agg.deduplicate(vec![a, b, c]);
        let records: Vec<_> = once.iter().map(|d| d.record.clone()).collect();
        let twice = agg.deduplicate(records);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_empty_title_without_doi_keeps_both() {
        let a = record(SourceName::Arxiv, "x1", "");
        let b = record(SourceName::PubMed, "p1", "");

        let deduped = aggregator().deduplicate(vec![a, b]);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_rank_orders_and_numbers() {
        let mut cited = record(SourceName::SemanticScholar, "s1", "Atrial fibrillation study");
        cited.citation_count = Some(500);
        let uncited = record(SourceName::Arxiv, "x1", "Unrelated quantum paper");

        let agg = aggregator();
        let deduped = agg.deduplicate(vec![uncited, cited]);
        let ranked = agg.rank(deduped, "atrial fibrillation");

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].record.id, "s1");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert!(ranked[0].hybrid_score > ranked[1].hybrid_score);
        assert_eq!(ranked[0].semantic_score, 0.0);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let a = record(SourceName::Arxiv, "x1", "Same Title Alpha");
        let b = record(SourceName::Arxiv, "x2", "Same Title Alpha Two");

        let agg = aggregator();
        // Identical source, year, citations; scores tie on everything
        // except title overlap, so use a query matching neither.
        let ranked = agg.rank(agg.deduplicate(vec![a, b]), "zzz unmatched");
        assert_eq!(ranked[0].record.id, "x1");
        assert_eq!(ranked[1].record.id, "x2");
    }
}
