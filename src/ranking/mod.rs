//! Relevance ranking
//!
//! Two scorers share this module:
//! - `HybridRanker` blends a lexical and a semantic signal with a
//!   tunable weight split
//! - `CompositeScorer` combines citation, recency, source-trust, and
//!   title-overlap contributions when embeddings are unavailable

mod composite;
mod hybrid;

pub use composite::CompositeScorer;
pub use hybrid::HybridRanker;

/// Min-max normalize scores to [0, 1].
///
/// A constant array normalizes to all ones: equal inputs carry equal,
/// maximal weight rather than collapsing to zero.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

/// Lowercased query terms, short tokens dropped
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| {
            t.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|t| t.len() > 2)
        .collect()
}

/// Fraction of query terms appearing in `text`, in [0, 1]
pub fn term_overlap(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();
    let matches = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    matches as f32 / terms.len() as f32
}
