//! Hybrid score blending
//!
//! Combines a semantic and a lexical signal into one ordering. Both
//! inputs are min-max normalized before blending so neither signal
//! dominates purely due to scale.

use super::min_max_normalize;
use crate::errors::{Result, SearchError};

const WEIGHT_EPSILON: f64 = 1e-6;

/// Blends semantic and lexical scores with a fixed weight split
#[derive(Debug, Clone)]
pub struct HybridRanker {
    semantic_weight: f32,
    lexical_weight: f32,
}

impl Default for HybridRanker {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            lexical_weight: 0.3,
        }
    }
}

impl HybridRanker {
    /// Construction fails unless the weights sum to 1.0 (within
    /// epsilon). Weights are never silently normalized.
    pub fn new(semantic_weight: f64, lexical_weight: f64) -> Result<Self> {
        let sum = semantic_weight + lexical_weight;
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(SearchError::InvalidWeights { sum });
        }
        Ok(Self {
            semantic_weight: semantic_weight as f32,
            lexical_weight: lexical_weight as f32,
        })
    }

    /// Blend two equally-long score arrays into hybrid scores in [0, 1]
    pub fn combine(&self, semantic: &[f32], lexical: &[f32]) -> Result<Vec<f32>> {
        if semantic.len() != lexical.len() {
            return Err(SearchError::LengthMismatch {
                left: semantic.len(),
                right: lexical.len(),
            });
        }

        let semantic = min_max_normalize(semantic);
        let lexical = min_max_normalize(lexical);

        Ok(semantic
            .iter()
            .zip(&lexical)
            .map(|(s, l)| self.semantic_weight * s + self.lexical_weight * l)
            .collect())
    }

    /// Order items descending by score.
    ///
    /// The sort is stable: equal scores keep their input order, which
    /// makes re-runs against frozen data reproduce identical output.
    pub fn rank<T>(&self, items: Vec<T>, scores: &[f32]) -> Result<Vec<(T, f32)>> {
        if items.len() != scores.len() {
            return Err(SearchError::LengthMismatch {
                left: items.len(),
                right: scores.len(),
            });
        }

        let mut paired: Vec<(T, f32)> = items.into_iter().zip(scores.iter().copied()).collect();
        paired.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(paired)
    }
}
