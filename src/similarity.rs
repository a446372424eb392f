//! Vector similarity primitives
//!
//! Pure functions, no state. Mismatched dimensions are rejected with a
//! hard error; cosine similarity against a zero vector is defined as 0.

use crate::errors::{Result, SearchError};

fn check_dims(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(SearchError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Dot product of two equal-length vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dims(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Cosine similarity in [-1, 1]; 0 when either vector is zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dims(a, b)?;
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return Ok(0.0);
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Ok(dot / (na * nb))
}

/// Cosine similarity of one query against many documents.
///
/// The query is normalized once up front rather than per document.
pub fn batch_cosine_similarity(query: &[f32], docs: &[Vec<f32>]) -> Result<Vec<f32>> {
    let qnorm = norm(query);
    if qnorm == 0.0 {
        return Ok(vec![0.0; docs.len()]);
    }
    let normalized_query: Vec<f32> = query.iter().map(|x| x / qnorm).collect();

    docs.iter()
        .map(|doc| {
            check_dims(query, doc)?;
            let dnorm = norm(doc);
            if dnorm == 0.0 {
                return Ok(0.0);
            }
            let dot: f32 = normalized_query.iter().zip(doc).map(|(x, y)| x * y).sum();
            Ok(dot / dnorm)
        })
        .collect()
}

/// Euclidean distance between two equal-length vectors
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dims(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_similarity(&a, &b).unwrap()).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&b, &a).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            cosine_similarity(&a, &b),
            Err(SearchError::DimensionMismatch { .. })
        ));
        assert!(euclidean_distance(&a, &b).is_err());
        assert!(dot_product(&a, &b).is_err());
    }

    #[test]
    fn test_batch_matches_pairwise() {
        let query = vec![0.3, 0.7, 0.1];
        let docs = vec![
            vec![0.3, 0.7, 0.1],
            vec![1.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0],
        ];
        let batch = batch_cosine_similarity(&query, &docs).unwrap();
        for (doc, got) in docs.iter().zip(&batch) {
            let want = cosine_similarity(&query, doc).unwrap();
            assert!((want - got).abs() < 1e-6);
        }
    }

    #[test]
    fn test_batch_zero_query() {
        let query = vec![0.0, 0.0];
        let docs = vec![vec![1.0, 1.0], vec![2.0, 0.5]];
        assert_eq!(batch_cosine_similarity(&query, &docs).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_batch_mismatched_doc_rejected() {
        let query = vec![1.0, 0.0];
        let docs = vec![vec![1.0, 0.0, 0.0]];
        assert!(batch_cosine_similarity(&query, &docs).is_err());
    }

    #[test]
    fn test_euclidean_distance() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((euclidean_distance(&a, &b).unwrap() - 5.0).abs() < 1e-6);
    }
}
