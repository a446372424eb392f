//! Local corpus source
//!
//! In-memory index over records the operator already holds (prior
//! exports, curated reading lists). Participates in the fan-out as a
//! regular source so its records dedupe and rank alongside remote
//! results. No rate limiter; there is no vendor to protect.

use super::{apply_filters, SourceClient};
use crate::errors::Result;
use crate::models::{CanonicalRecord, SearchFilters, SourceName};
use crate::ranking::{query_terms, term_overlap};
use async_trait::async_trait;
use std::path::Path;

pub struct LocalCorpusIndex {
    records: Vec<CanonicalRecord>,
}

impl LocalCorpusIndex {
    pub fn new(mut records: Vec<CanonicalRecord>) -> Self {
        for record in &mut records {
            record.source = SourceName::LocalCorpus;
        }
        Self { records }
    }

    /// Load a corpus from a JSON array of canonical records
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(anyhow::Error::from)?;
        let records: Vec<CanonicalRecord> = serde_json::from_str(&raw)?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SourceClient for LocalCorpusIndex {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CanonicalRecord>> {
        let terms = query_terms(query);

        let mut scored: Vec<(f32, &CanonicalRecord)> = self
            .records
            .iter()
            .map(|r| (term_overlap(&terms, &r.embedding_text()), r))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let hits = scored.into_iter().map(|(_, r)| r.clone()).collect();
        Ok(apply_filters(hits, limit, filters))
    }

    fn name(&self) -> SourceName {
        SourceName::LocalCorpus
    }
}
