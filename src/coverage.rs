//! Coverage analysis
//!
//! Inspects a result set and reports where it is thin: expected
//! sources that returned nothing, multi-year gaps in the publication
//! timeline, query terms the top results never touch, and over-reliance
//! on a single source. The report is advisory; it never fails a run.

use crate::models::{DedupedRecord, SourceName};
use crate::ranking::query_terms;
use chrono::{Datelike, Utc};
use std::collections::{BTreeMap, HashSet};

/// A source contributing more than this share of results is flagged
const BIAS_THRESHOLD: f64 = 0.7;

/// Consecutive publication years further apart than this count as a gap
const MAX_YEAR_GAP: i32 = 3;

/// Publications within this many years count as recent
const RECENT_WINDOW: i32 = 2;

/// Query terms are checked against the titles of this many top records
const TOPIC_SAMPLE: usize = 10;

#[derive(Debug, Clone, serde::Serialize)]
pub struct CoverageReport {
    /// No analysis was possible (empty result set)
    pub insufficient_data: bool,

    /// Records attributed to each source, counting duplicate sightings
    pub per_source: BTreeMap<SourceName, usize>,

    /// Expected sources that contributed nothing
    pub missing_sources: Vec<SourceName>,

    /// Fraction of expected sources that contributed, in [0, 1]
    pub source_coverage: f64,

    /// Inclusive (min, max) publication years seen
    pub year_range: Option<(i32, i32)>,

    /// Record count per publication year
    pub year_histogram: BTreeMap<i32, usize>,

    /// (from, to) year pairs with nothing published in between
    pub year_gaps: Vec<(i32, i32)>,

    /// Records published within the recent window
    pub recent_count: usize,

    /// Set when a dated result set contains nothing recent
    pub no_recent_results: bool,

    /// Share of records held by the largest source, in [0, 1]
    pub dominant_share: f64,

    /// Set when one source exceeds the bias threshold
    pub dominant_source: Option<SourceName>,

    /// Query terms absent from the titles of the top results
    pub topic_gaps: Vec<String>,

    pub median_year: Option<i32>,

    /// Mean citation count over records that carry one
    pub average_citations: Option<f64>,
}

pub struct CoverageAnalyzer {
    expected: Vec<SourceName>,
}

impl CoverageAnalyzer {
    pub fn new(expected: Vec<SourceName>) -> Self {
        Self { expected }
    }

    pub fn analyze(&self, records: &[DedupedRecord], query: &str) -> CoverageReport {
        if records.is_empty() {
            return CoverageReport {
                insufficient_data: true,
                per_source: BTreeMap::new(),
                missing_sources: self.expected.clone(),
                source_coverage: 0.0,
                year_range: None,
                year_histogram: BTreeMap::new(),
                year_gaps: Vec::new(),
                recent_count: 0,
                no_recent_results: false,
                dominant_share: 0.0,
                dominant_source: None,
                topic_gaps: Vec::new(),
                median_year: None,
                average_citations: None,
            };
        }

        let mut per_source: BTreeMap<SourceName, usize> = BTreeMap::new();
        for d in records {
            for source in &d.seen_in {
                *per_source.entry(*source).or_default() += 1;
            }
        }

        let missing_sources: Vec<SourceName> = self
            .expected
            .iter()
            .filter(|s| !per_source.contains_key(s))
            .copied()
            .collect();
        let source_coverage = if self.expected.is_empty() {
            1.0
        } else {
            let present = self.expected.len() - missing_sources.len();
            present as f64 / self.expected.len() as f64
        };

        let mut year_histogram: BTreeMap<i32, usize> = BTreeMap::new();
        let mut years: Vec<i32> = Vec::new();
        for d in records {
            if let Some(y) = d.record.year {
                *year_histogram.entry(y).or_default() += 1;
                years.push(y);
            }
        }
        years.sort_unstable();

        let year_range = years
            .first()
            .zip(years.last())
            .map(|(min, max)| (*min, *max));
        let median_year = if years.is_empty() {
            None
        } else {
            Some(years[years.len() / 2])
        };

        let mut year_gaps = Vec::new();
        let distinct: Vec<i32> = year_histogram.keys().copied().collect();
        for pair in distinct.windows(2) {
            if pair[1] - pair[0] > MAX_YEAR_GAP {
                year_gaps.push((pair[0], pair[1]));
            }
        }

        let recent_floor = Utc::now().year() - RECENT_WINDOW;
        let recent_count = years.iter().filter(|y| **y >= recent_floor).count();
        // Undated records cannot prove staleness
        let no_recent_results = !years.is_empty() && recent_count == 0;

        // Bias is measured over sighting counts, so a record confirmed
        // by several sources strengthens each of them.
        let total_sightings: usize = per_source.values().sum();
        let (dominant_share, dominant_source) = per_source
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(source, count)| {
                let share = *count as f64 / total_sightings as f64;
                let biased = share > BIAS_THRESHOLD;
                (share, biased.then_some(*source))
            })
            .unwrap_or((0.0, None));

        // A query term the top titles never mention marks a facet the
        // run failed to cover.
        let mut title_terms: HashSet<String> = HashSet::new();
        for d in records.iter().take(TOPIC_SAMPLE) {
            title_terms.extend(query_terms(&d.record.title));
        }
        let topic_gaps: Vec<String> = query_terms(query)
            .into_iter()
            .filter(|t| !title_terms.contains(t))
            .collect();

        let cited: Vec<u32> = records
            .iter()
            .filter_map(|d| d.record.citation_count)
            .collect();
        let average_citations = if cited.is_empty() {
            None
        } else {
            Some(cited.iter().map(|c| *c as f64).sum::<f64>() / cited.len() as f64)
        };

        if let Some(source) = dominant_source {
            tracing::warn!(
                source = %source,
                share = dominant_share,
                "result set dominated by a single source"
            );
        }

        CoverageReport {
            insufficient_data: false,
            per_source,
            missing_sources,
            source_coverage,
            year_range,
            year_histogram,
            year_gaps,
            recent_count,
            no_recent_results,
            dominant_share,
            dominant_source,
            topic_gaps,
            median_year,
            average_citations,
        }
    }
}
