//! Metric registration
//!
//! All metrics share the `paperscout` prefix. Call `register_metrics()`
//! once at startup so exporters pick up units and descriptions; the
//! recording sites work without it.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

pub const METRICS_PREFIX: &str = "paperscout";

pub fn register_metrics() {
    describe_counter!(
        format!("{}_searches_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search runs started"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end search run latency in seconds"
    );

    describe_counter!(
        format!("{}_source_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Source call failures after retries, labeled by source"
    );

    describe_gauge!(
        format!("{}_deduped_records", METRICS_PREFIX),
        Unit::Count,
        "Record count after cross-source deduplication"
    );

    describe_counter!(
        format!("{}_embedding_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Embedding requests served from the bounded cache"
    );
}
