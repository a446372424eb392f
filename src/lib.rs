//! paperscout: multi-source scholarly literature search
//!
//! Fans a query out to several literature sources in parallel,
//! normalizes and deduplicates the results, ranks them with a hybrid
//! semantic/lexical blend (or a composite fallback when embeddings are
//! unavailable), and reports coverage gaps in what came back.
//!
//! ```no_run
//! use paperscout::{SearchConfig, SearchRequest, WorkflowOrchestrator};
//!
//! # async fn run() -> paperscout::Result<()> {
//! let config = SearchConfig::default();
//! let orchestrator = WorkflowOrchestrator::from_config(&config)?;
//! let result = orchestrator
//!     .run(SearchRequest {
//!         query: "atrial fibrillation detection".to_string(),
//!         ..SearchRequest::default()
//!     })
//!     .await?;
//! println!("{} results", result.records.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod coverage;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod progress;
pub mod ranking;
pub mod ratelimit;
pub mod retry;
pub mod similarity;
pub mod sources;
pub mod telemetry;
pub mod workflow;

pub use aggregate::ResultAggregator;
pub use config::SearchConfig;
pub use coverage::{CoverageAnalyzer, CoverageReport};
pub use embeddings::{Embedder, EmbeddingProvider};
pub use errors::{Result, SearchError};
pub use models::{
    CanonicalRecord, DedupedRecord, RankedRecord, SearchFilters, SearchRequest, SourceError,
    SourceName,
};
pub use progress::{WorkflowRun, WorkflowStage};
pub use ranking::{CompositeScorer, HybridRanker};
pub use retry::RetryPolicy;
pub use sources::{LocalCorpusIndex, SourceClient};
pub use workflow::{SearchRunResult, WorkflowOrchestrator};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
