//! Configuration management for the search core
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{env}.toml)
//! - Default values
//!
//! Ranking weights are tunable policy, not hard contract, so they live
//! here rather than in code; `validate()` rejects weight sets that do
//! not sum to 1.0.

use crate::errors::{Result, SearchError};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const WEIGHT_EPSILON: f64 = 1e-6;

/// Main search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Per-source client configuration
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Ranking weight configuration
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Orchestration configuration
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default = "default_semantic_scholar")]
    pub semantic_scholar: SourceConfig,

    #[serde(default = "default_arxiv")]
    pub arxiv: SourceConfig,

    #[serde(default = "default_pubmed")]
    pub pubmed: SourceConfig,
}

/// Configuration for one external source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// API key or registered contact email, depending on the vendor
    pub api_key: Option<String>,

    /// Override for the vendor base URL (used in tests)
    pub base_url: Option<String>,

    /// Rate limit: maximum calls per window
    pub max_calls: usize,

    /// Rate limit: window length in seconds
    pub window_secs: f64,

    /// Per-request timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs_f64(self.window_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum retry attempts on transient errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds; doubled per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: "http" or "degraded"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the embedding backend
    pub api_key: Option<String>,

    /// Base URL for an OpenAI-compatible embeddings endpoint
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected embedding dimension; responses with any other
    /// dimension are rejected
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Bounded cache capacity (entries)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Ranking weights. All weight groups must sum to 1.0.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    /// Hybrid blend: semantic signal weight
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,

    /// Hybrid blend: lexical signal weight
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,

    /// Composite score split
    #[serde(default)]
    pub composite: CompositeWeights,

    /// Per-source trust weights in [0, 1]
    #[serde(default)]
    pub trust: TrustWeights,
}

/// Composite relevance score split (citation / recency / trust / title)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompositeWeights {
    pub citation: f64,
    pub recency: f64,
    pub source_trust: f64,
    pub title_match: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            citation: 0.3,
            recency: 0.2,
            source_trust: 0.2,
            title_match: 0.3,
        }
    }
}

impl CompositeWeights {
    pub fn sum(&self) -> f64 {
        self.citation + self.recency + self.source_trust + self.title_match
    }
}

/// Per-source trust weights, normalized to [0, 1]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrustWeights {
    pub semantic_scholar: f64,
    pub pubmed: f64,
    pub arxiv: f64,
    pub local_corpus: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        // Citation-backed sources rank slightly above preprints
        Self {
            semantic_scholar: 1.0,
            pubmed: 0.92,
            arxiv: 0.83,
            local_corpus: 0.83,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Maximum source calls in flight at once
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Per-source-call timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Run-level deadline in seconds when the request carries none
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl WorkflowConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

// Default value functions
fn default_enabled() -> bool { true }
fn default_source_timeout() -> u64 { 15 }
fn default_max_retries() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 250 }
fn default_embedding_provider() -> String { "http".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_cache_capacity() -> usize { 1000 }
fn default_batch_size() -> usize { 64 }
fn default_semantic_weight() -> f64 { 0.7 }
fn default_lexical_weight() -> f64 { 0.3 }
fn default_max_in_flight() -> usize { 4 }
fn default_call_timeout() -> u64 { 20 }
fn default_run_timeout() -> u64 { 60 }

// Vendor quotas: Semantic Scholar allows 1 req/s without a key,
// arXiv asks for one call every 3 seconds, NCBI allows 3 req/s.
fn default_semantic_scholar() -> SourceConfig {
    SourceConfig {
        enabled: true,
        api_key: None,
        base_url: None,
        max_calls: 1,
        window_secs: 1.0,
        timeout_secs: default_source_timeout(),
    }
}

fn default_arxiv() -> SourceConfig {
    SourceConfig {
        enabled: true,
        api_key: None,
        base_url: None,
        max_calls: 1,
        window_secs: 3.0,
        timeout_secs: default_source_timeout(),
    }
}

fn default_pubmed() -> SourceConfig {
    SourceConfig {
        enabled: true,
        api_key: None,
        base_url: None,
        max_calls: 3,
        window_secs: 1.0,
        timeout_secs: default_source_timeout(),
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            semantic_scholar: default_semantic_scholar(),
            arxiv: default_arxiv(),
            pubmed: default_pubmed(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            cache_capacity: default_cache_capacity(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
            composite: CompositeWeights::default(),
            trust: TrustWeights::default(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            call_timeout_secs: default_call_timeout(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            retry: RetryConfig::default(),
            embedding: EmbeddingConfig::default(),
            ranking: RankingConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__EMBEDDING__DIMENSION=1536
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject weight sets that do not sum to 1.0. Weights are never
    /// silently renormalized.
    pub fn validate(&self) -> Result<()> {
        let hybrid_sum = self.ranking.semantic_weight + self.ranking.lexical_weight;
        if (hybrid_sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(SearchError::InvalidWeights { sum: hybrid_sum });
        }

        let composite_sum = self.ranking.composite.sum();
        if (composite_sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(SearchError::InvalidWeights { sum: composite_sum });
        }

        if self.embedding.dimension == 0 {
            return Err(SearchError::Configuration {
                message: "embedding.dimension must be non-zero".to_string(),
            });
        }

        if self.workflow.max_in_flight == 0 {
            return Err(SearchError::Configuration {
                message: "workflow.max_in_flight must be non-zero".to_string(),
            });
        }

        // The limiter constructor takes these on trust
        let sources = [
            ("semantic_scholar", &self.sources.semantic_scholar),
            ("arxiv", &self.sources.arxiv),
            ("pubmed", &self.sources.pubmed),
        ];
        for (name, source) in sources {
            if source.max_calls == 0 {
                return Err(SearchError::Configuration {
                    message: format!("sources.{name}.max_calls must be non-zero"),
                });
            }
            if !source.window_secs.is_finite() || source.window_secs <= 0.0 {
                return Err(SearchError::Configuration {
                    message: format!(
                        "sources.{name}.window_secs must be a positive finite number"
                    ),
                });
            }
        }

        Ok(())
    }
}
