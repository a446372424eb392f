//! Embedding generation
//!
//! Provides a unified interface over embedding backends:
//! - `HttpEmbedder`: OpenAI-compatible HTTP endpoint
//! - `DegradedEmbedder`: deterministic pseudo-random vectors for when
//!   no backend is available, always clearly flagged
//!
//! `EmbeddingProvider` wraps a backend with a bounded cache keyed by
//! exact text match. Returned dimensionality is validated and any
//! mismatch fails loudly; vectors are never truncated or padded.

use crate::config::EmbeddingConfig;
use crate::errors::{Result, SearchError};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model name
    fn model_name(&self) -> &str;

    /// Fixed embedding dimension
    fn dimension(&self) -> usize;

    /// True when this backend fabricates vectors instead of calling a
    /// real model. Degraded output must never be mixed with real
    /// embeddings in the same ranking pass.
    fn degraded(&self) -> bool {
        false
    }
}

/// OpenAI-compatible HTTP embedding client
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SearchError::Configuration {
                message: "embedding.api_key required for the http provider".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            batch_size: config.batch_size.max(1),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Embedding {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbeddingResponse =
            response.json().await.map_err(|e| SearchError::Embedding {
                message: format!("failed to parse response: {}", e),
            })?;

        if result.data.len() != texts.len() {
            return Err(SearchError::Embedding {
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    result.data.len()
                ),
            });
        }

        let vectors: Vec<Vec<f32>> = result.data.into_iter().map(|e| e.embedding).collect();
        for v in &vectors {
            if v.len() != self.dimension {
                return Err(SearchError::DimensionMismatch {
                    expected: self.dimension,
                    actual: v.len(),
                });
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.request(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding {
                message: "empty response".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            all.extend(self.request(chunk).await?);
        }
        Ok(all)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic stand-in backend for when no embedding model is
/// reachable. The same text always maps to the same vector (seeded
/// from its SHA-256 digest), so ranking stays reproducible, but the
/// scores carry no semantic meaning and callers must surface the
/// degraded flag.
pub struct DegradedEmbedder {
    dimension: usize,
}

impl DegradedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        let mut rng = StdRng::from_seed(seed);
        (0..self.dimension).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }
}

#[async_trait]
impl Embedder for DegradedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "degraded-deterministic"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn degraded(&self) -> bool {
        true
    }
}

/// Bounded embedding cache, oldest entry evicted at capacity
struct BoundedCache {
    capacity: usize,
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl BoundedCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: Vec<f32>) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Embedding backend plus a bounded in-process cache.
///
/// The cache is internally synchronized; multiple source calls may
/// embed concurrently against one shared provider.
pub struct EmbeddingProvider {
    backend: Arc<dyn Embedder>,
    cache: Mutex<BoundedCache>,
}

impl EmbeddingProvider {
    pub fn new(backend: Arc<dyn Embedder>, cache_capacity: usize) -> Self {
        Self {
            backend,
            cache: Mutex::new(BoundedCache::new(cache_capacity)),
        }
    }

    /// Build a provider from configuration. Unknown providers degrade
    /// with a warning rather than crash, but the degraded flag is set.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let backend: Arc<dyn Embedder> = match config.provider.as_str() {
            "http" => Arc::new(HttpEmbedder::new(config)?),
            "degraded" => Arc::new(DegradedEmbedder::new(config.dimension)),
            other => {
                tracing::warn!(provider = other, "unknown embedding provider, degrading");
                Arc::new(DegradedEmbedder::new(config.dimension))
            }
        };
        Ok(Self::new(backend, config.cache_capacity))
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn degraded(&self) -> bool {
        self.backend.degraded()
    }

    fn cache_key(&self, text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        format!("{}:{}", self.backend.model_name(), hex::encode(digest))
    }

    /// Embed one text, consulting the cache first
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = self.cache_key(text);
        {
            let cache = self.cache.lock().await;
            if let Some(hit) = cache.get(&key) {
                metrics::counter!("paperscout_embedding_cache_hits_total").increment(1);
                return Ok(hit);
            }
        }

        let vector = self.backend.embed(text).await?;
        self.check_dimension(&vector)?;

        let mut cache = self.cache.lock().await;
        cache.insert(key, vector.clone());
        Ok(vector)
    }

    /// Embed many texts, only calling the backend for cache misses.
    /// Output order matches input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses: Vec<(usize, String)> = Vec::new();

        {
            let cache = self.cache.lock().await;
            for (i, text) in texts.iter().enumerate() {
                match cache.get(&self.cache_key(text)) {
                    Some(hit) => results[i] = Some(hit),
                    None => misses.push((i, text.clone())),
                }
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            let vectors = self.backend.embed_batch(&miss_texts).await?;
            if vectors.len() != miss_texts.len() {
                return Err(SearchError::Embedding {
                    message: format!(
                        "backend returned {} embeddings for {} texts",
                        vectors.len(),
                        miss_texts.len()
                    ),
                });
            }

            let mut cache = self.cache.lock().await;
            for ((i, text), vector) in misses.into_iter().zip(vectors) {
                self.check_dimension(&vector)?;
                cache.insert(self.cache_key(&text), vector.clone());
                results[i] = Some(vector);
            }
        }

        Ok(results
            .into_iter()
            .map(|v| v.expect("every slot filled by cache or backend"))
            .collect())
    }

    /// Cached entry count (diagnostics only)
    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.backend.dimension() {
            return Err(SearchError::DimensionMismatch {
                expected: self.backend.dimension(),
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that counts calls and returns constant vectors
    struct CountingEmbedder {
        dimension: usize,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.5; self.dimension])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![vec![0.5; self.dimension]; texts.len()])
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let backend = Arc::new(CountingEmbedder::new(8));
        let provider = EmbeddingProvider::new(backend.clone(), 100);

        provider.embed("atrial fibrillation").await.unwrap();
        provider.embed("atrial fibrillation").await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.cache_len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_evicts_oldest_at_capacity() {
        let backend = Arc::new(CountingEmbedder::new(4));
        let provider = EmbeddingProvider::new(backend.clone(), 2);

        provider.embed("one").await.unwrap();
        provider.embed("two").await.unwrap();
        provider.embed("three").await.unwrap();
        assert_eq!(provider.cache_len().await, 2);

        // "one" was evicted, so this is a fresh backend call
        let before = backend.calls.load(Ordering::SeqCst);
        provider.embed("one").await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn test_batch_only_fetches_misses() {
        let backend = Arc::new(CountingEmbedder::new(4));
        let provider = EmbeddingProvider::new(backend.clone(), 100);

        provider.embed("cached").await.unwrap();
        let texts = vec!["cached".to_string(), "fresh".to_string()];
        let vectors = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        // One single call plus one batch call for the miss
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_loudly() {
        struct WrongDimension;

        #[async_trait]
        impl Embedder for WrongDimension {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![0.0; 4])
            }
            async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(vec![vec![0.0; 4]; texts.len()])
            }
            fn model_name(&self) -> &str {
                "wrong"
            }
            fn dimension(&self) -> usize {
                768
            }
        }

        let provider = EmbeddingProvider::new(Arc::new(WrongDimension), 10);
        assert!(matches!(
            provider.embed("text").await,
            Err(SearchError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_degraded_embedder_is_deterministic_and_flagged() {
        let embedder = DegradedEmbedder::new(16);
        let a = embedder.embed("same text").await.unwrap();
        let b = embedder.embed("same text").await.unwrap();
        let c = embedder.embed("other text").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(embedder.degraded());
    }

    #[tokio::test]
    async fn test_unknown_provider_degrades_with_flag() {
        let config = EmbeddingConfig {
            provider: "mystery".to_string(),
            ..EmbeddingConfig::default()
        };
        let provider = EmbeddingProvider::from_config(&config).unwrap();
        assert!(provider.degraded());
    }
}
