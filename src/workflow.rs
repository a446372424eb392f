//! Search workflow orchestration
//!
//! Drives one query through the full pipeline: bounded parallel
//! fan-out to the source clients, aggregation, ranking, and coverage
//! analysis. Failure of individual sources degrades the run instead of
//! failing it; the run fails only when every source comes back empty
//! with an error. The run-level deadline is honored gracefully: work
//! already completed when it expires is kept and the result is marked
//! as timed out.

use crate::aggregate::ResultAggregator;
use crate::config::SearchConfig;
use crate::coverage::{CoverageAnalyzer, CoverageReport};
use crate::embeddings::EmbeddingProvider;
use crate::errors::{Result, SearchError};
use crate::models::{
    CanonicalRecord, DedupedRecord, RankedRecord, SearchRequest, SourceError, SourceName,
};
use crate::progress::{WorkflowRun, WorkflowStage};
use crate::ranking::{query_terms, term_overlap, CompositeScorer, HybridRanker};
use crate::retry::RetryPolicy;
use crate::similarity::batch_cosine_similarity;
use crate::sources::{
    ArxivClient, LocalCorpusIndex, PubMedClient, SemanticScholarClient, SourceClient,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Everything one run produced, including partial output from runs
/// that hit the deadline.
#[derive(Debug)]
pub struct SearchRunResult {
    pub run: WorkflowRun,
    pub records: Vec<RankedRecord>,
    pub coverage: CoverageReport,
    pub errors: Vec<SourceError>,
    pub timed_out: bool,
    /// Ranking fell back to the composite score (no usable embeddings)
    pub composite_fallback: bool,
}

pub struct WorkflowOrchestrator {
    clients: HashMap<SourceName, Arc<dyn SourceClient>>,
    retry: RetryPolicy,
    embeddings: Option<Arc<EmbeddingProvider>>,
    aggregator: ResultAggregator,
    hybrid: HybridRanker,
    max_in_flight: usize,
    call_timeout: Duration,
    default_run_timeout: Duration,
}

impl WorkflowOrchestrator {
    pub fn new(
        clients: Vec<Arc<dyn SourceClient>>,
        retry: RetryPolicy,
        embeddings: Option<Arc<EmbeddingProvider>>,
        aggregator: ResultAggregator,
        hybrid: HybridRanker,
        max_in_flight: usize,
        call_timeout: Duration,
        default_run_timeout: Duration,
    ) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.name(), c)).collect(),
            retry,
            embeddings,
            aggregator,
            hybrid,
            max_in_flight: max_in_flight.max(1),
            call_timeout,
            default_run_timeout,
        }
    }

    /// Assemble the orchestrator from validated configuration.
    ///
    /// An embedding backend that cannot be constructed downgrades the
    /// run to composite ranking rather than blocking startup.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        config.validate()?;

        let mut clients: Vec<Arc<dyn SourceClient>> = Vec::new();
        if config.sources.semantic_scholar.enabled {
            clients.push(Arc::new(SemanticScholarClient::new(
                &config.sources.semantic_scholar,
            )?));
        }
        if config.sources.arxiv.enabled {
            clients.push(Arc::new(ArxivClient::new(&config.sources.arxiv)?));
        }
        if config.sources.pubmed.enabled {
            clients.push(Arc::new(PubMedClient::new(&config.sources.pubmed)?));
        }

        let embeddings = match EmbeddingProvider::from_config(&config.embedding) {
            Ok(provider) => Some(Arc::new(provider)),
            Err(e) => {
                tracing::warn!(error = %e, "embedding backend unavailable, using composite ranking");
                None
            }
        };

        let scorer =
            CompositeScorer::new(config.ranking.composite.clone(), config.ranking.trust.clone())?;
        let hybrid =
            HybridRanker::new(config.ranking.semantic_weight, config.ranking.lexical_weight)?;

        Ok(Self::new(
            clients,
            RetryPolicy::from_config(&config.retry),
            embeddings,
            ResultAggregator::new(scorer),
            hybrid,
            config.workflow.max_in_flight,
            config.workflow.call_timeout(),
            config.workflow.run_timeout(),
        ))
    }

    /// Register a local corpus as an additional source
    pub fn with_local_corpus(mut self, corpus: LocalCorpusIndex) -> Self {
        self.clients
            .insert(SourceName::LocalCorpus, Arc::new(corpus));
        self
    }

    /// Execute one search run end to end.
    ///
    /// Returns `Err` only for invalid input or when every source failed
    /// and nothing was retrieved; per-source failures otherwise land in
    /// `SearchRunResult::errors`.
    pub async fn run(&self, request: SearchRequest) -> Result<SearchRunResult> {
        let mut run = WorkflowRun::new(request.query.clone());
        let started = tokio::time::Instant::now();
        metrics::counter!("paperscout_searches_total").increment(1);

        let query = request.query.trim().to_string();
        if query.is_empty() {
            run.advance(WorkflowStage::Failed);
            return Err(SearchError::InvalidQuery {
                message: "query must not be empty".to_string(),
            });
        }

        let (targets, skipped) = self.select_sources(&request)?;
        let deadline = started
            + if request.timeout.is_zero() {
                self.default_run_timeout
            } else {
                request.timeout
            };

        run.advance(WorkflowStage::Dispatching);
        run.start_step("dispatch");
        let (records, mut source_errors, timed_out) =
            self.dispatch(&targets, &query, &request, deadline).await;
        run.complete_step(Some(records.len()));

        let all_failed = records.is_empty() && source_errors.len() == targets.len();

        for source in &skipped {
            source_errors.push(SourceError {
                source: *source,
                message: SearchError::SourceUnavailable {
                    source_name: *source,
                }
                .to_string(),
            });
        }
        for e in &source_errors {
            run.record_error("dispatch", Some(e.source), e.message.clone());
            metrics::counter!("paperscout_source_errors_total", "source" => e.source.as_str())
                .increment(1);
        }

        if all_failed {
            run.advance(WorkflowStage::Failed);
            tracing::error!(run_id = %run.id, "every source failed, nothing to aggregate");
            return Err(SearchError::NoSourcesAvailable);
        }

        run.advance(WorkflowStage::Aggregating);
        run.start_step("aggregate");
        let deduped = self.aggregator.deduplicate(records);
        run.complete_step(Some(deduped.len()));

        run.advance(WorkflowStage::Ranking);
        run.start_step("rank");
        let (mut ranked, composite_fallback) = self.rank(&mut run, deduped, &query).await;
        if let Some(min) = request.filters.min_score {
            ranked.retain(|r| r.hybrid_score >= min);
        }
        ranked.truncate(request.limit);
        for (i, r) in ranked.iter_mut().enumerate() {
            r.rank = i + 1;
        }
        run.complete_step(Some(ranked.len()));

        run.advance(WorkflowStage::Analyzing);
        run.start_step("coverage");
        // Coverage describes what the caller actually receives, so it
        // runs over the ranked set after score and limit cuts.
        let analyzed: Vec<DedupedRecord> = ranked
            .iter()
            .map(|r| DedupedRecord {
                record: r.record.clone(),
                seen_in: r.seen_in.clone(),
            })
            .collect();
        let mut expected = targets.clone();
        expected.extend(skipped.iter().copied());
        let coverage = CoverageAnalyzer::new(expected).analyze(&analyzed, &query);
        run.complete_step(None);

        run.advance(WorkflowStage::Done);
        let elapsed = started.elapsed();
        metrics::histogram!("paperscout_search_duration_seconds").record(elapsed.as_secs_f64());
        tracing::info!(
            run_id = %run.id,
            results = ranked.len(),
            errors = source_errors.len(),
            timed_out,
            elapsed_ms = elapsed.as_millis() as u64,
            "search run complete"
        );

        Ok(SearchRunResult {
            run,
            records: ranked,
            coverage,
            errors: source_errors,
            timed_out,
            composite_fallback,
        })
    }

    /// Resolve the request's source list against configured clients.
    ///
    /// Returns the sources to dispatch plus the requested-but-unconfigured
    /// ones, which get skipped and reported rather than failing the run.
    /// Errors only when not a single requested source is configured.
    fn select_sources(&self, request: &SearchRequest) -> Result<(Vec<SourceName>, Vec<SourceName>)> {
        if request.sources.is_empty() {
            let mut all: Vec<SourceName> = self.clients.keys().copied().collect();
            all.sort();
            if all.is_empty() {
                return Err(SearchError::NoSourcesAvailable);
            }
            return Ok((all, Vec::new()));
        }

        let mut available = Vec::new();
        let mut skipped = Vec::new();
        for source in &request.sources {
            if self.clients.contains_key(source) {
                available.push(*source);
            } else {
                tracing::warn!(source = %source, "requested source not configured, skipping");
                skipped.push(*source);
            }
        }
        if available.is_empty() {
            return Err(SearchError::NoSourcesAvailable);
        }
        Ok((available, skipped))
    }

    /// Fan out to the selected sources with bounded parallelism.
    ///
    /// Each call is retried per policy and bounded by the per-call
    /// timeout. When the run deadline expires, in-flight calls are
    /// aborted and whatever already finished is returned.
    async fn dispatch(
        &self,
        targets: &[SourceName],
        query: &str,
        request: &SearchRequest,
        deadline: tokio::time::Instant,
    ) -> (Vec<CanonicalRecord>, Vec<SourceError>, bool) {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut set: JoinSet<(SourceName, Result<Vec<CanonicalRecord>>)> = JoinSet::new();

        for source in targets {
            let source = *source;
            let client = Arc::clone(&self.clients[&source]);
            let semaphore = Arc::clone(&semaphore);
            let retry = self.retry.clone();
            let call_timeout = self.call_timeout;
            let query = query.to_string();
            let limit = request.limit;
            let filters = request.filters.clone();

            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (source, Err(SearchError::NoSourcesAvailable)),
                };
                let result = retry
                    .run_search(source, || {
                        let client = Arc::clone(&client);
                        let query = query.clone();
                        let filters = filters.clone();
                        async move {
                            tokio::time::timeout(
                                call_timeout,
                                client.search(&query, limit, &filters),
                            )
                            .await
                            .unwrap_or(Err(SearchError::Timeout {
                                source_name: source,
                                timeout_ms: call_timeout.as_millis() as u64,
                            }))
                        }
                    })
                    .await;
                (source, result)
            });
        }

        let mut records = Vec::new();
        let mut errors = Vec::new();
        let mut timed_out = false;

        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(joined)) => absorb(joined, &mut records, &mut errors),
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    set.abort_all();
                    // Keep anything that finished between the last join
                    // and the deadline firing.
                    while let Some(joined) = set.try_join_next() {
                        absorb(joined, &mut records, &mut errors);
                    }
                    tracing::warn!(
                        collected = records.len(),
                        "run deadline expired, returning partial results"
                    );
                    break;
                }
            }
        }

        (records, errors, timed_out)
    }

    /// Rank deduplicated records, preferring the hybrid path.
    ///
    /// Any embedding failure downgrades to the composite path for this
    /// run; the failure is recorded but never aborts the search.
    async fn rank(
        &self,
        run: &mut WorkflowRun,
        deduped: Vec<DedupedRecord>,
        query: &str,
    ) -> (Vec<RankedRecord>, bool) {
        if let Some(provider) = &self.embeddings {
            match self.rank_hybrid(provider, &deduped, query).await {
                Ok(ranked) => return (ranked, false),
                Err(e) => {
                    tracing::warn!(error = %e, "hybrid ranking failed, falling back to composite");
                    run.record_error("rank", None, e.to_string());
                }
            }
        }
        (self.aggregator.rank(deduped, query), true)
    }

    async fn rank_hybrid(
        &self,
        provider: &EmbeddingProvider,
        deduped: &[DedupedRecord],
        query: &str,
    ) -> Result<Vec<RankedRecord>> {
        if deduped.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = deduped.iter().map(|d| d.record.embedding_text()).collect();
        let query_vec = provider.embed(query).await?;
        let doc_vecs = provider.embed_batch(&texts).await?;
        let semantic = batch_cosine_similarity(&query_vec, &doc_vecs)?;

        let terms = query_terms(query);
        let lexical: Vec<f32> = deduped
            .iter()
            .map(|d| term_overlap(&terms, &d.record.title))
            .collect();

        let hybrid = self.hybrid.combine(&semantic, &lexical)?;

        let mut ranked: Vec<RankedRecord> = deduped
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, d)| RankedRecord {
                record: d.record,
                seen_in: d.seen_in,
                lexical_score: lexical[i],
                semantic_score: semantic[i],
                hybrid_score: hybrid[i],
                rank: 0,
            })
            .collect();
        ranked.sort_by(|a, b| b.hybrid_score.total_cmp(&a.hybrid_score));
        for (i, r) in ranked.iter_mut().enumerate() {
            r.rank = i + 1;
        }
        Ok(ranked)
    }
}

fn absorb(
    joined: std::result::Result<(SourceName, Result<Vec<CanonicalRecord>>), tokio::task::JoinError>,
    records: &mut Vec<CanonicalRecord>,
    errors: &mut Vec<SourceError>,
) {
    match joined {
        Ok((source, Ok(mut found))) => {
            tracing::debug!(source = %source, count = found.len(), "source completed");
            records.append(&mut found);
        }
        Ok((source, Err(e))) => {
            errors.push(SourceError {
                source,
                message: e.to_string(),
            });
        }
        Err(join_err) if join_err.is_cancelled() => {}
        Err(join_err) => {
            tracing::error!(error = %join_err, "source task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompositeWeights, TrustWeights};
    use crate::embeddings::DegradedEmbedder;
    use crate::models::test_support::record;
    use crate::models::SearchFilters;
    use async_trait::async_trait;

    struct StubSource {
        name: SourceName,
        records: Vec<CanonicalRecord>,
        fail: bool,
        delay: Duration,
    }

    impl StubSource {
        fn ok(name: SourceName, records: Vec<CanonicalRecord>) -> Arc<dyn SourceClient> {
            Arc::new(Self {
                name,
                records,
                fail: false,
                delay: Duration::ZERO,
            })
        }

        fn failing(name: SourceName) -> Arc<dyn SourceClient> {
            Arc::new(Self {
                name,
                records: vec![],
                fail: true,
                delay: Duration::ZERO,
            })
        }

        fn slow(
            name: SourceName,
            records: Vec<CanonicalRecord>,
            delay: Duration,
        ) -> Arc<dyn SourceClient> {
            Arc::new(Self {
                name,
                records,
                fail: false,
                delay,
            })
        }
    }

    #[async_trait]
    impl SourceClient for StubSource {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
            _filters: &SearchFilters,
        ) -> Result<Vec<CanonicalRecord>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SearchError::Rejected {
                    source_name: self.name,
                    message: "bad request".into(),
                });
            }
            Ok(self.records.clone())
        }

        fn name(&self) -> SourceName {
            self.name
        }
    }

    fn orchestrator(clients: Vec<Arc<dyn SourceClient>>) -> WorkflowOrchestrator {
        let scorer =
            CompositeScorer::new(CompositeWeights::default(), TrustWeights::default()).unwrap();
        WorkflowOrchestrator::new(
            clients,
            RetryPolicy::new(0, Duration::from_millis(10)),
            None,
            ResultAggregator::new(scorer),
            HybridRanker::default(),
            4,
            Duration::from_secs(5),
            Duration::from_secs(30),
        )
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            ..SearchRequest::default()
        }
    }

    #[tokio::test]
    async fn test_fan_out_merges_sources() {
        let orch = orchestrator(vec![
            StubSource::ok(
                SourceName::Arxiv,
                vec![record(SourceName::Arxiv, "x1", "Paper One")],
            ),
            StubSource::ok(
                SourceName::PubMed,
                vec![record(SourceName::PubMed, "p1", "Paper Two")],
            ),
        ]);

        let result = orch.run(request("paper")).await.unwrap();
        assert_eq!(result.records.len(), 2);
        assert!(result.errors.is_empty());
        assert!(!result.timed_out);
        assert!(result.composite_fallback);
        assert_eq!(result.run.stage, WorkflowStage::Done);
        assert_eq!(result.records[0].rank, 1);
    }

    #[tokio::test]
    async fn test_one_failing_source_degrades_gracefully() {
        let orch = orchestrator(vec![
            StubSource::ok(
                SourceName::Arxiv,
                vec![record(SourceName::Arxiv, "x1", "Survivor")],
            ),
            StubSource::failing(SourceName::PubMed),
            StubSource::failing(SourceName::SemanticScholar),
        ]);

        let result = orch.run(request("survivor")).await.unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.errors.len(), 2);
        assert!(!result.timed_out);
        // Coverage sees the failed sources as missing
        assert_eq!(result.coverage.missing_sources.len(), 2);
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_an_error() {
        let orch = orchestrator(vec![
            StubSource::failing(SourceName::Arxiv),
            StubSource::failing(SourceName::PubMed),
        ]);

        let err = orch.run(request("doomed")).await.unwrap_err();
        assert!(matches!(err, SearchError::NoSourcesAvailable));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let orch = orchestrator(vec![StubSource::ok(SourceName::Arxiv, vec![])]);
        let err = orch.run(request("   ")).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_unconfigured_source_skipped_not_fatal() {
        let orch = orchestrator(vec![StubSource::ok(
            SourceName::Arxiv,
            vec![record(SourceName::Arxiv, "x1", "Kept Result")],
        )]);
        let mut req = request("kept");
        req.sources = vec![SourceName::Arxiv, SourceName::PubMed];

        let result = orch.run(req).await.unwrap();
        // The configured source's results survive the unconfigured one
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].source, SourceName::PubMed);
        assert!(result
            .coverage
            .missing_sources
            .contains(&SourceName::PubMed));
    }

    #[tokio::test]
    async fn test_no_configured_source_is_fatal() {
        let orch = orchestrator(vec![StubSource::ok(SourceName::Arxiv, vec![])]);
        let mut req = request("q");
        req.sources = vec![SourceName::PubMed, SourceName::SemanticScholar];
        let err = orch.run(req).await.unwrap_err();
        assert!(matches!(err, SearchError::NoSourcesAvailable));
    }

    #[tokio::test]
    async fn test_coverage_describes_final_ranked_set() {
        let orch = orchestrator(vec![
            StubSource::ok(
                SourceName::Arxiv,
                vec![record(SourceName::Arxiv, "x1", "Detection methods survey")],
            ),
            StubSource::ok(
                SourceName::PubMed,
                vec![record(SourceName::PubMed, "p1", "Unrelated trial report")],
            ),
        ]);

        let mut req = request("detection methods");
        req.limit = 1;
        let result = orch.run(req).await.unwrap();

        assert_eq!(result.records.len(), 1);
        assert!(result.errors.is_empty());
        // Only the delivered record informs coverage; the truncated
        // source reads as missing even though it responded.
        let counted: usize = result.coverage.per_source.values().sum();
        assert_eq!(counted, 1);
        assert_eq!(result.coverage.missing_sources.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_keeps_partial_results() {
        let orch = orchestrator(vec![
            StubSource::ok(
                SourceName::Arxiv,
                vec![record(SourceName::Arxiv, "x1", "Fast Paper")],
            ),
            StubSource::slow(
                SourceName::PubMed,
                vec![record(SourceName::PubMed, "p1", "Slow Paper")],
                Duration::from_secs(120),
            ),
        ]);

        let mut req = request("paper");
        req.timeout = Duration::from_secs(2);
        let result = orch.run(req).await.unwrap();

        assert!(result.timed_out);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].record.id, "x1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_recorded_without_ending_run() {
        let scorer =
            CompositeScorer::new(CompositeWeights::default(), TrustWeights::default()).unwrap();
        let orch = WorkflowOrchestrator::new(
            vec![
                StubSource::ok(
                    SourceName::Arxiv,
                    vec![record(SourceName::Arxiv, "x1", "Prompt Reply")],
                ),
                StubSource::slow(
                    SourceName::PubMed,
                    vec![record(SourceName::PubMed, "p1", "Never Arrives")],
                    Duration::from_secs(10),
                ),
            ],
            RetryPolicy::new(0, Duration::from_millis(10)),
            None,
            ResultAggregator::new(scorer),
            HybridRanker::default(),
            4,
            Duration::from_secs(1),
            Duration::from_secs(60),
        );

        let result = orch.run(request("reply")).await.unwrap();

        // The slow source hit its per-call timeout; the run itself did not
        assert!(!result.timed_out);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].source, SourceName::PubMed);
    }

    #[tokio::test]
    async fn test_duplicates_merged_across_sources() {
        let mut a = record(SourceName::SemanticScholar, "s1", "Shared Result");
        a.doi = Some("10.1/shared".to_string());
        let mut b = record(SourceName::Arxiv, "x1", "Shared result from arXiv");
        b.doi = Some("10.1/SHARED".to_string());

        let orch = orchestrator(vec![
            StubSource::ok(SourceName::SemanticScholar, vec![a]),
            StubSource::ok(SourceName::Arxiv, vec![b]),
        ]);

        let result = orch.run(request("shared")).await.unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.records[0].seen_in,
            vec![SourceName::SemanticScholar, SourceName::Arxiv]
        );
        assert!(result.coverage.missing_sources.is_empty());
    }

    #[tokio::test]
    async fn test_limit_and_min_score_applied() {
        let mut records = Vec::new();
        for i in 0..20 {
            records.push(record(SourceName::Arxiv, &format!("x{i}"), &format!("Paper {i}")));
        }
        let orch = orchestrator(vec![StubSource::ok(SourceName::Arxiv, records)]);

        let mut req = request("paper");
        req.limit = 5;
        let result = orch.run(req).await.unwrap();
        assert_eq!(result.records.len(), 5);
        let ranks: Vec<usize> = result.records.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

        let mut req = request("paper");
        req.filters.min_score = Some(2.0);
        let result = orch.run(req).await.unwrap();
        // Composite scores live in [0, 1]; an impossible floor empties the set
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_path_with_degraded_embedder() {
        let scorer =
            CompositeScorer::new(CompositeWeights::default(), TrustWeights::default()).unwrap();
        let provider = EmbeddingProvider::new(Arc::new(DegradedEmbedder::new(64)), 100);

        let orch = WorkflowOrchestrator::new(
            vec![StubSource::ok(
                SourceName::Arxiv,
                vec![
                    record(SourceName::Arxiv, "x1", "Atrial fibrillation detection"),
                    record(SourceName::Arxiv, "x2", "Quantum gravity notes"),
                ],
            )],
            RetryPolicy::new(0, Duration::from_millis(10)),
            Some(Arc::new(provider)),
            ResultAggregator::new(scorer),
            HybridRanker::default(),
            4,
            Duration::from_secs(5),
            Duration::from_secs(30),
        );

        let result = orch.run(request("atrial fibrillation")).await.unwrap();
        assert!(!result.composite_fallback);
        assert_eq!(result.records.len(), 2);
        // Deterministic embedder makes reruns reproducible
        let rerun = orch.run(request("atrial fibrillation")).await.unwrap();
        let ids = |r: &SearchRunResult| {
            r.records.iter().map(|x| x.record.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&result), ids(&rerun));
    }

    #[tokio::test]
    async fn test_local_corpus_joins_fan_out() {
        let corpus = LocalCorpusIndex::new(vec![record(
            SourceName::LocalCorpus,
            "c1",
            "Corpus paper on detection",
        )]);
        let orch = orchestrator(vec![StubSource::ok(
            SourceName::Arxiv,
            vec![record(SourceName::Arxiv, "x1", "Remote detection paper")],
        )])
        .with_local_corpus(corpus);

        let result = orch.run(request("detection")).await.unwrap();
        assert_eq!(result.records.len(), 2);
        assert!(result
            .records
            .iter()
            .any(|r| r.record.source == SourceName::LocalCorpus));
    }
}
