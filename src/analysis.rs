//! Per-article orchestration: detect, resolve, expand, consolidate.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::LawGraphConfig;
use crate::detection::PatternMatcher;
use crate::errors::Result;
use crate::metrics::{names, Metrics, NoopMetrics};
use crate::repository::ReferenceRepository;
use crate::resolution::{consolidate, expand_spans, Resolver};
use crate::types::{Reference, SourceArticle};

/// Turns article text into consolidated references.
///
/// Patterns of one article are resolved on a bounded pool of tasks so a slow
/// AI resolution does not hold up the others. A failing task only loses its
/// own pattern.
#[derive(Clone)]
pub struct ReferenceAnalysisService {
    detector: Arc<dyn PatternMatcher>,
    resolver: Arc<dyn Resolver>,
    metrics: Arc<dyn Metrics>,
    max_concurrent_resolutions: usize,
    max_concurrent_articles: usize,
    max_span_expansion: u32,
}

impl ReferenceAnalysisService {
    pub fn new(detector: Arc<dyn PatternMatcher>, resolver: Arc<dyn Resolver>) -> Self {
        Self::from_config(&LawGraphConfig::default(), detector, resolver)
    }

    pub fn from_config(
        config: &LawGraphConfig,
        detector: Arc<dyn PatternMatcher>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            detector,
            resolver,
            metrics: Arc::new(NoopMetrics),
            max_concurrent_resolutions: config.max_concurrent_resolutions.max(1),
            max_concurrent_articles: config.max_concurrent_articles.max(1),
            max_span_expansion: config.max_span_expansion,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Analyses one article. Output follows the order in which citations
    /// appear in the text, with duplicates merged.
    pub async fn analyze_article(&self, article: &SourceArticle) -> Vec<Reference> {
        let started = Instant::now();
        let patterns = self.detector.detect(&article.text);
        let detected = patterns.len();
        self.metrics.increment(names::PATTERNS_DETECTED, detected as u64);

        let shared = Arc::new(article.clone());
        let permits = Arc::new(Semaphore::new(self.max_concurrent_resolutions));
        let mut tasks = JoinSet::new();

        for (index, pattern) in patterns.into_iter().enumerate() {
            let resolver = Arc::clone(&self.resolver);
            let article = Arc::clone(&shared);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let resolved = match permits.acquire_owned().await {
                    Ok(_permit) => resolver.resolve(&pattern, &article).await,
                    Err(_) => None,
                };
                (index, resolved)
            });
        }

        let mut resolved: Vec<(usize, Reference)> = Vec::with_capacity(detected);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(reference))) => resolved.push((index, reference)),
                Ok((_, None)) => {}
                Err(e) => warn!(
                    article = %article.article_id(),
                    error = %e,
                    "resolution task failed"
                ),
            }
        }
        resolved.sort_by_key(|(index, _)| *index);

        let references = resolved.into_iter().map(|(_, r)| r).collect();
        let references = consolidate(expand_spans(references, self.max_span_expansion));

        self.metrics.increment(names::ARTICLES_ANALYZED, 1);
        self.metrics
            .record_duration(names::ARTICLE_ANALYSIS_TIME, started.elapsed());
        info!(
            article = %article.article_id(),
            patterns = detected,
            references = references.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysed article"
        );
        references
    }

    /// Analyses a batch of articles, at most `max_concurrent_articles` at a
    /// time. The result has one entry per input article, in input order.
    pub async fn analyze_articles(&self, articles: &[SourceArticle]) -> Vec<Vec<Reference>> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_articles));
        let mut tasks = JoinSet::new();

        for (index, article) in articles.iter().cloned().enumerate() {
            let service = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let references = match permits.acquire_owned().await {
                    Ok(_permit) => service.analyze_article(&article).await,
                    Err(_) => Vec::new(),
                };
                (index, references)
            });
        }

        let mut results: Vec<Vec<Reference>> = vec![Vec::new(); articles.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, references)) => results[index] = references,
                Err(e) => warn!(error = %e, "article analysis task failed"),
            }
        }
        results
    }

    /// Analyses a batch and persists the consolidated references.
    pub async fn analyze_and_save(
        &self,
        articles: &[SourceArticle],
        repository: &dyn ReferenceRepository,
    ) -> Result<Vec<Reference>> {
        let references: Vec<Reference> = self
            .analyze_articles(articles)
            .await
            .into_iter()
            .flatten()
            .collect();
        let references = consolidate(references);
        repository.save_all(&references).await?;
        info!(
            articles = articles.len(),
            references = references.len(),
            "saved references"
        );
        Ok(references)
    }
}
