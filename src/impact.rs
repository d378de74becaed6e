//! Amendment impact analysis over the persisted reference graph.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::errors::{LawGraphError, Result};
use crate::ids::{article_node_id, ArticleNumber, LawId};
use crate::metrics::{names, Metrics, NoopMetrics};
use crate::repository::{LawRepository, ReferenceRepository};
use crate::types::{
    AffectedLaw, ImpactAnalysisResult, ImpactKind, ImpactOptions, ImpactSummary, ImpactedNode,
    NodeKind, ReferenceNode,
};

/// Confidence multiplier applied per hop away from the amended provision.
pub const DECAY_FACTOR: f64 = 0.9;

/// Answers "what is affected if these articles change?".
///
/// Queries only read the graph, so one service can serve concurrent
/// queries.
#[derive(Clone)]
pub struct ImpactAnalysisService {
    references: Arc<dyn ReferenceRepository>,
    laws: Arc<dyn LawRepository>,
    metrics: Arc<dyn Metrics>,
}

/// Frontier entry of the backward traversal.
struct Visit {
    node_id: String,
    depth: u32,
    path: Vec<String>,
}

impl ImpactAnalysisService {
    pub fn new(references: Arc<dyn ReferenceRepository>, laws: Arc<dyn LawRepository>) -> Self {
        Self {
            references,
            laws,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Walks incoming references breadth-first from the amended articles.
    ///
    /// Traversal works at article granularity: a citation of `第七百九条第一項`
    /// reaches article 709, and a citing paragraph is recorded and expanded
    /// as its article.
    ///
    /// The first path that reaches a node decides its depth, kind and
    /// confidence; later paths never update it. Nodes at `options.depth` are
    /// not expanded, and with `include_indirect` off only direct citers are
    /// recorded. A repository failure fails the whole query.
    pub async fn analyze_amendment_impact(
        &self,
        amended_law_id: &LawId,
        amended_articles: &[ArticleNumber],
        options: &ImpactOptions,
    ) -> Result<ImpactAnalysisResult> {
        let started = Instant::now();
        self.metrics.increment(names::IMPACT_QUERIES, 1);

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Visit> = VecDeque::new();
        for number in amended_articles {
            let node_id = amended_law_id.article(*number).to_string();
            if visited.insert(node_id.clone()) {
                queue.push_back(Visit {
                    path: vec![node_id.clone()],
                    node_id,
                    depth: 0,
                });
            }
        }

        let mut impacted: Vec<ImpactedNode> = Vec::new();
        let mut truncated = false;

        while let Some(current) = queue.pop_front() {
            if options.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                truncated = true;
                break;
            }
            if current.depth >= options.depth {
                continue;
            }

            let incoming = self
                .references
                .find_incoming_under(&current.node_id, options.confidence_threshold)
                .await
                .map_err(|e| LawGraphError::Repository {
                    message: e.to_string(),
                    operation: "find_incoming_under".to_string(),
                })?;

            for reference in incoming {
                let source = containing_article(reference.source_node);
                if !visited.insert(source.id.clone()) {
                    continue;
                }

                let mut path = current.path.clone();
                path.push(source.id.clone());
                let depth = current.depth + 1;

                impacted.push(ImpactedNode {
                    node_id: source.id.clone(),
                    node_kind: source.kind,
                    impact_kind: ImpactKind::from(reference.reference_kind),
                    impact_path: path.clone(),
                    confidence: reference.confidence * DECAY_FACTOR.powi(current.depth as i32),
                    depth,
                });

                if options.include_indirect {
                    queue.push_back(Visit {
                        node_id: source.id,
                        depth,
                        path,
                    });
                }
            }
        }

        if truncated {
            warn!(
                law = %amended_law_id,
                recorded = impacted.len(),
                "impact traversal stopped at deadline"
            );
        }

        let summary = summarize(&impacted);
        let affected_items = self.group_by_law(impacted).await;

        self.metrics
            .increment(names::IMPACT_NODES, summary.total_affected_articles as u64);
        self.metrics
            .record_duration(names::IMPACT_QUERY_TIME, started.elapsed());
        info!(
            law = %amended_law_id,
            articles = amended_articles.len(),
            affected_laws = summary.total_affected_laws,
            affected_articles = summary.total_affected_articles,
            max_depth = summary.max_depth_reached,
            truncated,
            "impact analysis complete"
        );

        Ok(ImpactAnalysisResult {
            amended_law_id: amended_law_id.clone(),
            amended_articles: amended_articles.to_vec(),
            summary,
            affected_items,
            executed_at: Utc::now(),
            truncated,
        })
    }

    /// Groups impacted nodes by law. Laws whose record cannot be found or
    /// read are left out.
    async fn group_by_law(&self, impacted: Vec<ImpactedNode>) -> Vec<AffectedLaw> {
        let mut by_law: BTreeMap<LawId, Vec<ImpactedNode>> = BTreeMap::new();
        for node in impacted {
            match LawId::from_node_id(&node.node_id) {
                Ok(law_id) => by_law.entry(law_id).or_default().push(node),
                Err(e) => warn!(node = %node.node_id, error = %e, "impacted node has no law id"),
            }
        }

        let mut affected = Vec::with_capacity(by_law.len());
        for (law_id, articles) in by_law {
            match self.laws.find_by_id(&law_id).await {
                Ok(Some(law)) => affected.push(AffectedLaw {
                    law_id,
                    law_title: law.title,
                    articles,
                }),
                Ok(None) => {
                    warn!(law = %law_id, omitted = articles.len(), "unknown law, omitting its articles")
                }
                Err(e) => {
                    warn!(law = %law_id, omitted = articles.len(), error = %e, "law lookup failed, omitting its articles")
                }
            }
        }
        debug!(laws = affected.len(), "grouped impacted nodes");
        affected
    }
}

/// Lifts a paragraph or item node to the article that contains it.
fn containing_article(node: ReferenceNode) -> ReferenceNode {
    let article = article_node_id(&node.id);
    if article.len() == node.id.len() {
        return node;
    }
    ReferenceNode::new(NodeKind::Article, article)
}

/// Counts over every recorded node, including those later omitted from the
/// per-law listing.
fn summarize(impacted: &[ImpactedNode]) -> ImpactSummary {
    let laws: HashSet<&str> = impacted
        .iter()
        .map(|n| n.node_id.split('_').next().unwrap_or(n.node_id.as_str()))
        .collect();

    ImpactSummary {
        total_affected_laws: laws.len(),
        total_affected_articles: impacted.len(),
        direct_impacts: impacted.iter().filter(|n| n.depth == 1).count(),
        indirect_impacts: impacted.iter().filter(|n| n.depth > 1).count(),
        max_depth_reached: impacted.iter().map(|n| n.depth).max().unwrap_or(0),
    }
}
