use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lawgraph::analysis::ReferenceAnalysisService;
use lawgraph::detection::PatternDetector;
use lawgraph::errors::{LawGraphError, Result};
use lawgraph::ids::{ArticleNumber, LawId};
use lawgraph::impact::ImpactAnalysisService;
use lawgraph::law::{Era, Law};
use lawgraph::metrics::{names, InMemoryMetrics};
use lawgraph::repository::{LawRepository, MemoryStore, ReferenceRepository};
use lawgraph::resolution::BasicResolver;
use lawgraph::types::*;

const CIVIL_CODE: &str = "129AC0000000089";
const LABOR_ACT: &str = "322AC0000000049";
const TAX_ACT: &str = "340AC0000000033";

const A: &str = "322AC0000000049_art10";
const B: &str = "340AC0000000033_art3";
const C: &str = "340AC0000000033_art4";

fn node(id: &str) -> ReferenceNode {
    ReferenceNode::new(NodeKind::Article, id)
}

fn edge(source: &str, target: &str, kind: ReferenceKind, confidence: f64) -> Reference {
    Reference::new(node(source), node(target), kind, "第七百九条", confidence)
}

fn civil_709() -> String {
    format!("{CIVIL_CODE}_art709")
}

async fn store_with(references: &[Reference], laws: &[(&str, &str)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.save_all(references).await.unwrap();
    for (id, title) in laws {
        let law = Law::new(LawId::new(id).unwrap(), title, Era::Showa, 22, 1);
        store.save_law(&law).await.unwrap();
    }
    store
}

fn service(store: &Arc<MemoryStore>) -> ImpactAnalysisService {
    ImpactAnalysisService::new(store.clone(), store.clone())
}

async fn amend_709(service: &ImpactAnalysisService, options: &ImpactOptions) -> ImpactAnalysisResult {
    service
        .analyze_amendment_impact(
            &LawId::new(CIVIL_CODE).unwrap(),
            &[ArticleNumber::new(709)],
            options,
        )
        .await
        .unwrap()
}

fn chain() -> Vec<Reference> {
    vec![
        edge(A, &civil_709(), ReferenceKind::Relate, 0.95),
        edge(B, A, ReferenceKind::Apply, 0.90),
        edge(C, B, ReferenceKind::Deem, 0.95),
    ]
}

const ALL_LAWS: &[(&str, &str)] = &[
    (CIVIL_CODE, "民法"),
    (LABOR_ACT, "労働基準法"),
    (TAX_ACT, "所得税法"),
];

#[tokio::test]
async fn two_hop_chain() {
    let store = store_with(&chain()[..2], ALL_LAWS).await;
    let result = amend_709(&service(&store), &ImpactOptions::default()).await;

    assert_eq!(result.summary.direct_impacts, 1);
    assert_eq!(result.summary.indirect_impacts, 1);
    assert_eq!(result.summary.max_depth_reached, 2);
    assert_eq!(result.summary.total_affected_laws, 2);
    assert_eq!(result.summary.total_affected_articles, 2);
    assert!(!result.truncated);

    let b = result
        .affected_items
        .iter()
        .flat_map(|law| law.articles.iter())
        .find(|n| n.node_id == B)
        .expect("B is impacted");
    assert_eq!(b.impact_kind, ImpactKind::DirectApplication);
    assert!((b.confidence - 0.81).abs() < 1e-9);
    assert_eq!(b.depth, 2);
    assert_eq!(b.impact_path, vec![civil_709(), A.to_string(), B.to_string()]);

    let a = &result.affected_items[0];
    assert_eq!(a.law_id.as_str(), LABOR_ACT);
    assert_eq!(a.law_title, "労働基準法");
    assert_eq!(a.articles[0].impact_kind, ImpactKind::General);
    assert!((a.articles[0].confidence - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn depth_bounds_the_traversal() {
    let store = store_with(&chain(), ALL_LAWS).await;
    let options = ImpactOptions {
        depth: 2,
        ..ImpactOptions::default()
    };
    let result = amend_709(&service(&store), &options).await;

    let nodes: Vec<&ImpactedNode> = result
        .affected_items
        .iter()
        .flat_map(|law| law.articles.iter())
        .collect();
    assert!(nodes.iter().all(|n| n.depth <= 2));
    assert!(nodes.iter().all(|n| n.node_id != C));
    assert_eq!(result.summary.max_depth_reached, 2);

    let deeper = amend_709(&service(&store), &ImpactOptions::default()).await;
    assert_eq!(deeper.summary.max_depth_reached, 3);
    assert_eq!(deeper.summary.total_affected_articles, 3);
}

#[tokio::test]
async fn direct_only_when_indirect_is_off() {
    let store = store_with(&chain(), ALL_LAWS).await;
    let options = ImpactOptions {
        include_indirect: false,
        ..ImpactOptions::default()
    };
    let result = amend_709(&service(&store), &options).await;
    assert_eq!(result.summary.direct_impacts, 1);
    assert_eq!(result.summary.indirect_impacts, 0);
    assert_eq!(result.summary.max_depth_reached, 1);
}

#[tokio::test]
async fn threshold_filters_weak_edges() {
    let store = store_with(
        &[edge(A, &civil_709(), ReferenceKind::Relate, 0.6)],
        ALL_LAWS,
    )
    .await;
    let result = amend_709(&service(&store), &ImpactOptions::default()).await;
    assert_eq!(result.summary.total_affected_articles, 0);
    assert!(result.affected_items.is_empty());
}

#[tokio::test]
async fn first_visit_wins() {
    // A reaches 709 directly and through B; only the direct visit counts.
    let store = store_with(
        &[
            edge(A, &civil_709(), ReferenceKind::Relate, 0.95),
            edge(B, &civil_709(), ReferenceKind::Relate, 0.95),
            edge(A, B, ReferenceKind::Apply, 0.99),
        ],
        ALL_LAWS,
    )
    .await;
    let result = amend_709(&service(&store), &ImpactOptions::default()).await;
    assert_eq!(result.summary.total_affected_articles, 2);
    assert_eq!(result.summary.indirect_impacts, 0);
}

#[tokio::test]
async fn cycles_terminate() {
    let store = store_with(
        &[
            edge(A, &civil_709(), ReferenceKind::Relate, 0.95),
            edge(B, A, ReferenceKind::Relate, 0.95),
            edge(A, B, ReferenceKind::Relate, 0.95),
            edge(&civil_709(), B, ReferenceKind::Relate, 0.95),
        ],
        ALL_LAWS,
    )
    .await;
    let options = ImpactOptions {
        depth: 10,
        ..ImpactOptions::default()
    };
    let result = amend_709(&service(&store), &options).await;
    assert_eq!(result.summary.total_affected_articles, 2);
}

#[tokio::test]
async fn passed_deadline_truncates() {
    let store = store_with(&chain(), ALL_LAWS).await;
    let options = ImpactOptions {
        deadline: Some(Instant::now() - Duration::from_millis(1)),
        ..ImpactOptions::default()
    };
    let result = amend_709(&service(&store), &options).await;
    assert!(result.truncated);
    assert_eq!(result.summary.total_affected_articles, 0);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["truncated"], true);
}

#[tokio::test]
async fn unknown_law_is_omitted_but_counted() {
    let store = store_with(&chain()[..2], &[(CIVIL_CODE, "民法"), (LABOR_ACT, "労働基準法")]).await;
    let result = amend_709(&service(&store), &ImpactOptions::default()).await;

    assert_eq!(result.affected_items.len(), 1);
    assert_eq!(result.affected_items[0].law_id.as_str(), LABOR_ACT);
    assert_eq!(result.summary.total_affected_laws, 2);
    assert_eq!(result.summary.indirect_impacts, 1);
}

struct BrokenReferences;

#[async_trait]
impl ReferenceRepository for BrokenReferences {
    async fn find_incoming(&self, _node_id: &str, _min_confidence: f64) -> Result<Vec<Reference>> {
        Err(LawGraphError::Database {
            message: "disk I/O error".to_string(),
            operation: "find_incoming".to_string(),
        })
    }

    async fn find_incoming_under(
        &self,
        article_id: &str,
        min_confidence: f64,
    ) -> Result<Vec<Reference>> {
        self.find_incoming(article_id, min_confidence).await
    }

    async fn find_outgoing(&self, _node_id: &str) -> Result<Vec<Reference>> {
        Ok(Vec::new())
    }

    async fn save(&self, _reference: &Reference) -> Result<()> {
        Ok(())
    }

    async fn save_all(&self, _references: &[Reference]) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _reference_id: &str) -> Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn repository_failure_fails_the_query() {
    let laws = Arc::new(MemoryStore::new());
    let service = ImpactAnalysisService::new(Arc::new(BrokenReferences), laws);
    let err = service
        .analyze_amendment_impact(
            &LawId::new(CIVIL_CODE).unwrap(),
            &[ArticleNumber::new(709)],
            &ImpactOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LawGraphError::Repository { .. }), "{err:?}");
}

#[tokio::test]
async fn result_json_uses_camel_case() {
    let store = store_with(&chain()[..2], ALL_LAWS).await;
    let metrics = Arc::new(InMemoryMetrics::new());
    let service = service(&store).with_metrics(metrics.clone());
    let result = amend_709(&service, &ImpactOptions::default()).await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["amendedLawId"], CIVIL_CODE);
    assert_eq!(json["amendedArticles"][0], 709);
    assert_eq!(json["summary"]["directImpacts"], 1);
    assert_eq!(json["summary"]["maxDepthReached"], 2);
    assert_eq!(json["affectedItems"][0]["lawTitle"], "労働基準法");
    assert_eq!(json["affectedItems"][1]["articles"][0]["impactKind"], "DirectApplication");
    assert!(json.get("executedAt").is_some());
    assert!(json.get("truncated").is_none());

    assert_eq!(metrics.counter(names::IMPACT_QUERIES), 1);
    assert_eq!(metrics.counter(names::IMPACT_NODES), 2);
}

#[tokio::test]
async fn concurrent_queries_share_one_service() {
    let store = store_with(&chain(), ALL_LAWS).await;
    let service = Arc::new(service(&store));
    let mut handles = Vec::new();
    for depth in 1..=3 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let options = ImpactOptions {
                depth,
                ..ImpactOptions::default()
            };
            amend_709(&service, &options).await.summary.max_depth_reached
        }));
    }
    let mut depths = Vec::new();
    for handle in handles {
        depths.push(handle.await.unwrap());
    }
    assert_eq!(depths, vec![1, 2, 3]);
}

fn civil_article(number: u32, text: &str) -> SourceArticle {
    SourceArticle::new(LawId::new(CIVIL_CODE).unwrap(), number, text)
}

async fn analysed_store(articles: &[SourceArticle]) -> Arc<MemoryStore> {
    let store = store_with(&[], ALL_LAWS).await;
    let analysis = ReferenceAnalysisService::new(
        Arc::new(PatternDetector::new()),
        Arc::new(BasicResolver::new()),
    );
    analysis
        .analyze_and_save(articles, store.as_ref())
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn paragraph_citation_reaches_the_amended_article() {
    let store = analysed_store(&[civil_article(5, "第七百九条第一項の規定を準用する。")]).await;
    let saved = store
        .find_outgoing(&format!("{CIVIL_CODE}_art5"))
        .await
        .unwrap();
    assert_eq!(saved[0].target_node.id, format!("{CIVIL_CODE}_art709_para1"));

    let result = amend_709(&service(&store), &ImpactOptions::default()).await;
    assert_eq!(result.summary.direct_impacts, 1);
    let node = &result.affected_items[0].articles[0];
    assert_eq!(node.node_id, format!("{CIVIL_CODE}_art5"));
    assert_eq!(node.impact_path, vec![civil_709(), format!("{CIVIL_CODE}_art5")]);
}

#[tokio::test]
async fn citing_paragraph_is_expanded_as_its_article() {
    let store = analysed_store(&[
        civil_article(5, "第七百九条の規定を適用する。").in_paragraph(2),
        civil_article(7, "第五条の規定を準用する。"),
    ])
    .await;

    let result = amend_709(&service(&store), &ImpactOptions::default()).await;
    assert_eq!(result.summary.direct_impacts, 1);
    assert_eq!(result.summary.indirect_impacts, 1);

    let nodes: Vec<&ImpactedNode> = result
        .affected_items
        .iter()
        .flat_map(|law| law.articles.iter())
        .collect();
    assert_eq!(nodes[0].node_id, format!("{CIVIL_CODE}_art5"));
    assert_eq!(nodes[0].node_kind, NodeKind::Article);
    assert_eq!(nodes[1].node_id, format!("{CIVIL_CODE}_art7"));
    assert_eq!(nodes[1].depth, 2);
}
