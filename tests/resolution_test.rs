use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lawgraph::config::LawGraphConfig;
use lawgraph::detection::PatternDetector;
use lawgraph::errors::{LawGraphError, Result};
use lawgraph::ids::{ArticleNumber, LawId};
use lawgraph::law::{Era, Law, LawCatalogue};
use lawgraph::metrics::{names, InMemoryMetrics};
use lawgraph::resolution::{meta, AiResolver, BasicResolver};
use lawgraph::types::*;

const CIVIL_CODE: &str = "129AC0000000089";
const LABOR_ACT: &str = "322AC0000000049";

fn law_id(id: &str) -> LawId {
    LawId::new(id).unwrap()
}

fn catalogue() -> LawCatalogue {
    let civil = Law::new(law_id(CIVIL_CODE), "民法", Era::Meiji, 29, 89)
        .with_law_num("明治二十九年法律第八十九号");
    LawCatalogue::from_laws([&civil])
}

fn first_pattern(text: &str) -> MatchedPattern {
    PatternDetector::new()
        .detect(text)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no pattern in {text:?}"))
}

/// Replies with a fixed confidence pointing at the Civil Code, counting calls.
struct FixedAi {
    confidence: f64,
    calls: AtomicUsize,
}

impl FixedAi {
    fn new(confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            confidence,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AiResolver for FixedAi {
    async fn resolve(
        &self,
        pattern: &MatchedPattern,
        article: &SourceArticle,
    ) -> Result<Option<Reference>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let target = law_id(CIVIL_CODE).article(ArticleNumber::new(709));
        Ok(Some(Reference::new(
            article.node(),
            ReferenceNode::article(&target),
            ReferenceKind::Relate,
            pattern.text.clone(),
            self.confidence,
        )))
    }
}

struct FailingAi;

#[async_trait]
impl AiResolver for FailingAi {
    async fn resolve(&self, pattern: &MatchedPattern, _article: &SourceArticle) -> Result<Option<Reference>> {
        Err(LawGraphError::Resolver {
            message: "backend unavailable".to_string(),
            pattern: pattern.text.clone(),
        })
    }
}

struct SlowAi;

#[async_trait]
impl AiResolver for SlowAi {
    async fn resolve(&self, _pattern: &MatchedPattern, _article: &SourceArticle) -> Result<Option<Reference>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }
}

#[tokio::test]
async fn internal_article_resolves_within_the_same_law() {
    let text = "第十条の規定を準用する。";
    let article = SourceArticle::new(law_id(LABOR_ACT), 3u32, text);
    let reference = BasicResolver::new()
        .resolve_pattern(&first_pattern(text), &article)
        .await
        .expect("resolved");

    assert_eq!(reference.source_node.id, "322AC0000000049_art3");
    assert_eq!(reference.target_node.id, "322AC0000000049_art10");
    assert_eq!(reference.target_node.kind, NodeKind::Article);
    assert_eq!(reference.reference_kind, ReferenceKind::Apply);
    assert_eq!(reference.confidence, 0.90);
    assert_eq!(reference.metadata[meta::RESOLVED_BY], "deterministic");
    assert_eq!(reference.metadata[meta::PATTERN_CLASS], "internal_article");
}

#[tokio::test]
async fn confident_external_law_skips_the_ai() {
    let text = "民法第七百九条の規定による。";
    let article = SourceArticle::new(law_id(LABOR_ACT), 3u32, text);
    let ai = FixedAi::new(0.99);
    let resolver = BasicResolver::new()
        .with_catalogue(catalogue())
        .with_ai_resolver(ai.clone());

    let reference = resolver
        .resolve_pattern(&first_pattern(text), &article)
        .await
        .expect("resolved");

    assert_eq!(reference.target_node.id, "129AC0000000089_art709");
    assert_eq!(reference.confidence, 0.95);
    assert_eq!(reference.reference_kind, ReferenceKind::Stipulate);
    assert_eq!(reference.metadata[meta::LAW_NAME], "民法");
    assert_eq!(ai.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_law_without_ai_is_dropped() {
    let text = "商法第10条";
    let article = SourceArticle::new(law_id(LABOR_ACT), 3u32, text);
    let resolved = BasicResolver::new()
        .with_catalogue(catalogue())
        .resolve_pattern(&first_pattern(text), &article)
        .await;
    assert!(resolved.is_none());
}

#[tokio::test]
async fn unknown_law_escalates_to_ai() {
    let text = "商法第10条";
    let article = SourceArticle::new(law_id(LABOR_ACT), 3u32, text);
    let ai = FixedAi::new(0.85);
    let metrics = Arc::new(InMemoryMetrics::new());
    let resolver = BasicResolver::new()
        .with_ai_resolver(ai.clone())
        .with_metrics(metrics.clone());

    let reference = resolver
        .resolve_pattern(&first_pattern(text), &article)
        .await
        .expect("resolved by ai");

    assert_eq!(reference.confidence, 0.85);
    assert_eq!(reference.metadata[meta::RESOLVED_BY], "ai");
    assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.counter(names::AI_ESCALATIONS), 1);
    assert_eq!(metrics.counter(names::REFERENCES_RESOLVED), 1);
}

#[tokio::test]
async fn low_confidence_is_rejected() {
    let text = "商法第10条";
    let article = SourceArticle::new(law_id(LABOR_ACT), 3u32, text);
    let metrics = Arc::new(InMemoryMetrics::new());
    let resolver = BasicResolver::new()
        .with_ai_resolver(FixedAi::new(0.3))
        .with_metrics(metrics.clone());

    assert!(resolver
        .resolve_pattern(&first_pattern(text), &article)
        .await
        .is_none());
    assert_eq!(metrics.counter(names::PATTERNS_REJECTED), 1);
}

#[tokio::test]
async fn never_returns_below_half() {
    let text = "商法第10条";
    let article = SourceArticle::new(law_id(LABOR_ACT), 3u32, text);
    let pattern = first_pattern(text);
    for confidence in [0.0, 0.1, 0.49, 0.5, 0.7, 1.0] {
        let resolver = BasicResolver::new().with_ai_resolver(FixedAi::new(confidence));
        match resolver.resolve_pattern(&pattern, &article).await {
            Some(reference) => assert!(reference.confidence >= 0.5, "{confidence}"),
            None => assert!(confidence < 0.5, "{confidence}"),
        }
    }
}

#[tokio::test]
async fn ai_failure_keeps_the_deterministic_candidate() {
    let text = "前項の規定にかかわらず";
    let article = SourceArticle::new(law_id(LABOR_ACT), 5u32, text).in_paragraph(3);
    let metrics = Arc::new(InMemoryMetrics::new());
    let resolver = BasicResolver::new()
        .with_ai_resolver(Arc::new(FailingAi))
        .with_metrics(metrics.clone());

    let reference = resolver
        .resolve_pattern(&first_pattern(text), &article)
        .await
        .expect("deterministic fallback");

    assert_eq!(reference.target_node.id, "322AC0000000049_art5_para2");
    assert_eq!(reference.confidence, 0.80);
    assert_eq!(reference.reference_kind, ReferenceKind::Regardless);
    assert_eq!(metrics.counter(names::AI_FAILURES), 1);
}

#[tokio::test]
async fn ai_timeout_degrades_to_no_resolution() {
    let text = "商法第10条";
    let article = SourceArticle::new(law_id(LABOR_ACT), 3u32, text);
    let config = LawGraphConfig {
        ai_timeout_ms: 20,
        ..LawGraphConfig::default()
    };
    let metrics = Arc::new(InMemoryMetrics::new());
    let resolver = BasicResolver::from_config(&config)
        .with_ai_resolver(Arc::new(SlowAi))
        .with_metrics(metrics.clone());

    let resolved = resolver.resolve_pattern(&first_pattern(text), &article).await;
    assert!(resolved.is_none());
    assert_eq!(metrics.counter(names::AI_FAILURES), 1);
}

#[tokio::test]
async fn better_ai_answer_wins_over_deterministic() {
    let text = "前項";
    let article = SourceArticle::new(law_id(LABOR_ACT), 5u32, text).in_paragraph(3);
    let resolver = BasicResolver::new().with_ai_resolver(FixedAi::new(0.88));
    let reference = resolver
        .resolve_pattern(&first_pattern(text), &article)
        .await
        .unwrap();
    assert_eq!(reference.target_node.id, "129AC0000000089_art709");
    assert_eq!(reference.confidence, 0.88);
}

#[test]
fn relative_references_use_the_citing_position() {
    let resolver = BasicResolver::new();
    let law = law_id(LABOR_ACT);

    let article = SourceArticle::new(law.clone(), 5u32, "前条");
    let r = resolver
        .resolve_deterministic(&first_pattern("前条"), &article)
        .unwrap();
    assert_eq!(r.target_node.id, "322AC0000000049_art4");

    let article = SourceArticle::new(law.clone(), ArticleNumber::with_branch(5, 2), "前条");
    let r = resolver
        .resolve_deterministic(&first_pattern("前条"), &article)
        .unwrap();
    assert_eq!(r.target_node.id, "322AC0000000049_art5");

    let article = SourceArticle::new(law.clone(), 5u32, "次条");
    let r = resolver
        .resolve_deterministic(&first_pattern("次条"), &article)
        .unwrap();
    assert_eq!(r.target_node.id, "322AC0000000049_art6");

    let article = SourceArticle::new(law.clone(), 5u32, "前号").in_paragraph(1).in_item(3);
    let r = resolver
        .resolve_deterministic(&first_pattern("前号"), &article)
        .unwrap();
    assert_eq!(r.target_node.id, "322AC0000000049_art5_para1_item2");
    assert_eq!(r.source_node.id, "322AC0000000049_art5_para1_item3");
    assert_eq!(r.target_node.kind, NodeKind::Item);
}

#[test]
fn counted_relative_carries_a_span() {
    let resolver = BasicResolver::new();
    let article = SourceArticle::new(law_id(LABOR_ACT), 5u32, "前二項").in_paragraph(3);
    let r = resolver
        .resolve_deterministic(&first_pattern("前二項"), &article)
        .unwrap();
    assert_eq!(r.target_node.id, "322AC0000000049_art5_para2");
    assert_eq!(r.metadata[meta::SPAN_FROM], "1");
    assert_eq!(r.metadata[meta::SPAN_TO], "2");
    assert_eq!(r.metadata[meta::SPAN_UNIT], "paragraph");
}

#[test]
fn relative_without_position_has_no_candidate() {
    let resolver = BasicResolver::new();
    let article = SourceArticle::new(law_id(LABOR_ACT), 5u32, "前項");
    assert!(resolver
        .resolve_deterministic(&first_pattern("前項"), &article)
        .is_none());

    // 前三項 from the second paragraph would start before the first one.
    let article = SourceArticle::new(law_id(LABOR_ACT), 5u32, "前三項").in_paragraph(2);
    assert!(resolver
        .resolve_deterministic(&first_pattern("前三項"), &article)
        .is_none());
}

#[test]
fn range_carries_an_article_span() {
    let resolver = BasicResolver::new();
    let text = "第32条から第35条まで";
    let article = SourceArticle::new(law_id(LABOR_ACT), 40u32, text);
    let r = resolver
        .resolve_deterministic(&first_pattern(text), &article)
        .unwrap();
    assert_eq!(r.target_node.id, "322AC0000000049_art32");
    assert_eq!(r.metadata[meta::SPAN_FROM], "32");
    assert_eq!(r.metadata[meta::SPAN_TO], "35");
    assert_eq!(r.metadata[meta::SPAN_UNIT], "article");
}

#[test]
fn instrument_resolves_through_the_law_number() {
    let cabinet_order = Law::new(law_id("322CO0000000016"), "地方自治法施行令", Era::Showa, 22, 16)
        .with_law_num("昭和二十二年政令第十六号");
    let resolver =
        BasicResolver::new().with_catalogue(LawCatalogue::from_laws([&cabinet_order]));
    let text = "昭和二十二年政令第十六号";
    let article = SourceArticle::new(law_id(LABOR_ACT), 1u32, text);
    let r = resolver
        .resolve_deterministic(&first_pattern(text), &article)
        .unwrap();
    assert_eq!(r.target_node.kind, NodeKind::Law);
    assert_eq!(r.target_node.id, "322CO0000000016");
    assert_eq!(r.confidence, 0.90);
}
