use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AiResolver, Resolver};
use crate::config::LawGraphConfig;
use crate::detection::classify_reference_kind;
use crate::ids::{ArticleNumber, LawId};
use crate::law::LawCatalogue;
use crate::metrics::{names, Metrics, NoopMetrics};
use crate::types::*;

/// Metadata keys written by the resolver.
pub mod meta {
    pub const PATTERN_CLASS: &str = "patternClass";
    pub const RESOLVED_BY: &str = "resolvedBy";
    pub const POSITION: &str = "position";
    pub const LAW_NAME: &str = "lawName";
    pub const SPAN_FROM: &str = "spanFrom";
    pub const SPAN_TO: &str = "spanTo";
    pub const SPAN_UNIT: &str = "spanUnit";
}

/// Resolves detected patterns into references.
///
/// Resolution strategies are tried in order:
/// 1. **Deterministic** -- build the target id from the citing article's own
///    position and law, or from the law catalogue for named laws and
///    instruments. A candidate above the escalation threshold is returned
///    as-is.
/// 2. **AI escalation** -- otherwise, ask the configured [`AiResolver`]
///    under a timeout. Failures and timeouts count as "no answer".
///
/// The better of the two by confidence wins; anything below the rejection
/// threshold is dropped.
pub struct BasicResolver {
    catalogue: LawCatalogue,
    ai: Option<Arc<dyn AiResolver>>,
    escalation_threshold: f64,
    rejection_threshold: f64,
    ai_timeout: Duration,
    metrics: Arc<dyn Metrics>,
}

impl BasicResolver {
    /// Creates a resolver with default thresholds, an empty catalogue and no
    /// AI resolver.
    pub fn new() -> Self {
        Self::from_config(&LawGraphConfig::default())
    }

    pub fn from_config(config: &LawGraphConfig) -> Self {
        Self {
            catalogue: LawCatalogue::new(),
            ai: None,
            escalation_threshold: config.escalation_threshold,
            rejection_threshold: config.rejection_threshold,
            ai_timeout: config.ai_timeout(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_catalogue(mut self, catalogue: LawCatalogue) -> Self {
        self.catalogue = catalogue;
        self
    }

    pub fn with_ai_resolver(mut self, ai: Arc<dyn AiResolver>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Attempts to resolve a pattern without outside help.
    ///
    /// Returns `None` when the target cannot be determined from the citing
    /// article and the catalogue alone. The returned confidence is the
    /// pattern's confidence, unchanged.
    pub fn resolve_deterministic(
        &self,
        pattern: &MatchedPattern,
        article: &SourceArticle,
    ) -> Option<Reference> {
        let law_id = match pattern.law_name.as_deref() {
            Some(name) => self.catalogue.lookup(name)?.clone(),
            None => article.law_id.clone(),
        };

        let (target, span) = match &pattern.target {
            PatternTarget::Article {
                number,
                paragraph,
                item,
            } => (article_node(&law_id, *number, *paragraph, *item), None),
            PatternTarget::Range { start, end } => {
                let span = match (start.minor, end.minor) {
                    (None, None) if start.major < end.major => {
                        Some((start.major, end.major, RelativeUnit::Article))
                    }
                    _ => None,
                };
                (ReferenceNode::article(&law_id.article(*start)), span)
            }
            PatternTarget::Relative {
                unit,
                direction,
                count,
            } => resolve_relative(article, *unit, *direction, *count)?,
            PatternTarget::Instrument { name, .. } => {
                let law_id = self
                    .catalogue
                    .lookup(&pattern.text)
                    .or_else(|| self.catalogue.lookup(name))?;
                (ReferenceNode::law(law_id), None)
            }
        };

        let kind = classify_reference_kind(&article.text, pattern.end());
        let mut reference = Reference::new(
            article.node(),
            target.with_text(pattern.text.clone()),
            kind,
            pattern.text.clone(),
            pattern.confidence,
        )
        .with_metadata(meta::PATTERN_CLASS, pattern.class_kind.as_str())
        .with_metadata(meta::RESOLVED_BY, "deterministic")
        .with_metadata(meta::POSITION, pattern.position.to_string());

        if let Some(name) = &pattern.law_name {
            reference = reference.with_metadata(meta::LAW_NAME, name.clone());
        }
        if let Some((from, to, unit)) = span {
            reference = reference
                .with_metadata(meta::SPAN_FROM, from.to_string())
                .with_metadata(meta::SPAN_TO, to.to_string())
                .with_metadata(meta::SPAN_UNIT, span_unit_name(unit));
        }
        Some(reference)
    }

    /// Resolves one pattern. Never fails: faults degrade to `None`.
    pub async fn resolve_pattern(
        &self,
        pattern: &MatchedPattern,
        article: &SourceArticle,
    ) -> Option<Reference> {
        let candidate = self.resolve_deterministic(pattern, article);
        if let Some(reference) = &candidate {
            if reference.confidence > self.escalation_threshold {
                return self.accept(candidate);
            }
        }

        let escalated = match &self.ai {
            Some(ai) => self.escalate(ai.as_ref(), pattern, article).await,
            None => None,
        };

        let best = match (candidate, escalated) {
            (Some(c), Some(e)) => Some(if e.confidence > c.confidence { e } else { c }),
            (c, e) => c.or(e),
        };
        self.accept(best)
    }

    /// Asks the AI resolver, bounded by the timeout.
    async fn escalate(
        &self,
        ai: &dyn AiResolver,
        pattern: &MatchedPattern,
        article: &SourceArticle,
    ) -> Option<Reference> {
        self.metrics.increment(names::AI_ESCALATIONS, 1);
        match tokio::time::timeout(self.ai_timeout, ai.resolve(pattern, article)).await {
            Ok(Ok(Some(reference))) => {
                let mut reference = reference.retarget(reference.target_node.clone());
                reference.confidence = reference.confidence.clamp(0.0, 1.0);
                reference
                    .metadata
                    .insert(meta::RESOLVED_BY.to_string(), "ai".to_string());
                Some(reference)
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                self.metrics.increment(names::AI_FAILURES, 1);
                warn!(pattern = %pattern.text, error = %e, "AI resolution failed");
                None
            }
            Err(_) => {
                self.metrics.increment(names::AI_FAILURES, 1);
                warn!(
                    pattern = %pattern.text,
                    timeout_ms = self.ai_timeout.as_millis() as u64,
                    "AI resolution timed out"
                );
                None
            }
        }
    }

    /// Applies the rejection threshold.
    fn accept(&self, reference: Option<Reference>) -> Option<Reference> {
        match reference {
            Some(r) if r.confidence >= self.rejection_threshold => {
                self.metrics.increment(names::REFERENCES_RESOLVED, 1);
                Some(r)
            }
            Some(r) => {
                debug!(text = %r.source_text, confidence = r.confidence, "rejected low-confidence reference");
                self.metrics.increment(names::PATTERNS_REJECTED, 1);
                None
            }
            None => {
                self.metrics.increment(names::PATTERNS_REJECTED, 1);
                None
            }
        }
    }
}

impl Default for BasicResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for BasicResolver {
    async fn resolve(&self, pattern: &MatchedPattern, article: &SourceArticle) -> Option<Reference> {
        self.resolve_pattern(pattern, article).await
    }
}

// ----------------------------------------------------------------------
// Private helpers
// ----------------------------------------------------------------------

fn article_node(
    law_id: &LawId,
    number: ArticleNumber,
    paragraph: Option<u32>,
    item: Option<u32>,
) -> ReferenceNode {
    let article = law_id.article(number);
    match (paragraph, item) {
        (Some(p), Some(i)) => ReferenceNode::item(&article, p, i),
        (Some(p), None) => ReferenceNode::paragraph(&article, p),
        _ => ReferenceNode::article(&article),
    }
}

fn span_unit_name(unit: RelativeUnit) -> &'static str {
    match unit {
        RelativeUnit::Article => "article",
        RelativeUnit::Paragraph => "paragraph",
        RelativeUnit::Item => "item",
    }
}

/// Computes `(nearest, farthest)` positions for a relative reference from
/// the citing position `current`. Preceding spans must stay at or above 1.
fn relative_bounds(
    current: u32,
    direction: RelativeDirection,
    count: RelativeCount,
) -> Option<(u32, u32)> {
    match (direction, count) {
        (RelativeDirection::Preceding, RelativeCount::All) => {
            let nearest = current.checked_sub(1).filter(|&n| n >= 1)?;
            Some((nearest, 1))
        }
        (RelativeDirection::Preceding, RelativeCount::Count(k)) => {
            let nearest = current.checked_sub(1).filter(|&n| n >= 1)?;
            let farthest = current.checked_sub(k).filter(|&n| n >= 1)?;
            Some((nearest, farthest))
        }
        (RelativeDirection::Following, RelativeCount::Count(k)) => {
            Some((current.checked_add(1)?, current.checked_add(k)?))
        }
        (RelativeDirection::Following, RelativeCount::All) => None,
    }
}

/// Resolves 前条 / 次項 / 前二項 / 前号 relative to the citing provision.
fn resolve_relative(
    article: &SourceArticle,
    unit: RelativeUnit,
    direction: RelativeDirection,
    count: RelativeCount,
) -> Option<(ReferenceNode, Option<(u32, u32, RelativeUnit)>)> {
    let article_id = article.article_id();

    let (node, nearest, farthest) = match unit {
        RelativeUnit::Article => {
            // The article preceding 第五条の二 is 第五条.
            let current = match (direction, article.number.minor) {
                (RelativeDirection::Preceding, Some(_)) => article.number.major + 1,
                _ => article.number.major,
            };
            let (nearest, farthest) = relative_bounds(current, direction, count)?;
            let node = ReferenceNode::article(&article.law_id.article(ArticleNumber::new(nearest)));
            (node, nearest, farthest)
        }
        RelativeUnit::Paragraph => {
            let (nearest, farthest) = relative_bounds(article.paragraph?, direction, count)?;
            (ReferenceNode::paragraph(&article_id, nearest), nearest, farthest)
        }
        RelativeUnit::Item => {
            let paragraph = article.paragraph?;
            let (nearest, farthest) = relative_bounds(article.item?, direction, count)?;
            (ReferenceNode::item(&article_id, paragraph, nearest), nearest, farthest)
        }
    };

    let span = (nearest != farthest)
        .then(|| (nearest.min(farthest), nearest.max(farthest), unit));
    Some((node, span))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preceding_bounds_stop_at_one() {
        assert_eq!(
            relative_bounds(3, RelativeDirection::Preceding, RelativeCount::Count(2)),
            Some((2, 1))
        );
        assert_eq!(
            relative_bounds(2, RelativeDirection::Preceding, RelativeCount::Count(2)),
            None
        );
        assert_eq!(
            relative_bounds(1, RelativeDirection::Preceding, RelativeCount::Count(1)),
            None
        );
        assert_eq!(
            relative_bounds(4, RelativeDirection::Preceding, RelativeCount::All),
            Some((3, 1))
        );
    }

    #[test]
    fn following_all_is_unbounded() {
        assert_eq!(
            relative_bounds(4, RelativeDirection::Following, RelativeCount::All),
            None
        );
    }
}
