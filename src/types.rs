use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::{ArticleId, ArticleNumber, LawId};

/// Kinds of nodes in the reference graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Law,
    Article,
    Paragraph,
    Item,
}

#[allow(clippy::should_implement_trait)]
impl NodeKind {
    /// Returns the string representation of this node kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Law => "law",
            NodeKind::Article => "article",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Item => "item",
        }
    }

    /// Parses a string into a `NodeKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<NodeKind> {
        match s {
            "law" => Some(NodeKind::Law),
            "article" => Some(NodeKind::Article),
            "paragraph" => Some(NodeKind::Paragraph),
            "item" => Some(NodeKind::Item),
            _ => None,
        }
    }
}

/// How a citing provision relates to the provision it cites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReferenceKind {
    /// 準用: the target's rules apply mutatis mutandis.
    Apply,
    /// みなす: legal fiction.
    Deem,
    /// 読み替え: the target applies with wording replaced.
    Replace,
    /// 除く: carve-out.
    Except,
    /// なお従前の例による: transitional continuation.
    Follow,
    Limit,
    Regardless,
    Relate,
    Stipulate,
    Example,
    Similar,
    Substitute,
    Addition,
}

#[allow(clippy::should_implement_trait)]
impl ReferenceKind {
    pub const ALL: [ReferenceKind; 13] = [
        ReferenceKind::Apply,
        ReferenceKind::Deem,
        ReferenceKind::Replace,
        ReferenceKind::Except,
        ReferenceKind::Follow,
        ReferenceKind::Limit,
        ReferenceKind::Regardless,
        ReferenceKind::Relate,
        ReferenceKind::Stipulate,
        ReferenceKind::Example,
        ReferenceKind::Similar,
        ReferenceKind::Substitute,
        ReferenceKind::Addition,
    ];

    /// Returns the string representation of this reference kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Apply => "APPLY",
            ReferenceKind::Deem => "DEEM",
            ReferenceKind::Replace => "REPLACE",
            ReferenceKind::Except => "EXCEPT",
            ReferenceKind::Follow => "FOLLOW",
            ReferenceKind::Limit => "LIMIT",
            ReferenceKind::Regardless => "REGARDLESS",
            ReferenceKind::Relate => "RELATE",
            ReferenceKind::Stipulate => "STIPULATE",
            ReferenceKind::Example => "EXAMPLE",
            ReferenceKind::Similar => "SIMILAR",
            ReferenceKind::Substitute => "SUBSTITUTE",
            ReferenceKind::Addition => "ADDITION",
        }
    }

    /// Parses a string into a `ReferenceKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<ReferenceKind> {
        ReferenceKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Detection classes, declared in descending priority.
///
/// The derived `Ord` is the priority order used to break position ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatternClass {
    ExternalLaw,
    Range,
    Enumeration,
    InternalArticle,
    Relative,
    Administrative,
}

impl PatternClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternClass::ExternalLaw => "external_law",
            PatternClass::Range => "range",
            PatternClass::Enumeration => "enumeration",
            PatternClass::InternalArticle => "internal_article",
            PatternClass::Relative => "relative",
            PatternClass::Administrative => "administrative",
        }
    }
}

/// Positional unit of a relative reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativeUnit {
    /// 条
    Article,
    /// 項
    Paragraph,
    /// 号
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativeDirection {
    /// 前
    Preceding,
    /// 次
    Following,
}

/// How many units a relative reference spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativeCount {
    /// 前項 is `Count(1)`, 前二項 is `Count(2)`.
    Count(u32),
    /// 前各項: every preceding unit.
    All,
}

/// Administrative instrument forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    /// 規則
    Rule,
    /// 省令, 府令
    Ordinance,
    /// 政令
    Regulation,
    /// 告示
    Notice,
    /// 訓令, 通達
    Directive,
    /// 勅令
    ImperialOrder,
    /// 法律, cited by law number
    Act,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Rule => "rule",
            InstrumentKind::Ordinance => "ordinance",
            InstrumentKind::Regulation => "regulation",
            InstrumentKind::Notice => "notice",
            InstrumentKind::Directive => "directive",
            InstrumentKind::ImperialOrder => "imperial_order",
            InstrumentKind::Act => "act",
        }
    }

    /// Classifies an instrument by the suffix of its name.
    pub fn from_suffix(name: &str) -> Option<InstrumentKind> {
        if name.ends_with("省令") || name.ends_with("府令") {
            Some(InstrumentKind::Ordinance)
        } else if name.ends_with("政令") {
            Some(InstrumentKind::Regulation)
        } else if name.ends_with("勅令") {
            Some(InstrumentKind::ImperialOrder)
        } else if name.ends_with("規則") {
            Some(InstrumentKind::Rule)
        } else if name.ends_with("告示") {
            Some(InstrumentKind::Notice)
        } else if name.ends_with("訓令") || name.ends_with("通達") {
            Some(InstrumentKind::Directive)
        } else if name.ends_with("法律") {
            Some(InstrumentKind::Act)
        } else {
            None
        }
    }
}

/// What a detected pattern points at, with numerals already canonicalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternTarget {
    Article {
        number: ArticleNumber,
        paragraph: Option<u32>,
        item: Option<u32>,
    },
    Range {
        start: ArticleNumber,
        end: ArticleNumber,
    },
    Relative {
        unit: RelativeUnit,
        direction: RelativeDirection,
        count: RelativeCount,
    },
    Instrument {
        kind: InstrumentKind,
        /// Full instrument name as written, e.g. `厚生労働省令`.
        name: String,
        number: Option<u32>,
        /// Gregorian year when the citation is era-dated.
        year: Option<i32>,
    },
}

/// A candidate reference found by the detector. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPattern {
    pub text: String,
    pub class_kind: PatternClass,
    /// Byte offset of `text` inside the scanned text.
    pub position: usize,
    pub confidence: f64,
    pub target: PatternTarget,
    /// Law name qualifying the citation, for external-law patterns.
    pub law_name: Option<String>,
}

impl MatchedPattern {
    /// Byte offset one past the end of the match.
    pub fn end(&self) -> usize {
        self.position + self.text.len()
    }
}

/// Identity of a node in the reference graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceNode {
    pub kind: NodeKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ReferenceNode {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            text: None,
        }
    }

    pub fn law(law_id: &LawId) -> Self {
        Self::new(NodeKind::Law, law_id.as_str())
    }

    pub fn article(article_id: &ArticleId) -> Self {
        Self::new(NodeKind::Article, article_id.to_string())
    }

    pub fn paragraph(article_id: &ArticleId, paragraph: u32) -> Self {
        Self::new(NodeKind::Paragraph, article_id.paragraph_id(paragraph))
    }

    pub fn item(article_id: &ArticleId, paragraph: u32, item: u32) -> Self {
        Self::new(NodeKind::Item, article_id.item_id(paragraph, item))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A directed edge: the source provision cites the target provision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    pub source_node: ReferenceNode,
    pub target_node: ReferenceNode,
    pub reference_kind: ReferenceKind,
    pub source_text: String,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Reference {
    /// Builds a reference, deriving its id from the uniqueness key and
    /// clamping the confidence into `[0, 1]`.
    pub fn new(
        source_node: ReferenceNode,
        target_node: ReferenceNode,
        reference_kind: ReferenceKind,
        source_text: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: generate_reference_id(&source_node.id, &target_node.id, reference_kind),
            source_node,
            target_node,
            reference_kind,
            source_text: source_text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Uniqueness key: `(source id, target id, kind)`.
    pub fn key(&self) -> (&str, &str, ReferenceKind) {
        (
            self.source_node.id.as_str(),
            self.target_node.id.as_str(),
            self.reference_kind,
        )
    }

    /// Returns a copy pointing at another target, with a fresh id.
    pub fn retarget(&self, target_node: ReferenceNode) -> Self {
        Self {
            id: generate_reference_id(&self.source_node.id, &target_node.id, self.reference_kind),
            target_node,
            ..self.clone()
        }
    }
}

/// Generates a deterministic reference ID from its uniqueness key.
///
/// The ID format is `"ref:32hexchars"` where the hex portion is the first 32
/// characters of the SHA-256 hash of the key components.
pub fn generate_reference_id(source_id: &str, target_id: &str, kind: ReferenceKind) -> String {
    let input = format!("{}:{}:{}", source_id, target_id, kind.as_str());
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let hash = hasher.finalize();
    let hex_str = hex::encode(hash);
    format!("ref:{}", &hex_str[..32])
}

/// The citing provision a pattern was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceArticle {
    pub law_id: LawId,
    pub number: ArticleNumber,
    /// Paragraph the text belongs to, when known.
    pub paragraph: Option<u32>,
    /// Item the text belongs to, when known. Requires `paragraph`.
    pub item: Option<u32>,
    pub text: String,
}

impl SourceArticle {
    pub fn new(law_id: LawId, number: impl Into<ArticleNumber>, text: &str) -> Self {
        Self {
            law_id,
            number: number.into(),
            paragraph: None,
            item: None,
            text: text.to_string(),
        }
    }

    pub fn in_paragraph(mut self, paragraph: u32) -> Self {
        self.paragraph = Some(paragraph);
        self
    }

    pub fn in_item(mut self, item: u32) -> Self {
        self.item = Some(item);
        self
    }

    pub fn article_id(&self) -> ArticleId {
        self.law_id.article(self.number)
    }

    /// The most specific node for this provision.
    pub fn node(&self) -> ReferenceNode {
        let article = self.article_id();
        match (self.paragraph, self.item) {
            (Some(p), Some(i)) => ReferenceNode::item(&article, p, i),
            (Some(p), None) => ReferenceNode::paragraph(&article, p),
            _ => ReferenceNode::article(&article),
        }
    }
}

/// Category of an estimated amendment impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactKind {
    DirectApplication,
    TextReplacement,
    LegalFiction,
    Exception,
    General,
}

impl ImpactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactKind::DirectApplication => "DirectApplication",
            ImpactKind::TextReplacement => "TextReplacement",
            ImpactKind::LegalFiction => "LegalFiction",
            ImpactKind::Exception => "Exception",
            ImpactKind::General => "General",
        }
    }
}

impl From<ReferenceKind> for ImpactKind {
    fn from(kind: ReferenceKind) -> Self {
        match kind {
            ReferenceKind::Apply => ImpactKind::DirectApplication,
            ReferenceKind::Replace => ImpactKind::TextReplacement,
            ReferenceKind::Deem => ImpactKind::LegalFiction,
            ReferenceKind::Except => ImpactKind::Exception,
            _ => ImpactKind::General,
        }
    }
}

/// A provision reached by the backward traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactedNode {
    pub node_id: String,
    pub node_kind: NodeKind,
    pub impact_kind: ImpactKind,
    pub impact_path: Vec<String>,
    pub confidence: f64,
    pub depth: u32,
}

/// Options controlling an impact query.
#[derive(Debug, Clone)]
pub struct ImpactOptions {
    pub depth: u32,
    pub include_indirect: bool,
    pub confidence_threshold: f64,
    /// Checked between frontier pops; a passed deadline truncates the result.
    pub deadline: Option<Instant>,
}

impl Default for ImpactOptions {
    fn default() -> Self {
        ImpactOptions {
            depth: 3,
            include_indirect: true,
            confidence_threshold: 0.7,
            deadline: None,
        }
    }
}

/// Counts describing an impact query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub total_affected_laws: usize,
    pub total_affected_articles: usize,
    pub direct_impacts: usize,
    pub indirect_impacts: usize,
    pub max_depth_reached: u32,
}

/// Impacted provisions of one law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedLaw {
    pub law_id: LawId,
    pub law_title: String,
    pub articles: Vec<ImpactedNode>,
}

/// Result of an amendment impact query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysisResult {
    pub amended_law_id: LawId,
    pub amended_articles: Vec<ArticleNumber>,
    pub summary: ImpactSummary,
    pub affected_items: Vec<AffectedLaw>,
    pub executed_at: DateTime<Utc>,
    /// Set when a deadline stopped the traversal early.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}
