//! Validated identifiers for laws and the provisions inside them.
//!
//! Every id is checked when it is built, so a malformed law id never reaches
//! detection, resolution or traversal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{LawGraphError, Result};

/// Length of a law id: 3-digit year code, 2-letter type code, 10-digit sequence.
pub const LAW_ID_LEN: usize = 15;

/// Separator between a law id and the article part of an article id.
pub const ARTICLE_SEPARATOR: &str = "_art";

/// Separator between an article id and the paragraph part of a node id.
pub const PARAGRAPH_SEPARATOR: &str = "_para";

/// The article a provision node belongs to: `<law>_art5_para2_item1` and
/// `<law>_art5_para2` both give `<law>_art5`. Other ids are returned as-is.
pub fn article_node_id(node_id: &str) -> &str {
    node_id
        .split_once(PARAGRAPH_SEPARATOR)
        .map_or(node_id, |(article, _)| article)
}

/// Fixed-width law identifier, e.g. `129AC0000000089`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LawId(String);

impl LawId {
    /// Validates and wraps a law id.
    pub fn new(value: &str) -> Result<Self> {
        let bytes = value.as_bytes();
        if bytes.len() != LAW_ID_LEN {
            return Err(LawGraphError::invalid_id(
                format!("law id must be {LAW_ID_LEN} characters"),
                value,
            ));
        }
        let well_formed = bytes[..3].iter().all(u8::is_ascii_digit)
            && bytes[3..5].iter().all(u8::is_ascii_uppercase)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(LawGraphError::invalid_id(
                "law id must be 3 digits, 2 uppercase letters, 10 digits",
                value,
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// Extracts the law id prefix of any provision id (`<law>_art…`).
    pub fn from_node_id(node_id: &str) -> Result<Self> {
        let prefix = node_id.split('_').next().unwrap_or(node_id);
        Self::new(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 3-digit era/year code.
    pub fn year_code(&self) -> &str {
        &self.0[..3]
    }

    /// The 2-letter law type code (`AC`, `CO`, `IO`, ...).
    pub fn type_code(&self) -> &str {
        &self.0[3..5]
    }

    /// Builds the id of an article of this law.
    pub fn article(&self, number: ArticleNumber) -> ArticleId {
        ArticleId {
            law_id: self.clone(),
            number,
        }
    }
}

impl fmt::Display for LawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LawId {
    type Err = LawGraphError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for LawId {
    type Error = LawGraphError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<LawId> for String {
    fn from(id: LawId) -> Self {
        id.0
    }
}

/// An article number with an optional branch: `第九十八条の二` is `{98, Some(2)}`.
///
/// Serialized as a JSON number when unbranched (`709`) and in id form when
/// branched (`"98_2"`). Both forms, and `"709"`, deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleNumber {
    pub major: u32,
    pub minor: Option<u32>,
}

impl ArticleNumber {
    pub fn new(major: u32) -> Self {
        Self { major, minor: None }
    }

    pub fn with_branch(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor: Some(minor),
        }
    }

    /// Legacy scalar encoding, lossy for branches of 100 and above.
    pub fn as_lossy_f64(&self) -> f64 {
        match self.minor {
            Some(minor) => crate::numeral::encode_branch_lossy(self.major, minor),
            None => f64::from(self.major),
        }
    }
}

impl From<u32> for ArticleNumber {
    fn from(major: u32) -> Self {
        Self::new(major)
    }
}

impl TryFrom<String> for ArticleNumber {
    type Error = LawGraphError;

    fn try_from(value: String) -> Result<Self> {
        crate::numeral::parse_article_number(&value)
            .ok_or_else(|| LawGraphError::invalid_id("malformed article number", value))
    }
}

impl Serialize for ArticleNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.minor {
            None => serializer.serialize_u32(self.major),
            Some(_) => serializer.collect_str(self),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArticleNumberRepr {
    Number(u32),
    Text(String),
}

impl<'de> Deserialize<'de> for ArticleNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match ArticleNumberRepr::deserialize(deserializer)? {
            ArticleNumberRepr::Number(major) => Ok(Self::new(major)),
            ArticleNumberRepr::Text(text) => Self::try_from(text).map_err(serde::de::Error::custom),
        }
    }
}

impl fmt::Display for ArticleNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{}_{}", self.major, minor),
            None => write!(f, "{}", self.major),
        }
    }
}

/// Identifier of an article: `<law id>_art<number>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleId {
    pub law_id: LawId,
    pub number: ArticleNumber,
}

impl ArticleId {
    pub fn new(law_id: LawId, number: ArticleNumber) -> Self {
        Self { law_id, number }
    }

    /// Parses `<law id>_art<number>` where number is `N` or `N_M`.
    pub fn parse(value: &str) -> Result<Self> {
        let (law, number) = value
            .split_once(ARTICLE_SEPARATOR)
            .ok_or_else(|| LawGraphError::invalid_id("missing '_art' separator", value))?;
        let law_id = LawId::new(law)?;
        let number = crate::numeral::parse_article_number(number)
            .filter(|n| n.major > 0)
            .ok_or_else(|| LawGraphError::invalid_id("malformed article number", value))?;
        Ok(Self { law_id, number })
    }

    /// Id of a paragraph of this article.
    pub fn paragraph_id(&self, paragraph: u32) -> String {
        format!("{self}{PARAGRAPH_SEPARATOR}{paragraph}")
    }

    /// Id of an item inside a paragraph of this article.
    pub fn item_id(&self, paragraph: u32, item: u32) -> String {
        format!("{self}{PARAGRAPH_SEPARATOR}{paragraph}_item{item}")
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.law_id, ARTICLE_SEPARATOR, self.number)
    }
}

impl FromStr for ArticleId {
    type Err = LawGraphError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
