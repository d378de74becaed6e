use regex::Captures;

use super::patterns::*;
use super::PatternMatcher;
use crate::config::LawGraphConfig;
use crate::ids::ArticleNumber;
use crate::law::Era;
use crate::numeral::parse_kanji_number;
use crate::types::{
    InstrumentKind, MatchedPattern, PatternClass, PatternTarget, RelativeCount,
    RelativeDirection, RelativeUnit,
};

/// Default number of characters inspected before a citation for a
/// qualifying law name.
pub const DEFAULT_LOOKBACK_WINDOW: usize = 10;

/// Regex-driven citation detector.
///
/// Classes are scanned in priority order. Each accepted match claims its
/// byte span, and lower-priority classes skip anything overlapping a claimed
/// span, so one citation is never reported twice.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    lookback_window: usize,
}

/// What precedes an article citation, as far as its law is concerned.
#[derive(Debug, PartialEq)]
enum Qualifier {
    /// No other law is named nearby: the citation is to the citing law.
    Own,
    /// The citation continues a list headed by this law's name, as `第六条`
    /// in `民法第五条及び第六条`.
    Chained(String),
    /// Another law is named within the lookback window but the citation is
    /// not grammatically attached to it.
    Nearby,
}

/// Per-call scan state.
struct Scan<'t> {
    text: &'t str,
    claimed: Vec<(usize, usize)>,
    patterns: Vec<MatchedPattern>,
}

impl<'t> Scan<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            text,
            claimed: Vec::new(),
            patterns: Vec::new(),
        }
    }

    fn is_free(&self, start: usize, end: usize) -> bool {
        !self.claimed.iter().any(|&(s, e)| start < e && s < end)
    }

    fn push(
        &mut self,
        start: usize,
        end: usize,
        class_kind: PatternClass,
        confidence: f64,
        target: PatternTarget,
        law_name: Option<String>,
    ) {
        self.claimed.push((start, end));
        self.patterns.push(MatchedPattern {
            text: self.text[start..end].to_string(),
            class_kind,
            position: start,
            confidence,
            target,
            law_name,
        });
    }

    fn finish(mut self) -> Vec<MatchedPattern> {
        self.patterns.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.class_kind.cmp(&b.class_kind))
        });
        self.patterns
    }
}

/// Parses the numeral in capture group `name`, if it participated.
fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| parse_kanji_number(m.as_str()))
}

/// Builds an article number from a base group and an optional branch group.
fn article_number(caps: &Captures<'_>, base: &str, branch: &str) -> Option<ArticleNumber> {
    let major = number(caps, base)?;
    match caps.name(branch) {
        Some(m) => parse_kanji_number(m.as_str()).map(|minor| ArticleNumber::with_branch(major, minor)),
        None => Some(ArticleNumber::new(major)),
    }
}

impl PatternDetector {
    pub fn new() -> Self {
        Self::with_lookback(DEFAULT_LOOKBACK_WINDOW)
    }

    pub fn with_lookback(lookback_window: usize) -> Self {
        Self { lookback_window }
    }

    pub fn from_config(config: &LawGraphConfig) -> Self {
        Self::with_lookback(config.lookback_window)
    }

    pub fn lookback_window(&self) -> usize {
        self.lookback_window
    }

    /// Scans `text` and returns every citation found, ordered by position and
    /// then by class priority.
    pub fn detect(&self, text: &str) -> Vec<MatchedPattern> {
        let mut scan = Scan::new(text);
        self.scan_external(&mut scan);
        self.scan_ranges(&mut scan);
        self.scan_enumerations(&mut scan);
        self.scan_internal(&mut scan);
        self.scan_relative(&mut scan);
        self.scan_administrative(&mut scan);
        scan.finish()
    }

    /// Decides which law the citation starting at `start` belongs to.
    ///
    /// A preceding list of citations is skipped first, so every member of
    /// `民法第五条、第六条及び第七条` sees `民法` directly before it. The
    /// lookback window is measured from the start of that list.
    fn qualifier(&self, text: &str, start: usize) -> Qualifier {
        let mut before = &text[..start];
        let chained = match CITATION_CHAIN_TAIL.find(before) {
            Some(chain) => {
                before = &before[..chain.start()];
                true
            }
            None => false,
        };
        if chained {
            let head = LAW_NUMBER_TAIL
                .find(before)
                .map_or(before, |number| &before[..number.start()]);
            if let Some(name) = LAW_NAME_TAIL.find(head) {
                if names_other_law(name.as_str()) {
                    return Qualifier::Chained(name.as_str().to_string());
                }
            }
        }

        let window_start = before
            .char_indices()
            .rev()
            .take(self.lookback_window)
            .last()
            .map_or(before.len(), |(i, _)| i);
        let nearby = LAW_NAME
            .find_iter(&before[window_start..])
            .any(|m| names_other_law(m.as_str()));
        if nearby {
            Qualifier::Nearby
        } else {
            Qualifier::Own
        }
    }

    // ------------------------------------------------------------------
    // Class scans, highest priority first
    // ------------------------------------------------------------------

    fn scan_external(&self, scan: &mut Scan<'_>) {
        for caps in EXTERNAL_LAW.captures_iter(scan.text) {
            let Some(whole) = caps.get(0) else { continue };
            let law = &caps["law"];
            if !names_other_law(law) || !scan.is_free(whole.start(), whole.end()) {
                continue;
            }
            let Some(start) = article_number(&caps, "n", "nb") else {
                continue;
            };
            let target = match article_number(&caps, "m", "mb") {
                Some(end) => PatternTarget::Range { start, end },
                None => PatternTarget::Article {
                    number: start,
                    paragraph: number(&caps, "para"),
                    item: None,
                },
            };
            scan.push(
                whole.start(),
                whole.end(),
                PatternClass::ExternalLaw,
                EXTERNAL_LAW_CONFIDENCE,
                target,
                Some(law.to_string()),
            );
        }
    }

    fn scan_ranges(&self, scan: &mut Scan<'_>) {
        for caps in RANGE.captures_iter(scan.text) {
            let Some(whole) = caps.get(0) else { continue };
            if !scan.is_free(whole.start(), whole.end()) {
                continue;
            }
            let (Some(start), Some(end)) = (
                article_number(&caps, "n", "nb"),
                article_number(&caps, "m", "mb"),
            ) else {
                continue;
            };
            let (class_kind, confidence, law_name) =
                match self.qualifier(scan.text, whole.start()) {
                    Qualifier::Own => (PatternClass::Range, RANGE_CONFIDENCE, None),
                    Qualifier::Chained(law) => {
                        (PatternClass::ExternalLaw, EXTERNAL_LAW_CONFIDENCE, Some(law))
                    }
                    Qualifier::Nearby => continue,
                };
            scan.push(
                whole.start(),
                whole.end(),
                class_kind,
                confidence,
                PatternTarget::Range { start, end },
                law_name,
            );
        }
    }

    fn scan_enumerations(&self, scan: &mut Scan<'_>) {
        let text = scan.text;
        for list in ENUMERATION.find_iter(text) {
            for caps in ARTICLE_REF.captures_iter(list.as_str()) {
                let Some(item) = caps.get(0) else { continue };
                let start = list.start() + item.start();
                let end = list.start() + item.end();
                if !scan.is_free(start, end) {
                    continue;
                }
                let Some(number) = article_number(&caps, "n", "nb") else {
                    continue;
                };
                let (class_kind, confidence, law_name) = match self.qualifier(text, start) {
                    Qualifier::Own => (PatternClass::Enumeration, ENUMERATION_CONFIDENCE, None),
                    Qualifier::Chained(law) => {
                        (PatternClass::ExternalLaw, EXTERNAL_LAW_CONFIDENCE, Some(law))
                    }
                    Qualifier::Nearby => continue,
                };
                scan.push(
                    start,
                    end,
                    class_kind,
                    confidence,
                    PatternTarget::Article {
                        number,
                        paragraph: self::number(&caps, "para"),
                        item: None,
                    },
                    law_name,
                );
            }
        }
    }

    fn scan_internal(&self, scan: &mut Scan<'_>) {
        for caps in ARTICLE_REF.captures_iter(scan.text) {
            let Some(whole) = caps.get(0) else { continue };
            if !scan.is_free(whole.start(), whole.end()) {
                continue;
            }
            let Some(number) = article_number(&caps, "n", "nb") else {
                continue;
            };
            let (class_kind, confidence, law_name) =
                match self.qualifier(scan.text, whole.start()) {
                    Qualifier::Own => {
                        (PatternClass::InternalArticle, INTERNAL_ARTICLE_CONFIDENCE, None)
                    }
                    Qualifier::Chained(law) => {
                        (PatternClass::ExternalLaw, EXTERNAL_LAW_CONFIDENCE, Some(law))
                    }
                    Qualifier::Nearby => continue,
                };
            let paragraph = self::number(&caps, "para");
            // An item without a paragraph is not addressable.
            let item = paragraph.and_then(|_| self::number(&caps, "item"));
            scan.push(
                whole.start(),
                whole.end(),
                class_kind,
                confidence,
                PatternTarget::Article {
                    number,
                    paragraph,
                    item,
                },
                law_name,
            );
        }
    }

    fn scan_relative(&self, scan: &mut Scan<'_>) {
        for caps in RELATIVE.captures_iter(scan.text) {
            let Some(whole) = caps.get(0) else { continue };
            if !scan.is_free(whole.start(), whole.end()) {
                continue;
            }
            let direction = match &caps["dir"] {
                "前" => RelativeDirection::Preceding,
                _ => RelativeDirection::Following,
            };
            let unit = match &caps["unit"] {
                "条" => RelativeUnit::Article,
                "項" => RelativeUnit::Paragraph,
                _ => RelativeUnit::Item,
            };
            let count = match caps.name("count").map(|m| m.as_str()) {
                None => RelativeCount::Count(1),
                Some("各") => RelativeCount::All,
                Some(n) => match parse_kanji_number(n) {
                    Some(n) if n > 0 => RelativeCount::Count(n),
                    _ => continue,
                },
            };
            scan.push(
                whole.start(),
                whole.end(),
                PatternClass::Relative,
                RELATIVE_CONFIDENCE,
                PatternTarget::Relative {
                    unit,
                    direction,
                    count,
                },
                None,
            );
        }
    }

    fn scan_administrative(&self, scan: &mut Scan<'_>) {
        for caps in DATED_INSTRUMENT.captures_iter(scan.text) {
            let Some(whole) = caps.get(0) else { continue };
            if !scan.is_free(whole.start(), whole.end()) {
                continue;
            }
            let year = match &caps["year"] {
                "元" => Some(1),
                y => parse_kanji_number(y),
            };
            let Some(year) = Era::parse(&caps["era"])
                .zip(year)
                .and_then(|(era, year)| era.to_gregorian_year(year))
            else {
                continue;
            };
            let name = &caps["inst"];
            let Some(kind) = InstrumentKind::from_suffix(name) else {
                continue;
            };
            scan.push(
                whole.start(),
                whole.end(),
                PatternClass::Administrative,
                DATED_INSTRUMENT_CONFIDENCE,
                PatternTarget::Instrument {
                    kind,
                    name: name.to_string(),
                    number: number(&caps, "num"),
                    year: Some(year),
                },
                None,
            );
        }

        for caps in NUMBERED_INSTRUMENT.captures_iter(scan.text) {
            let Some(whole) = caps.get(0) else { continue };
            if !scan.is_free(whole.start(), whole.end()) {
                continue;
            }
            let name = &caps["inst"];
            let Some(kind) = InstrumentKind::from_suffix(name) else {
                continue;
            };
            scan.push(
                whole.start(),
                whole.end(),
                PatternClass::Administrative,
                NUMBERED_INSTRUMENT_CONFIDENCE,
                PatternTarget::Instrument {
                    kind,
                    name: name.to_string(),
                    number: number(&caps, "num"),
                    year: None,
                },
                None,
            );
        }

        for caps in UNNUMBERED_INSTRUMENT.captures_iter(scan.text) {
            // Only the instrument name is claimed; the trailing verb stays
            // visible to reference-kind classification.
            let Some(inst) = caps.name("inst") else { continue };
            if !scan.is_free(inst.start(), inst.end()) {
                continue;
            }
            let name = inst.as_str();
            let Some(kind) = InstrumentKind::from_suffix(name) else {
                continue;
            };
            // Every instrument suffix is two characters long.
            let confidence = if name.chars().count() > 2 {
                NAMED_INSTRUMENT_CONFIDENCE
            } else {
                BARE_INSTRUMENT_CONFIDENCE
            };
            scan.push(
                inst.start(),
                inst.end(),
                PatternClass::Administrative,
                confidence,
                PatternTarget::Instrument {
                    kind,
                    name: name.to_string(),
                    number: None,
                    year: None,
                },
                None,
            );
        }
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher for PatternDetector {
    fn detect(&self, text: &str) -> Vec<MatchedPattern> {
        PatternDetector::detect(self, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_citation_names_the_list_head() {
        let detector = PatternDetector::new();
        let text = "民法（明治二十九年法律第八十九号）第五条及び第六条";
        let start = text.rfind("第六条").unwrap();
        assert_eq!(
            detector.qualifier(text, start),
            Qualifier::Chained("民法".to_string())
        );
    }

    #[test]
    fn window_is_measured_from_the_list_start() {
        let text = "民法による第一条、第二条、第三条、第四条";
        let start = text.rfind("第四条").unwrap();
        assert_eq!(
            PatternDetector::with_lookback(5).qualifier(text, start),
            Qualifier::Nearby
        );
        assert_eq!(
            PatternDetector::with_lookback(3).qualifier(text, start),
            Qualifier::Own
        );
    }
}
