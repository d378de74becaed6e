//! Compiled citation patterns and the confidence assigned to each class.
//!
//! Numerals are matched as ASCII, full-width or kanji digits and are
//! canonicalized by the detector through [`crate::numeral`].

use std::sync::LazyLock;

use regex::Regex;

pub const EXTERNAL_LAW_CONFIDENCE: f64 = 0.95;
pub const RANGE_CONFIDENCE: f64 = 0.90;
pub const ENUMERATION_CONFIDENCE: f64 = 0.85;
pub const INTERNAL_ARTICLE_CONFIDENCE: f64 = 0.90;
pub const RELATIVE_CONFIDENCE: f64 = 0.80;

/// Era-dated numbered instrument, e.g. `昭和二十二年政令第十六号`.
pub const DATED_INSTRUMENT_CONFIDENCE: f64 = 0.90;
/// Numbered instrument, e.g. `厚生労働省令第五号`.
pub const NUMBERED_INSTRUMENT_CONFIDENCE: f64 = 0.85;
/// Unnumbered instrument with a named issuer, e.g. `厚生労働省令で定める`.
pub const NAMED_INSTRUMENT_CONFIDENCE: f64 = 0.75;
/// Bare unnumbered instrument, e.g. `政令で定める`.
pub const BARE_INSTRUMENT_CONFIDENCE: f64 = 0.70;

/// Law names that denote the citing law itself.
pub const SELF_LAW_NAMES: &[&str] = &["本法", "法", "法律", "令", "本令"];

/// Common nouns that end like a law name but never name one: 法令 (laws in
/// general), 方法 (method), 命令 (order), and so on. Matched as suffixes, so
/// 関係法令 and 解決方法 are generic too.
pub const GENERIC_LAW_NOUNS: &[&str] = &[
    "法令", "方法", "命令", "司法", "立法", "手法", "用法", "作法", "文法",
];

/// Returns true when `name` can stand for a law other than the citing one.
pub fn names_other_law(name: &str) -> bool {
    !SELF_LAW_NAMES.contains(&name) && !GENERIC_LAW_NOUNS.iter().any(|g| name.ends_with(g))
}

/// Numeral alphabet: ASCII, full-width and kanji digits plus multipliers.
const NUM: &str = "[0-9０-９〇一二三四五六七八九十百千]+";

/// Characters allowed inside a law or issuer name. Structural words of a
/// citation (第, 条, 項, 号) and conjunction heads (及, 並, 又, 若) are
/// excluded so a name never swallows the citation before it.
const NAME_CHAR: &str = "[[\\p{Han}\\p{Katakana}ー]--[第条項号及並又若]]";

/// Suffixes that end a law name.
const LAW_SUFFIX: &str = "(?:法律|法|令|規則|条例)";

/// Parenthetical law number after a law name.
const LAW_NUMBER: &str = "(?:（[^）]{0,60}）|\\([^)]{0,60}\\))";

/// List separators between citations.
const SEPARATOR: &str = "(?:、|，|,|及び|並びに|又は|若しくは)";

/// Instrument suffixes for administrative citations.
const INSTRUMENT_SUFFIX: &str = "(?:省令|府令|政令|勅令|規則|告示|訓令|通達)";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("citation pattern must compile")
}

/// `〈law name〉（law number）第N条[の M][から第K条まで][第P項]`
pub static EXTERNAL_LAW: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        "(?P<law>{NAME_CHAR}+?{LAW_SUFFIX}){LAW_NUMBER}?\
         第(?P<n>{NUM})条(?:の(?P<nb>{NUM}))?\
         (?:から第(?P<m>{NUM})条(?:の(?P<mb>{NUM}))?まで)?\
         (?:第(?P<para>{NUM})項)?"
    ))
});

/// Any law name; used for the lookback qualification check.
pub static LAW_NAME: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!("{NAME_CHAR}+?{LAW_SUFFIX}")));

/// A law name ending the text, i.e. directly before whatever follows it.
pub static LAW_NAME_TAIL: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!("{NAME_CHAR}*{LAW_SUFFIX}$")));

/// A law number parenthetical ending the text.
pub static LAW_NUMBER_TAIL: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!("{LAW_NUMBER}$")));

/// One or more separated citations ending the text: the `第五条及び` in
/// `民法第五条及び第六条`, seen from `第六条`.
pub static CITATION_CHAIN_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    let cite = format!(
        "第{NUM}条(?:の{NUM})?(?:から第{NUM}条(?:の{NUM})?まで)?(?:第{NUM}項)?(?:第{NUM}号)?"
    );
    compile(&format!("(?:{cite}{SEPARATOR})+$"))
});

/// `第N条から第M条まで`
pub static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        "第(?P<n>{NUM})条(?:の(?P<nb>{NUM}))?から第(?P<m>{NUM})条(?:の(?P<mb>{NUM}))?まで"
    ))
});

/// Two or more article citations joined by list separators.
pub static ENUMERATION: LazyLock<Regex> = LazyLock::new(|| {
    let item = format!("第{NUM}条(?:の{NUM})?(?:第{NUM}項)?");
    compile(&format!("{item}(?:{SEPARATOR}{item})+"))
});

/// `第N条[のM][第P項][第K号]`
pub static ARTICLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        "第(?P<n>{NUM})条(?:の(?P<nb>{NUM}))?(?:第(?P<para>{NUM})項)?(?:第(?P<item>{NUM})号)?"
    ))
});

/// `前項`, `次条`, `前二項`, `前各項`, `前号`, ...
pub static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    compile("(?P<dir>前|次)(?P<count>各|[一二三四五六七八九十]+)?(?P<unit>項|条|号)")
});

/// `昭和二十二年政令第十六号`, `平成元年法律第一号`
pub static DATED_INSTRUMENT: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        "(?P<era>明治|大正|昭和|平成|令和)(?P<year>元|{NUM})年\
         (?P<inst>法律|{NAME_CHAR}{{0,12}}?{INSTRUMENT_SUFFIX})第(?P<num>{NUM})号"
    ))
});

/// `厚生労働省令第五号`
pub static NUMBERED_INSTRUMENT: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        "(?P<inst>{NAME_CHAR}{{0,12}}?{INSTRUMENT_SUFFIX})第(?P<num>{NUM})号"
    ))
});

/// `政令で定める`, `国土交通省令の定める`
pub static UNNUMBERED_INSTRUMENT: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        "(?P<inst>{NAME_CHAR}{{0,12}}?{INSTRUMENT_SUFFIX})(?:で定める|の定める|に定める|による)"
    ))
});
