//! Conversion between Japanese numeral notation and integers.
//!
//! Statute text writes article, paragraph and instrument numbers in kanji
//! ("第九十八条"), in ASCII digits ("第98条") or in full-width digits
//! ("第９８条"). Everything downstream works on canonical integers.

use crate::ids::ArticleNumber;

const KANJI_DIGITS: [char; 10] = ['〇', '一', '二', '三', '四', '五', '六', '七', '八', '九'];

/// Returns the value of a single kanji digit, including the `零` variant.
fn kanji_digit(c: char) -> Option<u32> {
    match c {
        '〇' | '零' => Some(0),
        '一' => Some(1),
        '二' => Some(2),
        '三' => Some(3),
        '四' => Some(4),
        '五' => Some(5),
        '六' => Some(6),
        '七' => Some(7),
        '八' => Some(8),
        '九' => Some(9),
        _ => None,
    }
}

fn kanji_multiplier(c: char) -> Option<u32> {
    match c {
        '十' => Some(10),
        '百' => Some(100),
        '千' => Some(1000),
        _ => None,
    }
}

/// Returns the value of an ASCII or full-width decimal digit.
fn arabic_digit(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        '０'..='９' => Some(c as u32 - '０' as u32),
        _ => None,
    }
}

/// Parses a Japanese or Arabic numeral into an integer.
///
/// Handles:
/// - Arabic input, ASCII or full-width (`"98"`, `"９８"`), passed through as-is.
/// - Multiplier compounds (`"九十八"` → 98, `"千二百"` → 1200, `"十"` → 10).
/// - Positional kanji digits (`"二〇"` → 20).
///
/// Returns `None` for empty input, for any character outside the numeral
/// alphabet, and on overflow.
pub fn parse_kanji_number(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.chars().all(|c| arabic_digit(c).is_some()) {
        return text.chars().try_fold(0u32, |acc, c| {
            acc.checked_mul(10)?.checked_add(arabic_digit(c)?)
        });
    }

    let mut total: u32 = 0;
    // Digits seen since the last multiplier.
    let mut current: Option<u32> = None;

    for c in text.chars() {
        if let Some(d) = kanji_digit(c) {
            current = Some(current.unwrap_or(0).checked_mul(10)?.checked_add(d)?);
        } else if let Some(m) = kanji_multiplier(c) {
            // A bare multiplier ("十", "百") means one of it.
            let coefficient = current.take().unwrap_or(1);
            total = total.checked_add(coefficient.checked_mul(m)?)?;
        } else {
            return None;
        }
    }

    total.checked_add(current.unwrap_or(0))
}

/// Renders an integer in canonical kanji notation.
///
/// Only values below 1000 are converted; larger values are returned as
/// plain ASCII digits.
pub fn arabic_to_kanji(n: u32) -> String {
    if n >= 1000 {
        return n.to_string();
    }
    if n == 0 {
        return KANJI_DIGITS[0].to_string();
    }

    let mut out = String::new();
    let hundreds = n / 100;
    let tens = (n / 10) % 10;
    let ones = n % 10;

    if hundreds > 0 {
        if hundreds > 1 {
            out.push(KANJI_DIGITS[hundreds as usize]);
        }
        out.push('百');
    }
    if tens > 0 {
        if tens > 1 {
            out.push(KANJI_DIGITS[tens as usize]);
        }
        out.push('十');
    }
    if ones > 0 {
        out.push(KANJI_DIGITS[ones as usize]);
    }
    out
}

/// Parses a possibly branch-numbered article number such as `"九十八の二"`,
/// `"98の2"` or the id form `"98_2"`.
pub fn parse_article_number(text: &str) -> Option<ArticleNumber> {
    let text = text.trim();
    let (base, branch) = match text.split_once('の').or_else(|| text.split_once('_')) {
        Some((base, branch)) => (base, Some(branch)),
        None => (text, None),
    };

    let major = parse_kanji_number(base)?;
    let minor = match branch {
        Some(b) => Some(parse_kanji_number(b)?),
        None => None,
    };
    Some(ArticleNumber { major, minor })
}

/// Encodes a branch number as `base + branch / 100`.
///
/// This is the legacy scalar form. It collides for branches of 100 and
/// above (`5の100` and `6` both encode to `6.0`); use [`ArticleNumber`]
/// wherever the value has to round-trip.
pub fn encode_branch_lossy(base: u32, branch: u32) -> f64 {
    f64::from(base) + f64::from(branch) / 100.0
}
