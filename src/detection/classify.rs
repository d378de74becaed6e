use crate::types::ReferenceKind;

/// Characters after a citation inspected for a kind-deciding phrase.
pub const CLASSIFY_WINDOW: usize = 30;

/// Phrase table, most specific first. The first rule with a phrase inside
/// the window decides the kind.
const RULES: &[(&[&str], ReferenceKind)] = &[
    (&["読み替え", "読替え"], ReferenceKind::Replace),
    (&["準用"], ReferenceKind::Apply),
    (&["みなす", "みなし"], ReferenceKind::Deem),
    (&["従前の例", "なお効力", "従う"], ReferenceKind::Follow),
    (&["除く", "除き"], ReferenceKind::Except),
    (&["かかわらず"], ReferenceKind::Regardless),
    (&["限る", "限り"], ReferenceKind::Limit),
    (&["代えて", "代わる"], ReferenceKind::Substitute),
    (&["のほか", "加え"], ReferenceKind::Addition),
    (&["例による", "例に"], ReferenceKind::Similar),
    (&["掲げる"], ReferenceKind::Example),
    (&["定める", "規定により", "規定による"], ReferenceKind::Stipulate),
];

/// Decides the reference kind of a citation ending at byte offset `end`
/// from the wording that follows it, up to the end of the sentence.
pub fn classify_reference_kind(text: &str, end: usize) -> ReferenceKind {
    let tail = text.get(end..).unwrap_or("");
    let clause: String = tail
        .chars()
        .take_while(|&c| c != '。')
        .take(CLASSIFY_WINDOW)
        .collect();

    RULES
        .iter()
        .find(|(phrases, _)| phrases.iter().any(|p| clause.contains(p)))
        .map_or(ReferenceKind::Relate, |&(_, kind)| kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_sentence_end() {
        let text = "第三条の規定は適用しない。同条を準用する。";
        assert_eq!(classify_reference_kind(text, "第三条".len()), ReferenceKind::Relate);
    }

    #[test]
    fn replacement_outranks_application() {
        let text = "第三条の規定を準用する。この場合において読み替えるものとする";
        let end = "第三条".len();
        assert_eq!(classify_reference_kind(text, end), ReferenceKind::Apply);
        let text = "第三条の規定を読み替えて準用する。";
        assert_eq!(classify_reference_kind(text, end), ReferenceKind::Replace);
    }
}
