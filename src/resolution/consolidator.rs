use std::collections::HashMap;

use tracing::debug;

use super::meta;
use crate::types::{Reference, ReferenceKind, ReferenceNode};

/// Merges references sharing `(source, target, kind)`.
///
/// The survivor carries the highest confidence; on a tie the earlier one is
/// kept. Output keeps the order of first appearance, so applying this twice
/// gives the same result as applying it once.
pub fn consolidate(references: Vec<Reference>) -> Vec<Reference> {
    let mut index: HashMap<(String, String, ReferenceKind), usize> = HashMap::new();
    let mut merged: Vec<Reference> = Vec::with_capacity(references.len());

    for reference in references {
        let key = (
            reference.source_node.id.clone(),
            reference.target_node.id.clone(),
            reference.reference_kind,
        );
        match index.get(&key) {
            Some(&i) => {
                if reference.confidence > merged[i].confidence {
                    merged[i] = reference;
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(reference);
            }
        }
    }
    merged
}

/// Replaces each span reference (`spanFrom`..`spanTo`) with one reference
/// per covered target.
///
/// Spans wider than `max_span` are left as a single reference to their
/// first target. References without span metadata pass through untouched.
pub fn expand_spans(references: Vec<Reference>, max_span: u32) -> Vec<Reference> {
    let mut out = Vec::with_capacity(references.len());
    for reference in references {
        match span_of(&reference) {
            Some((from, to, marker)) if to - from < max_span => {
                let Some((base, _)) = reference.target_node.id.rsplit_once(marker) else {
                    out.push(reference);
                    continue;
                };
                let base = base.to_string();
                let mut template = reference.clone();
                for key in [meta::SPAN_FROM, meta::SPAN_TO, meta::SPAN_UNIT] {
                    template.metadata.remove(key);
                }
                template
                    .metadata
                    .insert("span".to_string(), format!("{from}-{to}"));
                for n in from..=to {
                    let node = ReferenceNode {
                        kind: reference.target_node.kind,
                        id: format!("{base}{marker}{n}"),
                        text: reference.target_node.text.clone(),
                    };
                    out.push(template.retarget(node));
                }
            }
            Some((from, to, _)) => {
                debug!(from, to, max_span, text = %reference.source_text, "span too wide, not expanded");
                out.push(reference);
            }
            None => out.push(reference),
        }
    }
    out
}

/// Reads span metadata as `(from, to, id marker)`.
fn span_of(reference: &Reference) -> Option<(u32, u32, &'static str)> {
    let from: u32 = reference.metadata.get(meta::SPAN_FROM)?.parse().ok()?;
    let to: u32 = reference.metadata.get(meta::SPAN_TO)?.parse().ok()?;
    let marker = match reference.metadata.get(meta::SPAN_UNIT)?.as_str() {
        "article" => "_art",
        "paragraph" => "_para",
        "item" => "_item",
        _ => return None,
    };
    (from <= to).then_some((from, to, marker))
}
