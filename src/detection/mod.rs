//! Citation detection over statute text.
//!
//! The detector scans plain article text and produces ordered
//! `MatchedPattern`s with canonicalized targets; the classifier assigns a
//! reference kind from the wording that follows each citation.
mod classify;
mod detector;
pub mod patterns;

pub use classify::{classify_reference_kind, CLASSIFY_WINDOW};
pub use detector::{PatternDetector, DEFAULT_LOOKBACK_WINDOW};

use crate::types::MatchedPattern;

/// Source of candidate citations for one piece of text.
///
/// Implementations must be deterministic: the same text always yields the
/// same patterns in the same order.
pub trait PatternMatcher: Send + Sync {
    fn detect(&self, text: &str) -> Vec<MatchedPattern>;
}
