//! Reference resolution.
//!
//! Turns detected patterns into concrete `Reference` edges, escalating to an
//! optional AI resolver when the deterministic rules are not confident
//! enough, then merges duplicates and expands spans.
mod consolidator;
mod resolver;

pub use consolidator::{consolidate, expand_spans};
pub use resolver::{meta, BasicResolver};

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{MatchedPattern, Reference, SourceArticle};

/// Resolves one detected pattern in the context of its citing provision.
///
/// Implementations never fail; anything that goes wrong becomes `None`.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, pattern: &MatchedPattern, article: &SourceArticle) -> Option<Reference>;
}

/// External resolver consulted for patterns the rules cannot settle.
///
/// Errors are logged and treated as "no answer" by the caller.
#[async_trait]
pub trait AiResolver: Send + Sync {
    async fn resolve(
        &self,
        pattern: &MatchedPattern,
        article: &SourceArticle,
    ) -> Result<Option<Reference>>;
}
