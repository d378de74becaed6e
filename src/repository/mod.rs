//! Persistence capabilities consumed by the analysis and impact services.
//!
//! Two implementations ship with the crate: [`MemoryStore`] for tests and
//! small batches, and [`SqliteStore`] backed by an embedded schema.
mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::errors::Result;
use crate::ids::LawId;
use crate::law::Law;
use crate::types::Reference;

/// Storage of reference edges.
#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    /// References whose target is `node_id` with confidence at least
    /// `min_confidence`, ordered by source id and then kind.
    async fn find_incoming(&self, node_id: &str, min_confidence: f64) -> Result<Vec<Reference>>;

    /// Like [`find_incoming`](Self::find_incoming) for an article id, but
    /// also returns references targeting its paragraphs and items.
    async fn find_incoming_under(
        &self,
        article_id: &str,
        min_confidence: f64,
    ) -> Result<Vec<Reference>>;

    /// References whose source is `node_id`, in the same order.
    async fn find_outgoing(&self, node_id: &str) -> Result<Vec<Reference>>;

    /// Inserts a reference. An existing reference with the same id keeps
    /// whichever confidence is higher.
    async fn save(&self, reference: &Reference) -> Result<()>;

    async fn save_all(&self, references: &[Reference]) -> Result<()>;

    /// Removes a reference by id. Returns whether it existed.
    async fn delete(&self, reference_id: &str) -> Result<bool>;
}

/// Storage of law records.
#[async_trait]
pub trait LawRepository: Send + Sync {
    async fn find_by_id(&self, law_id: &LawId) -> Result<Option<Law>>;

    async fn find_all(&self) -> Result<Vec<Law>>;

    async fn save_law(&self, law: &Law) -> Result<()>;
}

/// Canonical ordering shared by both stores.
pub(crate) fn sort_references(references: &mut [Reference]) {
    references.sort_by(|a, b| {
        a.source_node
            .id
            .cmp(&b.source_node.id)
            .then_with(|| a.reference_kind.as_str().cmp(b.reference_kind.as_str()))
            .then_with(|| a.target_node.id.cmp(&b.target_node.id))
    });
}
