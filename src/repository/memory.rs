use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{sort_references, LawRepository, ReferenceRepository};
use crate::errors::{LawGraphError, Result};
use crate::ids::{article_node_id, LawId};
use crate::law::Law;
use crate::types::Reference;

/// In-process store for references and laws.
#[derive(Debug, Default)]
pub struct MemoryStore {
    references: RwLock<HashMap<String, Reference>>,
    laws: RwLock<HashMap<LawId, Law>>,
}

fn poisoned(operation: &str) -> LawGraphError {
    LawGraphError::Repository {
        message: "store lock poisoned".to_string(),
        operation: operation.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored references.
    pub fn reference_count(&self) -> usize {
        self.references.read().map(|r| r.len()).unwrap_or(0)
    }

    fn upsert(map: &mut HashMap<String, Reference>, reference: &Reference) {
        match map.get(&reference.id) {
            Some(existing) if existing.confidence >= reference.confidence => {}
            _ => {
                map.insert(reference.id.clone(), reference.clone());
            }
        }
    }
}

#[async_trait]
impl ReferenceRepository for MemoryStore {
    async fn find_incoming(&self, node_id: &str, min_confidence: f64) -> Result<Vec<Reference>> {
        let references = self
            .references
            .read()
            .map_err(|_| poisoned("find_incoming"))?;
        let mut found: Vec<Reference> = references
            .values()
            .filter(|r| r.target_node.id == node_id && r.confidence >= min_confidence)
            .cloned()
            .collect();
        sort_references(&mut found);
        Ok(found)
    }

    async fn find_incoming_under(
        &self,
        article_id: &str,
        min_confidence: f64,
    ) -> Result<Vec<Reference>> {
        let references = self
            .references
            .read()
            .map_err(|_| poisoned("find_incoming_under"))?;
        let mut found: Vec<Reference> = references
            .values()
            .filter(|r| {
                article_node_id(&r.target_node.id) == article_id
                    && r.confidence >= min_confidence
            })
            .cloned()
            .collect();
        sort_references(&mut found);
        Ok(found)
    }

    async fn find_outgoing(&self, node_id: &str) -> Result<Vec<Reference>> {
        let references = self
            .references
            .read()
            .map_err(|_| poisoned("find_outgoing"))?;
        let mut found: Vec<Reference> = references
            .values()
            .filter(|r| r.source_node.id == node_id)
            .cloned()
            .collect();
        sort_references(&mut found);
        Ok(found)
    }

    async fn save(&self, reference: &Reference) -> Result<()> {
        let mut references = self.references.write().map_err(|_| poisoned("save"))?;
        Self::upsert(&mut references, reference);
        Ok(())
    }

    async fn save_all(&self, batch: &[Reference]) -> Result<()> {
        let mut references = self.references.write().map_err(|_| poisoned("save_all"))?;
        for reference in batch {
            Self::upsert(&mut references, reference);
        }
        Ok(())
    }

    async fn delete(&self, reference_id: &str) -> Result<bool> {
        let mut references = self.references.write().map_err(|_| poisoned("delete"))?;
        Ok(references.remove(reference_id).is_some())
    }
}

#[async_trait]
impl LawRepository for MemoryStore {
    async fn find_by_id(&self, law_id: &LawId) -> Result<Option<Law>> {
        let laws = self.laws.read().map_err(|_| poisoned("find_by_id"))?;
        Ok(laws.get(law_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Law>> {
        let laws = self.laws.read().map_err(|_| poisoned("find_all"))?;
        let mut all: Vec<Law> = laws.values().cloned().collect();
        all.sort_by(|a, b| a.law_id.cmp(&b.law_id));
        Ok(all)
    }

    async fn save_law(&self, law: &Law) -> Result<()> {
        let mut laws = self.laws.write().map_err(|_| poisoned("save_law"))?;
        laws.insert(law.law_id.clone(), law.clone());
        Ok(())
    }
}
