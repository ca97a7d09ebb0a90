//! Ingestion pipeline: validate, embed, persist.
//!
//! Single-item ingestion fails loud: a payload that does not validate
//! raises [`crate::Error::Validation`] naming every offending field, and nothing
//! is written. Batch ingestion favors availability: invalid items are
//! skipped and counted, valid items land regardless of their neighbors.
//! Embeddings are generated lazily — only for entities whose payload did
//! not carry a vector — and supplied vectors are stored verbatim, never
//! regenerated.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::CodeEntity;
use crate::payload::EntityPayload;
use crate::store::Store;

/// Write-side pipeline over one [`Store`] and one embedding provider.
pub struct Ingestor {
    store: Arc<Store>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Ingestor {
    pub fn new(store: Arc<Store>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Ingestor { store, provider }
    }

    /// Validate and persist a single entity payload.
    ///
    /// On validation failure, raises [`crate::Error::Validation`] and performs no
    /// write. On success, attaches a generated embedding when the payload
    /// lacked one, upserts through the store (last write wins on id
    /// collision), and returns the persisted record.
    pub async fn add_entity(&self, payload: serde_json::Value) -> Result<CodeEntity> {
        // Fail with NotInitialized before doing any validation work,
        // matching the lifecycle contract of every data-access call.
        self.store.pool().await?;

        let mut entity = EntityPayload::from_value(payload)?.validate()?;

        if entity.embedding.is_none() {
            let vectors = self
                .provider
                .embed_batch(&[embedding_text(&entity)])
                .await?;
            entity.embedding = vectors.into_iter().next();
        }

        self.store.upsert(&entity).await?;
        debug!(id = %entity.id, kind = %entity.kind, "entity ingested");
        Ok(entity)
    }

    /// Validate and persist a batch of entity payloads.
    ///
    /// Each item goes through the same validation and embedding logic as
    /// [`add_entity`](Ingestor::add_entity); invalid items are skipped
    /// (logged, not raised) without aborting the batch. Returns the number
    /// of items successfully persisted. Valid items lacking vectors are
    /// embedded in one provider call; items whose embedding cannot be
    /// produced are skipped like invalid ones.
    pub async fn add_entities_batch(&self, payloads: Vec<serde_json::Value>) -> Result<usize> {
        self.store.pool().await?;

        let mut entities: Vec<CodeEntity> = Vec::with_capacity(payloads.len());
        let mut skipped = 0usize;

        for payload in payloads {
            match EntityPayload::from_value(payload).and_then(EntityPayload::validate) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    skipped += 1;
                    debug!(error = %e, "batch item skipped");
                }
            }
        }

        // One provider round trip for everything that needs a vector.
        let pending: Vec<usize> = entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if !pending.is_empty() {
            let texts: Vec<String> = pending
                .iter()
                .map(|&i| embedding_text(&entities[i]))
                .collect();

            match self.provider.embed_batch(&texts).await {
                Ok(vectors) if vectors.len() == pending.len() => {
                    for (&i, vector) in pending.iter().zip(vectors) {
                        entities[i].embedding = Some(vector);
                    }
                }
                Ok(vectors) => {
                    warn!(
                        expected = pending.len(),
                        got = vectors.len(),
                        "embedding batch size mismatch; affected items skipped"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "embedding batch failed; affected items skipped");
                }
            }
            // Items still missing a vector after the provider call are
            // dropped; everything else proceeds independently.
            let before = entities.len();
            entities.retain(|e| e.embedding.is_some());
            skipped += before - entities.len();
        }

        self.store.upsert_batch(&entities).await?;

        if skipped > 0 {
            debug!(persisted = entities.len(), skipped, "batch ingest finished");
        }
        Ok(entities.len())
    }
}

/// Text handed to the embedding provider for an entity without a vector.
///
/// The signature prefix keeps one-line declarations searchable when the
/// body is trivial.
fn embedding_text(entity: &CodeEntity) -> String {
    if entity.signature.is_empty() {
        entity.content.clone()
    } else {
        format!("{}\n{}", entity.signature, entity.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    #[test]
    fn test_embedding_text_uses_signature() {
        let entity = CodeEntity {
            id: "func_a.py_f_1".into(),
            name: "f".into(),
            fqn: "a.py::f".into(),
            kind: EntityKind::Function,
            content: "def f(): pass".into(),
            signature: "def f():".into(),
            file: "a.py".into(),
            line_start: 1,
            line_end: 1,
            language: Default::default(),
            parameters: None,
            returns: None,
            extends: None,
            implements: None,
            calls: None,
            api_endpoints: None,
            db_tables: None,
            embedding: None,
        };
        assert_eq!(embedding_text(&entity), "def f():\ndef f(): pass");

        let bare = CodeEntity {
            signature: String::new(),
            ..entity
        };
        assert_eq!(embedding_text(&bare), "def f(): pass");
    }
}
