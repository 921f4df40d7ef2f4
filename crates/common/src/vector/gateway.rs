//! Tenant-scoped front door to the shared vector index

use super::{IndexEntry, VectorIndex};
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{Chunk, ChunkMetadata, RetrievedChunk};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Writes and searches chunk embeddings on behalf of one project at a time.
///
/// Every search is conjoined with the caller's `project_id`, and hits are
/// checked again after the provider returns them, so a project never sees
/// another project's chunks even if the provider mishandles filters.
#[derive(Clone)]
pub struct VectorIndexGateway {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndexGateway {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }

    /// Embed and insert a document's chunks, tagged with tenant metadata.
    ///
    /// All or nothing: any embedding or insert failure fails the write.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn write(&self, project_id: i64, document_id: i64, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::Embedding {
                message: format!(
                    "Embedded {} of {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(position, (chunk, embedding))| IndexEntry {
                id: Uuid::new_v4(),
                content: chunk.text.clone(),
                metadata: json!({
                    "project_id": project_id,
                    "document_id": document_id,
                    "source": chunk.source,
                    "page": chunk.page,
                    "position": position,
                }),
                embedding,
            })
            .collect();

        let count = entries.len();
        self.index.upsert(entries).await?;

        debug!(count, "Chunks written to vector index");
        Ok(count)
    }

    /// Nearest chunks of `project_id` to `query`, closest first.
    ///
    /// Never fails: an unavailable embedder or index yields an empty result.
    /// An `extra_filter` naming a different project matches nothing.
    #[instrument(skip(self, query, extra_filter))]
    pub async fn search(
        &self,
        project_id: i64,
        query: &str,
        k: usize,
        extra_filter: Option<&Map<String, Value>>,
    ) -> Vec<RetrievedChunk> {
        if k == 0 {
            return Vec::new();
        }

        let mut filter = extra_filter.cloned().unwrap_or_default();
        if let Some(requested) = filter.get("project_id") {
            if requested != &json!(project_id) {
                debug!(%requested, "Filter names another project, nothing can match");
                return Vec::new();
            }
        }
        filter.insert("project_id".to_string(), json!(project_id));

        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "Query embedding unavailable, returning no context");
                metrics::record_retrieval_unavailable("embedding");
                return Vec::new();
            }
        };

        let hits = match self.index.search(&vector, k, &Value::Object(filter)).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Vector index unavailable, returning no context");
                metrics::record_retrieval_unavailable("index");
                return Vec::new();
            }
        };

        let returned = hits.len();
        let mut chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter_map(|hit| {
                let metadata: ChunkMetadata = serde_json::from_value(hit.metadata).ok()?;
                (metadata.project_id == project_id).then_some(RetrievedChunk {
                    content: hit.content,
                    metadata,
                    score: hit.score,
                })
            })
            .collect();
        metrics::record_filtered("project", returned - chunks.len());

        chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
        chunks.truncate(k);
        chunks
    }

    /// Remove a deleted document's vectors from the index
    #[instrument(skip(self))]
    pub async fn purge_document(&self, project_id: i64, document_id: i64) -> Result<u64> {
        let removed = self
            .index
            .delete(&json!({"project_id": project_id, "document_id": document_id}))
            .await?;

        debug!(removed, "Purged document vectors");
        Ok(removed)
    }
}
