//! Ingestion processor
//!
//! Core logic for processing uploads: PDF extraction and chunking, document
//! bookkeeping in the relational store, and the vector index write.

use crate::chunker::{chunk_document, ChunkingConfig};
use crate::errors::IngestionError;
use papermind_common::db::RelationalStore;
use papermind_common::metrics;
use papermind_common::models::{Chunk, Document};
use papermind_common::VectorIndexGateway;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Result of ingesting one uploaded file
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Stored and searchable
    Indexed { document: Document, chunks: usize },
    /// Stored, but the index write failed; can be retried
    NotIndexed { document: Document, reason: String },
    /// Not a PDF, nothing stored
    Skipped { filename: String },
    /// Could not be read as a PDF or had no text, nothing stored
    Rejected { filename: String, reason: String },
}

impl IngestOutcome {
    pub fn filename(&self) -> &str {
        match self {
            Self::Indexed { document, .. } | Self::NotIndexed { document, .. } => &document.filename,
            Self::Skipped { filename } | Self::Rejected { filename, .. } => filename,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Indexed { .. })
    }
}

/// Per-document ingestion pipeline
#[derive(Clone)]
pub struct DocumentIngestor {
    store: Arc<dyn RelationalStore>,
    gateway: VectorIndexGateway,
    chunking: ChunkingConfig,
}

impl DocumentIngestor {
    pub fn new(
        store: Arc<dyn RelationalStore>,
        gateway: VectorIndexGateway,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            chunking,
        }
    }

    /// Ingest one file into `project_id`.
    ///
    /// The document row is created only once the file has been chunked, so
    /// unreadable uploads leave no trace. An index failure keeps the row
    /// with `is_indexed = false`. Store failures are errors.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn ingest(
        &self,
        project_id: i64,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, IngestionError> {
        if !is_pdf_name(filename) {
            info!("Skipping non-PDF upload");
            return Ok(IngestOutcome::Skipped {
                filename: filename.to_string(),
            });
        }

        let start = Instant::now();
        let file_size = bytes.len() as i64;

        let chunks = match self.chunk(filename, bytes).await {
            Ok(chunks) => chunks,
            Err(e) if e.is_document_error() => {
                warn!(error = %e, "Rejecting unreadable upload");
                return Ok(IngestOutcome::Rejected {
                    filename: filename.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut document = self
            .store
            .create_document(project_id, filename, file_size)
            .await?;

        let outcome = match self.gateway.write(project_id, document.id, &chunks).await {
            Ok(written) => {
                self.store.set_document_indexed(document.id, true).await?;
                document.is_indexed = true;
                info!(document_id = document.id, chunks = written, "Document indexed");
                IngestOutcome::Indexed {
                    document,
                    chunks: written,
                }
            }
            Err(e) => {
                warn!(document_id = document.id, error = %e, "Index write failed, document kept as not indexed");
                IngestOutcome::NotIndexed {
                    document,
                    reason: e.to_string(),
                }
            }
        };

        metrics::record_ingestion(
            start.elapsed().as_secs_f64(),
            chunks.len(),
            outcome.is_indexed(),
        );
        Ok(outcome)
    }

    /// Ingest several files in order, one outcome per file
    pub async fn ingest_batch(
        &self,
        project_id: i64,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<IngestOutcome>, IngestionError> {
        let mut outcomes = Vec::with_capacity(files.len());
        for (filename, bytes) in files {
            outcomes.push(self.ingest(project_id, &filename, bytes).await?);
        }
        Ok(outcomes)
    }

    /// Delete a document row, then purge its vectors.
    ///
    /// Returns false when the document does not belong to the project. A
    /// failed purge leaves orphaned vectors behind; retrieval ignores them,
    /// so it is logged and counted but does not fail the deletion.
    #[instrument(skip(self))]
    pub async fn remove(&self, project_id: i64, document_id: i64) -> Result<bool, IngestionError> {
        if !self.store.delete_document(project_id, document_id).await? {
            return Ok(false);
        }

        if let Err(e) = self.gateway.purge_document(project_id, document_id).await {
            warn!(error = %e, "Failed to purge vectors of deleted document, leaving orphans");
            metrics::record_leaked_vectors();
        }

        info!("Document deleted");
        Ok(true)
    }

    /// PDF parsing is CPU bound, keep it off the async workers
    async fn chunk(&self, filename: &str, bytes: Vec<u8>) -> Result<Vec<Chunk>, IngestionError> {
        let config = self.chunking.clone();
        let name = filename.to_string();

        tokio::task::spawn_blocking(move || chunk_document(&bytes, &name, &config))
            .await
            .map_err(|e| {
                IngestionError::Pipeline(papermind_common::AppError::Internal {
                    message: format!("Chunking task failed: {}", e),
                })
            })?
    }
}

fn is_pdf_name(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}
