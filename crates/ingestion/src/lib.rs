//! PaperMind Ingestion
//!
//! Turns uploaded PDF bytes into page-attributed, overlapping chunks and
//! writes them to the vector index:
//! - [`pdf`]: page extraction and text cleanup
//! - [`chunker`]: overlapping splitter preferring natural boundaries
//! - [`processor`]: per-document pipeline with store bookkeeping

pub mod chunker;
pub mod errors;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod pdf;
pub mod processor;

pub use chunker::{chunk_document, ChunkingConfig};
pub use errors::IngestionError;
pub use processor::{DocumentIngestor, IngestOutcome};
