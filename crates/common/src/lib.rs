//! PaperMind Common Library
//!
//! Shared code for all PaperMind crates including:
//! - Domain models (chunks, messages, analysis snapshots)
//! - Relational store contract, sea-orm repository and in-memory store
//! - Embedding client abstraction
//! - Vector index providers and the tenant-scoped index gateway
//! - Reasoning backend clients
//! - Conversation history adapter
//! - Error types, configuration and metrics

pub mod config;
pub mod conversation;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;
mod retry;
pub mod vector;

// Re-export commonly used types
pub use config::AppConfig;
pub use conversation::ConversationLog;
pub use db::{MemoryStore, RelationalStore, Repository};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::{Backends, ModelResponse, ReasoningBackend};
pub use vector::{VectorIndex, VectorIndexGateway};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
