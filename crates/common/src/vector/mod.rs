//! Vector index providers and the tenant-scoped index gateway
//!
//! A single physical index is shared by every project. Each stored entry
//! carries JSON metadata (`project_id`, `document_id`, `source`, `page`),
//! and filters use JSON containment: an entry matches when its metadata
//! contains every key/value of the filter.

mod gateway;
mod memory;
mod pg_index;

pub use gateway::VectorIndexGateway;
pub use memory::InMemoryVectorIndex;
pub use pg_index::PgVectorIndex;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// One embedded chunk as handed to a provider
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: Uuid,
    pub content: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// A provider search hit, closest first
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub content: String,
    pub metadata: Value,
    pub score: f32,
}

/// External vector index contract
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Prepare storage; searching before this succeeds is an error
    async fn init(&self) -> Result<()>;

    /// Insert or replace entries, all or nothing
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Up to `k` entries whose metadata contains `filter`, by decreasing similarity
    async fn search(&self, vector: &[f32], k: usize, filter: &Value) -> Result<Vec<IndexHit>>;

    /// Remove entries whose metadata contains `filter`; returns the count removed
    async fn delete(&self, filter: &Value) -> Result<u64>;

    /// Release connections held by the provider
    async fn close(&self) {}
}

/// Build the configured index provider and initialise it
pub async fn create_vector_index(config: &AppConfig) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config.vector_index.provider.as_str() {
        "pgvector" => Arc::new(
            PgVectorIndex::connect(
                config.vector_index_url(),
                &config.vector_index.table,
                config.embedding.dimension,
                config.vector_index.max_connections,
            )
            .await?,
        ),
        "memory" => Arc::new(InMemoryVectorIndex::new()),
        other => {
            return Err(AppError::Configuration {
                message: format!("Unknown vector index provider: {}", other),
            })
        }
    };

    index.init().await?;
    Ok(index)
}

/// JSON containment with the semantics of Postgres `jsonb @>`
pub fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => n
            .iter()
            .all(|(key, value)| h.get(key).is_some_and(|v| json_contains(v, value))),
        (Value::Array(h), Value::Array(n)) => n
            .iter()
            .all(|value| h.iter().any(|v| json_contains(v, value))),
        (Value::Array(h), scalar) if !scalar.is_object() => h.iter().any(|v| v == scalar),
        (h, n) => h == n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_containment_on_objects() {
        let meta = json!({"project_id": 1, "document_id": 7, "source": "a.pdf", "page": 2});
        assert!(json_contains(&meta, &json!({})));
        assert!(json_contains(&meta, &json!({"project_id": 1})));
        assert!(json_contains(&meta, &json!({"project_id": 1, "document_id": 7})));
        assert!(!json_contains(&meta, &json!({"project_id": 2})));
        assert!(!json_contains(&meta, &json!({"missing": true})));
    }

    #[test]
    fn test_containment_on_arrays() {
        assert!(json_contains(&json!([1, 2, 3]), &json!([3, 1])));
        assert!(!json_contains(&json!([1, 2]), &json!([4])));
        assert!(json_contains(&json!({"tags": ["x", "y"]}), &json!({"tags": ["y"]})));
    }
}
