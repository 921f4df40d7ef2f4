//! In-process vector index with brute-force cosine search

use super::{json_contains, IndexEntry, IndexHit, VectorIndex};
use crate::embeddings::cosine_similarity;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryVectorIndex {
    initialized: AtomicBool,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(AppError::RetrievalUnavailable {
                message: "vector index has not been initialised".to_string(),
            })
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn init(&self) -> Result<()> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.ensure_initialized()?;

        let mut stored = self.entries.write().await;
        for entry in entries {
            match stored.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => stored.push(entry),
            }
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize, filter: &Value) -> Result<Vec<IndexHit>> {
        self.ensure_initialized()?;

        let stored = self.entries.read().await;
        let mut hits: Vec<IndexHit> = stored
            .iter()
            .filter(|e| json_contains(&e.metadata, filter))
            .map(|e| IndexHit {
                content: e.content.clone(),
                metadata: e.metadata.clone(),
                score: cosine_similarity(vector, &e.embedding),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete(&self, filter: &Value) -> Result<u64> {
        self.ensure_initialized()?;

        let mut stored = self.entries.write().await;
        let before = stored.len();
        stored.retain(|e| !json_contains(&e.metadata, filter));
        Ok((before - stored.len()) as u64)
    }
}
