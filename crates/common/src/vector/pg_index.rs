//! Vector index backed by Postgres + pgvector
//!
//! Entries live in one table keyed by chunk id; metadata is JSONB so that
//! tenant filters are a single `metadata @> $filter` containment test.

use super::{IndexEntry, IndexHit, VectorIndex};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use pgvector::Vector;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::{debug, info};

pub struct PgVectorIndex {
    pool: PgPool,
    table: String,
    dimension: usize,
}

fn unavailable(context: &str, err: sqlx::Error) -> AppError {
    AppError::RetrievalUnavailable {
        message: format!("{}: {}", context, err),
    }
}

impl PgVectorIndex {
    /// Connect to the database holding the vector table
    pub async fn connect(
        url: &str,
        table: &str,
        dimension: usize,
        max_connections: u32,
    ) -> Result<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::Configuration {
                message: format!("Invalid vector table name: {:?}", table),
            });
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to vector index: {}", e),
            })?;

        Ok(Self {
            pool,
            table: table.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn init(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| unavailable("Failed to enable pgvector", e))?;

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL,
                embedding vector({dimension}) NOT NULL
            )
            "#,
            table = self.table,
            dimension = self.dimension
        );
        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| unavailable("Failed to create vector table", e))?;

        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_metadata_idx ON {table} USING GIN (metadata jsonb_path_ops)",
            table = self.table
        );
        sqlx::query(&create_index)
            .execute(&self.pool)
            .await
            .map_err(|e| unavailable("Failed to create metadata index", e))?;

        info!(table = %self.table, dimension = self.dimension, "Vector index ready");
        Ok(())
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {table} (id, content, metadata, embedding)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET content = EXCLUDED.content,
                metadata = EXCLUDED.metadata,
                embedding = EXCLUDED.embedding
            "#,
            table = self.table
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| unavailable("Failed to open transaction", e))?;

        let count = entries.len();
        for entry in entries {
            sqlx::query(&sql)
                .bind(entry.id)
                .bind(entry.content)
                .bind(Json(entry.metadata))
                .bind(Vector::from(entry.embedding))
                .execute(&mut *tx)
                .await
                .map_err(|e| unavailable("Failed to insert chunk", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| unavailable("Failed to commit chunks", e))?;

        debug!(count, "Upserted vector entries");
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize, filter: &Value) -> Result<Vec<IndexHit>> {
        let sql = format!(
            r#"
            SELECT content, metadata, (1 - (embedding <=> $1))::float4 AS score
            FROM {table}
            WHERE metadata @> $2
            ORDER BY embedding <=> $1
            LIMIT $3
            "#,
            table = self.table
        );

        let rows: Vec<(String, Json<Value>, f32)> = sqlx::query_as(&sql)
            .bind(Vector::from(vector.to_vec()))
            .bind(Json(filter))
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| unavailable("Vector search failed", e))?;

        Ok(rows
            .into_iter()
            .map(|(content, Json(metadata), score)| IndexHit {
                content,
                metadata,
                score,
            })
            .collect())
    }

    async fn delete(&self, filter: &Value) -> Result<u64> {
        let sql = format!("DELETE FROM {table} WHERE metadata @> $1", table = self.table);

        let result = sqlx::query(&sql)
            .bind(Json(filter))
            .execute(&self.pool)
            .await
            .map_err(|e| unavailable("Vector delete failed", e))?;

        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
