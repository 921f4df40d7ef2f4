//! Long-lived services shared by every handler

use papermind_common::{
    config::AppConfig,
    db::{DbPool, MemoryStore, RelationalStore, Repository},
    embeddings::create_embedder,
    errors::Result,
    llm::{create_backends, Backends},
    vector::{create_vector_index, VectorIndex, VectorIndexGateway},
};
use papermind_context::{ContextAssembler, ReasoningOrchestrator};
use papermind_ingestion::{ChunkingConfig, DocumentIngestor};
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
}

/// Store, index and pipelines, built once at startup
pub struct Services {
    pub store: Arc<dyn RelationalStore>,
    pub ingestor: DocumentIngestor,
    pub orchestrator: ReasoningOrchestrator,
    index: Arc<dyn VectorIndex>,
    db: Option<DbPool>,
}

impl Services {
    /// Connect every collaborator named by `config`
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let (store, db): (Arc<dyn RelationalStore>, Option<DbPool>) = if config.uses_memory_store() {
            warn!("Relational store is in memory, nothing will be persisted");
            (Arc::new(MemoryStore::new()), None)
        } else {
            info!("Connecting to database...");
            let pool = DbPool::new(&config.database).await?;
            (Arc::new(Repository::new(pool.clone())), Some(pool))
        };

        info!(provider = %config.vector_index.provider, "Initialising vector index");
        let index = create_vector_index(config).await?;
        let embedder = create_embedder(&config.embedding)?;
        let backends = create_backends(&config.reasoning)?;

        let mut services = Self::assemble(config, store, index, embedder, backends);
        services.db = db;
        Ok(services)
    }

    /// Wire pipelines over already-built collaborators
    pub fn assemble(
        config: &AppConfig,
        store: Arc<dyn RelationalStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn papermind_common::Embedder>,
        backends: Backends,
    ) -> Self {
        let gateway = VectorIndexGateway::new(index.clone(), embedder);

        let ingestor = DocumentIngestor::new(
            store.clone(),
            gateway.clone(),
            ChunkingConfig::from(&config.ingestion),
        );

        let assembler = ContextAssembler::new(gateway, config.retrieval.clone());
        let orchestrator = ReasoningOrchestrator::new(
            store.clone(),
            assembler,
            backends,
            config.retrieval.history_limit,
        );

        Self {
            store,
            ingestor,
            orchestrator,
            index,
            db: None,
        }
    }

    /// Release pooled connections
    pub async fn close(&self) {
        self.index.close().await;

        if let Some(db) = self.db.clone() {
            if let Err(e) = db.close().await {
                warn!(error = %e, "Failed to close database connections");
            }
        }
    }
}
