//! Configuration management for PaperMind services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Database URL that selects the in-process relational store
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Relational store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index configuration
    #[serde(default)]
    pub vector_index: VectorIndexConfig,

    /// Reasoning backend configuration
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Retrieval breadth and context limits
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Chunking parameters
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum accepted size of a single uploaded file
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes), or "memory"
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorIndexConfig {
    /// Index provider: pgvector, memory
    #[serde(default = "default_vector_provider")]
    pub provider: String,

    /// Connection URL (falls back to the primary database URL)
    pub url: Option<String>,

    /// Table holding chunk embeddings
    #[serde(default = "default_vector_table")]
    pub table: String,

    /// Maximum number of connections
    #[serde(default = "default_vector_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReasoningConfig {
    /// Backend provider: gemini, openai, scripted
    #[serde(default = "default_reasoning_provider")]
    pub provider: String,

    /// API key for the backend
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model used for chat turns
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for analysis and deep research
    #[serde(default = "default_research_model")]
    pub research_model: String,

    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    #[serde(default = "default_research_temperature")]
    pub research_temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    #[serde(default = "default_reasoning_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Candidates requested for plain chat turns
    #[serde(default = "default_narrow_k")]
    pub narrow_k: usize,

    /// Candidates requested for subset-filtered or broad queries
    #[serde(default = "default_wide_k")]
    pub wide_k: usize,

    /// Candidates requested per analysis probe
    #[serde(default = "default_probe_k")]
    pub probe_k: usize,

    /// Chunks kept in a chat context
    #[serde(default = "default_chat_max_chunks")]
    pub chat_max_chunks: usize,

    /// Chunks kept in an analysis context
    #[serde(default = "default_analysis_max_chunks")]
    pub analysis_max_chunks: usize,

    /// Chunks kept in a deep research context
    #[serde(default = "default_research_max_chunks")]
    pub research_max_chunks: usize,

    /// Messages of history fed into prompts
    #[serde(default = "default_history_limit")]
    pub history_limit: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Query requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 180 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_upload_bytes() -> usize { 50 * 1024 * 1024 }
fn default_database_url() -> String { "postgres://localhost/papermind".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 64 }
fn default_vector_provider() -> String { "pgvector".to_string() }
fn default_vector_table() -> String { "document_chunks".to_string() }
fn default_vector_connections() -> u32 { 10 }
fn default_reasoning_provider() -> String { "gemini".to_string() }
fn default_chat_model() -> String { "gemini-2.5-flash".to_string() }
fn default_research_model() -> String { "gemini-3-flash-preview".to_string() }
fn default_chat_temperature() -> f32 { 0.3 }
fn default_research_temperature() -> f32 { 0.4 }
fn default_reasoning_timeout() -> u64 { 120 }
fn default_reasoning_retries() -> u32 { 3 }
fn default_narrow_k() -> usize { 5 }
fn default_wide_k() -> usize { 20 }
fn default_probe_k() -> usize { 5 }
fn default_chat_max_chunks() -> usize { 5 }
fn default_analysis_max_chunks() -> usize { 20 }
fn default_research_max_chunks() -> usize { 20 }
fn default_history_limit() -> u64 { 10 }
fn default_chunk_size() -> usize { 1200 }
fn default_chunk_overlap() -> usize { 200 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "papermind".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__REASONING__API_KEY=...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Configuration wired entirely to in-process collaborators
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.url = MEMORY_DATABASE_URL.to_string();
        config.vector_index.provider = "memory".to_string();
        config.embedding.provider = "hash".to_string();
        config.embedding.dimension = crate::DEFAULT_EMBEDDING_DIMENSION;
        config.embedding.model = crate::DEFAULT_EMBEDDING_MODEL.to_string();
        config.reasoning.provider = "scripted".to_string();
        config.observability.metrics_port = 0;
        config
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the vector index URL (falls back to primary)
    pub fn vector_index_url(&self) -> &str {
        self.vector_index.url.as_deref().unwrap_or(&self.database.url)
    }

    /// Whether the relational store lives in process memory
    pub fn uses_memory_store(&self) -> bool {
        self.database.url == MEMORY_DATABASE_URL
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            provider: default_vector_provider(),
            url: None,
            table: default_vector_table(),
            max_connections: default_vector_connections(),
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: default_reasoning_provider(),
            api_key: None,
            api_base: None,
            chat_model: default_chat_model(),
            research_model: default_research_model(),
            chat_temperature: default_chat_temperature(),
            research_temperature: default_research_temperature(),
            timeout_secs: default_reasoning_timeout(),
            max_retries: default_reasoning_retries(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            narrow_k: default_narrow_k(),
            wide_k: default_wide_k(),
            probe_k: default_probe_k(),
            chat_max_chunks: default_chat_max_chunks(),
            analysis_max_chunks: default_analysis_max_chunks(),
            research_max_chunks: default_research_max_chunks(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ingestion.chunk_size, 1200);
        assert_eq!(config.ingestion.chunk_overlap, 200);
        assert_eq!(config.retrieval.narrow_k, 5);
        assert_eq!(config.retrieval.wide_k, 20);
        assert_eq!(config.retrieval.history_limit, 10);
    }

    #[test]
    fn test_vector_index_falls_back_to_database() {
        let mut config = AppConfig::default();
        assert_eq!(config.vector_index_url(), "postgres://localhost/papermind");

        config.vector_index.url = Some("postgres://vectors/papermind".to_string());
        assert_eq!(config.vector_index_url(), "postgres://vectors/papermind");
    }

    #[test]
    fn test_in_memory_profile() {
        let config = AppConfig::in_memory();
        assert!(config.uses_memory_store());
        assert_eq!(config.vector_index.provider, "memory");
        assert_eq!(config.embedding.dimension, crate::DEFAULT_EMBEDDING_DIMENSION);
        assert_eq!(config.observability.metrics_port, 0);
    }

    #[test]
    fn test_reasoning_temperatures() {
        let config = AppConfig::default();
        assert!(config.reasoning.chat_temperature < config.reasoning.research_temperature);
    }
}
