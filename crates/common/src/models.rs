//! Domain types shared by ingestion, retrieval and reasoning
//!
//! These are the shapes that cross crate boundaries. Persistence entities
//! live in [`crate::db::models`] and convert into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A page-attributed fragment of a source document, produced at ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// 1-based page number in the source document
    pub page: u32,
    pub source: String,
}

/// Tenant and provenance tags stored alongside every indexed chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub project_id: i64,
    pub document_id: i64,
    pub source: String,
    pub page: u32,
}

/// A chunk returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query, higher is closer
    pub score: f32,
}

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// History partition a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Chat,
    Research,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Research => "research",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Channel::Chat),
            "research" => Ok(Channel::Research),
            other => Err(format!("unknown channel: {}", other)),
        }
    }
}

/// A message ready to be appended to a project's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub project_id: i64,
    pub role: Role,
    pub content: String,
    pub channel: Channel,
}

impl NewMessage {
    pub fn user(project_id: i64, channel: Channel, content: impl Into<String>) -> Self {
        Self {
            project_id,
            role: Role::User,
            content: content.into(),
            channel,
        }
    }

    pub fn assistant(project_id: i64, channel: Channel, content: impl Into<String>) -> Self {
        Self {
            project_id,
            role: Role::Assistant,
            content: content.into(),
            channel,
        }
    }
}

/// A stored conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub project_id: i64,
    pub role: Role,
    pub content: String,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
}

/// A research project grouping uploaded papers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An uploaded paper as tracked by the relational store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub project_id: i64,
    pub filename: String,
    pub file_size: i64,
    /// False until the chunks reached the vector index
    pub is_indexed: bool,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodologySuggestion {
    pub action: String,
    pub reasoning: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Structured gap analysis over a project's papers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub common_approaches: Vec<String>,
    #[serde(default)]
    pub missing_evaluations: Vec<String>,
    #[serde(default)]
    pub unexplored_scenarios: Vec<String>,
    #[serde(default)]
    pub research_gaps: Vec<String>,
    #[serde(default)]
    pub methodology_suggestions: Vec<MethodologySuggestion>,
}

/// The single stored analysis of a project, overwritten on re-analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub project_id: i64,
    #[serde(flatten)]
    pub report: AnalysisReport,
    pub updated_at: DateTime<Utc>,
}
