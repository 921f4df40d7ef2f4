//! Contract between the pipeline and the relational store

use crate::errors::Result;
use crate::models::{
    AnalysisReport, AnalysisSnapshot, Channel, ConversationMessage, Document, NewMessage, Project,
};
use async_trait::async_trait;
use std::collections::HashSet;

/// The authority on which projects and documents exist.
///
/// Retrieval trusts this store over the vector index: a document whose row
/// is gone is excluded from every context even if its vectors remain.
/// Failures propagate uninterpreted as [`crate::AppError`] store variants.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn find_project(&self, project_id: i64) -> Result<Option<Project>>;

    /// One page of projects in creation order
    async fn list_projects(&self, offset: u64, limit: u64) -> Result<Vec<Project>>;

    async fn create_project(&self, title: String, description: Option<String>) -> Result<Project>;

    /// Ids of every document row currently attached to the project
    async fn live_document_ids(&self, project_id: i64) -> Result<HashSet<i64>>;

    /// Record an upload; the document starts out not indexed
    async fn create_document(
        &self,
        project_id: i64,
        filename: &str,
        file_size: i64,
    ) -> Result<Document>;

    async fn set_document_indexed(&self, document_id: i64, indexed: bool) -> Result<()>;

    async fn list_documents(&self, project_id: i64) -> Result<Vec<Document>>;

    /// Remove the row; returns false when no such document is in the project
    async fn delete_document(&self, project_id: i64, document_id: i64) -> Result<bool>;

    async fn append_message(&self, message: NewMessage) -> Result<ConversationMessage>;

    /// Store a user turn and its reply as one unit: both or neither
    async fn append_exchange(
        &self,
        user: NewMessage,
        assistant: NewMessage,
    ) -> Result<(ConversationMessage, ConversationMessage)>;

    /// Most recent messages of one channel, newest first
    async fn recent_messages(
        &self,
        project_id: i64,
        channel: Channel,
        limit: u64,
    ) -> Result<Vec<ConversationMessage>>;

    /// Replace the project's analysis snapshot wholesale
    async fn upsert_analysis(
        &self,
        project_id: i64,
        report: &AnalysisReport,
    ) -> Result<AnalysisSnapshot>;

    async fn find_analysis(&self, project_id: i64) -> Result<Option<AnalysisSnapshot>>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}
