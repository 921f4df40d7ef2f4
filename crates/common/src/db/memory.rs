//! In-process relational store
//!
//! Backs local runs (`database.url = "memory"`) and tests. Ordering and
//! cascade behaviour follow the Postgres schema.

use crate::db::store::RelationalStore;
use crate::errors::{AppError, Result};
use crate::models::{
    AnalysisReport, AnalysisSnapshot, Channel, ConversationMessage, Document, NewMessage, Project,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    next_id: i64,
    projects: HashMap<i64, Project>,
    documents: HashMap<i64, Document>,
    messages: Vec<ConversationMessage>,
    analyses: HashMap<i64, AnalysisSnapshot>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn push_message(&mut self, message: NewMessage) -> ConversationMessage {
        let stored = ConversationMessage {
            id: self.allocate_id(),
            project_id: message.project_id,
            role: message.role,
            content: message.content,
            channel: message.channel,
            created_at: Utc::now(),
        };
        self.messages.push(stored.clone());
        stored
    }
}

/// Relational store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn find_project(&self, project_id: i64) -> Result<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&project_id).cloned())
    }

    async fn list_projects(&self, offset: u64, limit: u64) -> Result<Vec<Project>> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables.projects.values().cloned().collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn create_project(&self, title: String, description: Option<String>) -> Result<Project> {
        let mut tables = self.tables.write().await;
        let project = Project {
            id: tables.allocate_id(),
            title,
            description,
            created_at: Utc::now(),
        };
        tables.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn live_document_ids(&self, project_id: i64) -> Result<HashSet<i64>> {
        Ok(self
            .tables
            .read()
            .await
            .documents
            .values()
            .filter(|doc| doc.project_id == project_id)
            .map(|doc| doc.id)
            .collect())
    }

    async fn create_document(
        &self,
        project_id: i64,
        filename: &str,
        file_size: i64,
    ) -> Result<Document> {
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&project_id) {
            return Err(AppError::Store {
                message: format!("documents.project_id {} violates foreign key", project_id),
            });
        }

        let document = Document {
            id: tables.allocate_id(),
            project_id,
            filename: filename.to_string(),
            file_size,
            is_indexed: false,
            uploaded_at: Utc::now(),
        };
        tables.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn set_document_indexed(&self, document_id: i64, indexed: bool) -> Result<()> {
        if let Some(doc) = self.tables.write().await.documents.get_mut(&document_id) {
            doc.is_indexed = indexed;
        }
        Ok(())
    }

    async fn list_documents(&self, project_id: i64) -> Result<Vec<Document>> {
        let tables = self.tables.read().await;
        let mut docs: Vec<Document> = tables
            .documents
            .values()
            .filter(|doc| doc.project_id == project_id)
            .cloned()
            .collect();
        docs.sort_by_key(|doc| (doc.uploaded_at, doc.id));
        Ok(docs)
    }

    async fn delete_document(&self, project_id: i64, document_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.documents.get(&document_id) {
            Some(doc) if doc.project_id == project_id => {
                tables.documents.remove(&document_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_message(&self, message: NewMessage) -> Result<ConversationMessage> {
        Ok(self.tables.write().await.push_message(message))
    }

    async fn append_exchange(
        &self,
        user: NewMessage,
        assistant: NewMessage,
    ) -> Result<(ConversationMessage, ConversationMessage)> {
        let mut tables = self.tables.write().await;
        let user = tables.push_message(user);
        let assistant = tables.push_message(assistant);
        Ok((user, assistant))
    }

    async fn recent_messages(
        &self,
        project_id: i64,
        channel: Channel,
        limit: u64,
    ) -> Result<Vec<ConversationMessage>> {
        let tables = self.tables.read().await;
        // Appends are chronological, so walking backwards yields newest first
        Ok(tables
            .messages
            .iter()
            .rev()
            .filter(|m| m.project_id == project_id && m.channel == channel)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn upsert_analysis(
        &self,
        project_id: i64,
        report: &AnalysisReport,
    ) -> Result<AnalysisSnapshot> {
        let snapshot = AnalysisSnapshot {
            project_id,
            report: report.clone(),
            updated_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .analyses
            .insert(project_id, snapshot.clone());
        Ok(snapshot)
    }

    async fn find_analysis(&self, project_id: i64) -> Result<Option<AnalysisSnapshot>> {
        Ok(self.tables.read().await.analyses.get(&project_id).cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
