//! Repository pattern for database operations
//!
//! Postgres implementation of [`RelationalStore`] on top of SeaORM.
//! Reads go to the replica when one is configured.

use crate::db::models::*;
use crate::db::store::RelationalStore;
use crate::db::DbPool;
use crate::errors::Result;
use crate::models::{
    AnalysisReport, AnalysisSnapshot, Channel, ConversationMessage, Document, NewMessage, Project,
};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::collections::HashSet;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// The underlying pool, for shutdown
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn message_row(message: NewMessage) -> ChatMessageActiveModel {
    ChatMessageActiveModel {
        project_id: Set(message.project_id),
        role: Set(message.role.as_str().to_string()),
        content: Set(message.content),
        message_type: Set(message.channel.as_str().to_string()),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl RelationalStore for Repository {
    // ========================================================================
    // Project Operations
    // ========================================================================

    async fn find_project(&self, project_id: i64) -> Result<Option<Project>> {
        let row = ProjectEntity::find_by_id(project_id)
            .one(self.read_conn())
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list_projects(&self, offset: u64, limit: u64) -> Result<Vec<Project>> {
        let rows = ProjectEntity::find()
            .order_by_asc(ProjectColumn::Id)
            .offset(offset)
            .limit(limit)
            .all(self.read_conn())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_project(&self, title: String, description: Option<String>) -> Result<Project> {
        let project = ProjectActiveModel {
            title: Set(title),
            description: Set(description),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        let row = project.insert(self.write_conn()).await?;
        Ok(row.into())
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    async fn live_document_ids(&self, project_id: i64) -> Result<HashSet<i64>> {
        // Primary: deletions must be visible to the very next query
        let ids: Vec<i64> = DocumentEntity::find()
            .select_only()
            .column(DocumentColumn::Id)
            .filter(DocumentColumn::ProjectId.eq(project_id))
            .into_tuple()
            .all(self.write_conn())
            .await?;

        Ok(ids.into_iter().collect())
    }

    async fn create_document(
        &self,
        project_id: i64,
        filename: &str,
        file_size: i64,
    ) -> Result<Document> {
        let document = DocumentActiveModel {
            project_id: Set(project_id),
            filename: Set(filename.to_string()),
            file_size: Set(file_size),
            is_indexed: Set(false),
            uploaded_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        let row = document.insert(self.write_conn()).await?;
        Ok(row.into())
    }

    async fn set_document_indexed(&self, document_id: i64, indexed: bool) -> Result<()> {
        DocumentEntity::update_many()
            .col_expr(DocumentColumn::IsIndexed, Expr::value(indexed))
            .filter(DocumentColumn::Id.eq(document_id))
            .exec(self.write_conn())
            .await?;

        Ok(())
    }

    async fn list_documents(&self, project_id: i64) -> Result<Vec<Document>> {
        let rows = DocumentEntity::find()
            .filter(DocumentColumn::ProjectId.eq(project_id))
            .order_by_asc(DocumentColumn::UploadedAt)
            .order_by_asc(DocumentColumn::Id)
            .all(self.read_conn())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_document(&self, project_id: i64, document_id: i64) -> Result<bool> {
        let result = DocumentEntity::delete_many()
            .filter(DocumentColumn::Id.eq(document_id))
            .filter(DocumentColumn::ProjectId.eq(project_id))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    async fn append_message(&self, message: NewMessage) -> Result<ConversationMessage> {
        message_row(message).insert(self.write_conn()).await?.try_into()
    }

    async fn append_exchange(
        &self,
        user: NewMessage,
        assistant: NewMessage,
    ) -> Result<(ConversationMessage, ConversationMessage)> {
        // Dropping the transaction on an early return rolls it back
        let txn = self.write_conn().begin().await?;
        let user = message_row(user).insert(&txn).await?;
        let assistant = message_row(assistant).insert(&txn).await?;
        txn.commit().await?;

        Ok((user.try_into()?, assistant.try_into()?))
    }

    async fn recent_messages(
        &self,
        project_id: i64,
        channel: Channel,
        limit: u64,
    ) -> Result<Vec<ConversationMessage>> {
        let rows = ChatMessageEntity::find()
            .filter(ChatMessageColumn::ProjectId.eq(project_id))
            .filter(ChatMessageColumn::MessageType.eq(channel.as_str()))
            .order_by_desc(ChatMessageColumn::CreatedAt)
            .order_by_desc(ChatMessageColumn::Id)
            .limit(limit)
            .all(self.write_conn())
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    // ========================================================================
    // Analysis Operations
    // ========================================================================

    async fn upsert_analysis(
        &self,
        project_id: i64,
        report: &AnalysisReport,
    ) -> Result<AnalysisSnapshot> {
        let row = AnalysisResultActiveModel {
            project_id: Set(project_id),
            research_gaps: Set(to_json(&report.research_gaps)?),
            methodology_suggestions: Set(to_json(&report.methodology_suggestions)?),
            common_approaches: Set(to_json(&report.common_approaches)?),
            missing_evaluations: Set(to_json(&report.missing_evaluations)?),
            unexplored_scenarios: Set(to_json(&report.unexplored_scenarios)?),
            updated_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        AnalysisResultEntity::insert(row)
            .on_conflict(
                OnConflict::column(AnalysisResultColumn::ProjectId)
                    .update_columns([
                        AnalysisResultColumn::ResearchGaps,
                        AnalysisResultColumn::MethodologySuggestions,
                        AnalysisResultColumn::CommonApproaches,
                        AnalysisResultColumn::MissingEvaluations,
                        AnalysisResultColumn::UnexploredScenarios,
                        AnalysisResultColumn::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.write_conn())
            .await?;

        let stored = AnalysisResultEntity::find()
            .filter(AnalysisResultColumn::ProjectId.eq(project_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| crate::errors::AppError::Store {
                message: format!("analysis for project {} vanished after upsert", project_id),
            })?;

        stored.try_into()
    }

    async fn find_analysis(&self, project_id: i64) -> Result<Option<AnalysisSnapshot>> {
        AnalysisResultEntity::find()
            .filter(AnalysisResultColumn::ProjectId.eq(project_id))
            .one(self.read_conn())
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
