//! Conversation message entity

use crate::errors::AppError;
use crate::models::ConversationMessage;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub project_id: i64,

    /// "user" or "assistant"
    #[sea_orm(column_type = "Text")]
    pub role: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// "chat" or "research"
    #[sea_orm(column_type = "Text")]
    pub message_type: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ConversationMessage {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let role = model
            .role
            .parse()
            .map_err(|message| AppError::Store { message })?;
        let channel = model
            .message_type
            .parse()
            .map_err(|message| AppError::Store { message })?;

        Ok(Self {
            id: model.id,
            project_id: model.project_id,
            role,
            content: model.content,
            channel,
            created_at: model.created_at.with_timezone(&chrono::Utc),
        })
    }
}
