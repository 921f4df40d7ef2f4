//! Uploaded document entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub project_id: i64,

    #[sea_orm(column_type = "Text")]
    pub filename: String,

    pub file_size: i64,

    /// Set once the chunks are in the vector index
    pub is_indexed: bool,

    pub uploaded_at: DateTimeWithTimeZone,
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

impl From<Model> for crate::models::Document {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            filename: model.filename,
            file_size: model.file_size,
            is_indexed: model.is_indexed,
            uploaded_at: model.uploaded_at.with_timezone(&chrono::Utc),
        }
    }
}
