//! Analysis snapshot entity (one row per project)

use crate::errors::AppError;
use crate::models::{AnalysisReport, AnalysisSnapshot};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analysis_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
    pub project_id: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub research_gaps: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub methodology_suggestions: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub common_approaches: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub missing_evaluations: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub unexplored_scenarios: serde_json::Value,

    pub updated_at: DateTimeWithTimeZone,
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

impl TryFrom<Model> for AnalysisSnapshot {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let report = AnalysisReport {
            common_approaches: serde_json::from_value(model.common_approaches)?,
            missing_evaluations: serde_json::from_value(model.missing_evaluations)?,
            unexplored_scenarios: serde_json::from_value(model.unexplored_scenarios)?,
            research_gaps: serde_json::from_value(model.research_gaps)?,
            methodology_suggestions: serde_json::from_value(model.methodology_suggestions)?,
        };

        Ok(Self {
            project_id: model.project_id,
            report,
            updated_at: model.updated_at.with_timezone(&chrono::Utc),
        })
    }
}
