//! API handlers module

pub mod documents;
pub mod health;
pub mod history;
pub mod projects;
pub mod query;

use papermind_common::{
    errors::{AppError, Result},
    models::Project,
    RelationalStore,
};
use validator::Validate;

/// Run `validator` rules, reporting the first offending field
pub(crate) fn validated<T: Validate>(request: T) -> Result<T> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: e.field_errors().keys().next().map(|field| field.to_string()),
    })?;
    Ok(request)
}

pub(crate) async fn require_project(store: &dyn RelationalStore, project_id: i64) -> Result<Project> {
    store
        .find_project(project_id)
        .await?
        .ok_or(AppError::ProjectNotFound { id: project_id })
}
