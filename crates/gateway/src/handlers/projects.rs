//! Project management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{require_project, validated};
use crate::state::AppState;
use papermind_common::{
    errors::{AppError, Result},
    models::Project,
};

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 500;

/// Request to create a new project
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListProjectsParams {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct ProjectListResponse {
    pub skip: u64,
    pub limit: u64,
    pub projects: Vec<Project>,
}

/// Create a project to group papers under
pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    let request = validated(request)?;
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation {
            message: "title must not be blank".to_string(),
            field: Some("title".to_string()),
        });
    }
    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let project = state.services.store.create_project(title, description).await?;

    tracing::info!(project_id = project.id, title = %project.title, "Project created");

    Ok((StatusCode::CREATED, Json(project)))
}

/// Get a project by ID
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Project>> {
    let project = require_project(state.services.store.as_ref(), project_id).await?;
    Ok(Json(project))
}

/// Page through projects in creation order
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<ListProjectsParams>,
) -> Result<Json<ProjectListResponse>> {
    let skip = params.skip.unwrap_or(0);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let projects = state.services.store.list_projects(skip, limit).await?;

    Ok(Json(ProjectListResponse {
        skip,
        limit,
        projects,
    }))
}
