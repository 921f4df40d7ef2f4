//! Chat, analysis and deep research endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::validated;
use crate::state::AppState;
use papermind_common::{errors::Result, models::AnalysisSnapshot};
use papermind_context::{ChatAnswer, ResearchReport};

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub query: String,

    /// Restrict retrieval to these documents; empty means all
    #[serde(default)]
    #[validate(length(max = 100))]
    pub document_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResearchRequest {
    #[validate(length(min = 1, max = 8000))]
    pub query: String,
}

/// Grounded answer with cited sources
pub async fn chat(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>> {
    let request = validated(request)?;

    let answer = state
        .services
        .orchestrator
        .chat(project_id, &request.query, &request.document_ids)
        .await?;

    Ok(Json(answer))
}

/// Re-run the gap analysis and return the new snapshot
pub async fn analyze(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<AnalysisSnapshot>> {
    let snapshot = state.services.orchestrator.analyze(project_id).await?;
    Ok(Json(snapshot))
}

pub async fn research(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(request): Json<ResearchRequest>,
) -> Result<Json<ResearchReport>> {
    let request = validated(request)?;

    let report = state
        .services
        .orchestrator
        .research(project_id, &request.query)
        .await?;

    Ok(Json(report))
}
