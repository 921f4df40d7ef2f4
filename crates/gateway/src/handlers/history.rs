//! Conversation history and stored analysis

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::require_project;
use crate::state::AppState;
use papermind_common::{
    errors::Result,
    models::{AnalysisSnapshot, Channel, ConversationMessage},
    ConversationLog,
};

const DEFAULT_HISTORY_LIMIT: u64 = 50;
const MAX_HISTORY_LIMIT: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_channel")]
    pub channel: Channel,
    pub limit: Option<u64>,
}

fn default_channel() -> Channel {
    Channel::Chat
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub project_id: i64,
    pub channel: Channel,
    pub messages: Vec<ConversationMessage>,
}

/// Most recent messages of one channel, oldest first
pub async fn get_history(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>> {
    require_project(state.services.store.as_ref(), project_id).await?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let messages = ConversationLog::new(state.services.store.clone())
        .history(project_id, params.channel, limit)
        .await?;

    Ok(Json(HistoryResponse {
        project_id,
        channel: params.channel,
        messages,
    }))
}

/// The stored analysis snapshot; `null` until the project is analyzed
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Option<AnalysisSnapshot>>> {
    require_project(state.services.store.as_ref(), project_id).await?;

    let snapshot = state.services.store.find_analysis(project_id).await?;
    Ok(Json(snapshot))
}
