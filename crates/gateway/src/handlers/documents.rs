//! Document upload, listing and deletion

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::require_project;
use crate::state::AppState;
use papermind_common::{
    errors::{AppError, Result},
    models::Document,
};
use papermind_ingestion::IngestOutcome;

/// Per-file results of a multipart upload
#[derive(Serialize)]
pub struct UploadResponse {
    pub project_id: i64,
    pub indexed: usize,
    pub documents: Vec<IngestOutcome>,
}

#[derive(Serialize)]
pub struct DocumentListResponse {
    pub project_id: i64,
    pub documents: Vec<Document>,
}

/// Upload one or more PDFs into a project.
///
/// Non-PDF parts are skipped and unreadable PDFs rejected; both are
/// reported per file rather than failing the request.
pub async fn upload_documents(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    require_project(state.services.store.as_ref(), project_id).await?;

    let limit = state.config.server.max_upload_bytes;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        files.push((filename, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(AppError::Validation {
            message: "no files in upload".to_string(),
            field: Some("files".to_string()),
        });
    }

    let outcomes = state.services.ingestor.ingest_batch(project_id, files).await?;
    let indexed = outcomes.iter().filter(|o| o.is_indexed()).count();

    tracing::info!(
        project_id,
        files = outcomes.len(),
        indexed,
        "Upload processed"
    );

    Ok(Json(UploadResponse {
        project_id,
        indexed,
        documents: outcomes,
    }))
}

/// List a project's documents
pub async fn list_documents(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<DocumentListResponse>> {
    require_project(state.services.store.as_ref(), project_id).await?;

    let documents = state.services.store.list_documents(project_id).await?;

    Ok(Json(DocumentListResponse {
        project_id,
        documents,
    }))
}

/// Delete a document and purge its vectors
pub async fn delete_document(
    State(state): State<AppState>,
    Path((project_id, document_id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    require_project(state.services.store.as_ref(), project_id).await?;

    if !state.services.ingestor.remove(project_id, document_id).await? {
        return Err(AppError::DocumentNotFound {
            project_id,
            document_id,
        });
    }

    tracing::info!(project_id, document_id, "Document deleted");

    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(e: MultipartError, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::Validation {
            message: e.body_text(),
            field: None,
        }
    }
}
