//! Index status, listing and deletion

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{DeleteQuery, DeleteResponse, StatusResponse, UploadedFilesResponse};

/// GET /status
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    let active = state.index().read().await;
    Ok(Json(StatusResponse {
        total_vectors_stored: active.store.count().await?,
        database_path: active.store.location().display().to_string(),
        embedding_model: active.model_name.clone(),
        available_models: state.index().available_models().to_vec(),
        index_version: active.version,
    }))
}

/// GET /uploaded-files
pub async fn uploaded_files(State(state): State<AppState>) -> Result<Json<UploadedFilesResponse>> {
    Ok(Json(UploadedFilesResponse {
        files: state.pipeline().upload_log().list().await?,
    }))
}

/// DELETE /delete-document?filename=
pub async fn delete_document(
    State(state): State<AppState>,
    Query(params): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>> {
    let removed = state.pipeline().delete_document(&params.filename).await?;
    tracing::info!("Deleted {} ({} chunks)", params.filename, removed);

    Ok(Json(DeleteResponse {
        status: "deleted".to_string(),
        filename: params.filename,
    }))
}
