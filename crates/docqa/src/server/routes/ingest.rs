//! Upload endpoints

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::Stage;
use crate::server::state::AppState;
use crate::types::{BatchResponse, UploadQuery, UploadResponse};

/// POST /upload - Ingest the multipart field `file`
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let (filename, data) = read_files(multipart, "file")
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::BadRequest("Missing multipart field 'file'".to_string()))?;

    tracing::info!("Upload: {} ({} bytes)", filename, data.len());

    let progress = state.reporter(params.upload_id);
    match state.pipeline().ingest(&filename, data, &progress).await {
        Ok(result) => Ok(Json(result.into())),
        Err(e) => {
            tracing::error!("Upload failed: {}", e);
            progress.report(Stage::Error, 0, format!("Error: {}", e));
            Err(e)
        }
    }
}

/// POST /upload-folder - Ingest every multipart field `files`, one after another
pub async fn upload_folder(
    State(state): State<AppState>,
    Query(params): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>> {
    let files = read_files(multipart, "files").await?;
    tracing::info!("Folder upload: {} files", files.len());

    let progress = state.reporter(params.upload_id);
    Ok(Json(state.pipeline().ingest_batch(files, &progress).await))
}

/// Collect `(filename, bytes)` for every field called `field_name`
async fn read_files(mut multipart: Multipart, field_name: &str) -> Result<Vec<(String, Bytes)>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("file_{}.bin", Uuid::new_v4()));
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(format!("Failed to read {}: {}", filename, e)))?;
        files.push((filename, data));
    }

    Ok(files)
}
