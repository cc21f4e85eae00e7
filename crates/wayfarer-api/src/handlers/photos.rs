//! Photo upload handler.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use wayfarer_core::models::{SanitizedMetadata, UploadCategory};
use wayfarer_core::AppError;

use crate::error::HttpAppError;
use crate::pipeline;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub upload: UploadedAsset,
    pub file: FileInfo,
    pub metadata: Option<SanitizedMetadata>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub file_id: String,
    pub file_path: String,
    pub url: String,
    pub thumbnail_url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub original_filename: String,
    pub size: usize,
    pub mime_type: String,
}

/// `POST /api/v0/photos`
///
/// Multipart fields: `photo` (binary), `uploadType` (location|avatar|banner),
/// optional `metadata` (JSON string of raw EXIF-derived fields), optional
/// `userId` (opaque acting-user identifier from the session layer, which
/// lives outside this subsystem).
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_photo"))]
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let mut photo: Option<(Bytes, String, String)> = None;
    let mut upload_type: Option<String> = None;
    let mut user_id: Option<String> = None;
    let mut raw_metadata: Option<serde_json::Value> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "photo" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::BadRequest("'photo' field needs a filename".to_string()))?;
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read 'photo': {}", e)))?;
                photo = Some((bytes, filename, content_type));
            }
            "uploadType" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read 'uploadType': {}", e)))?;
                upload_type = Some(value);
            }
            "userId" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read 'userId': {}", e)))?;
                user_id = Some(value);
            }
            "metadata" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read 'metadata': {}", e)))?;
                let value = serde_json::from_str(&text)
                    .map_err(|e| AppError::BadRequest(format!("Invalid metadata JSON: {}", e)))?;
                raw_metadata = Some(value);
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let (bytes, filename, content_type) =
        photo.ok_or_else(|| AppError::BadRequest("Missing 'photo' field".to_string()))?;
    let upload_type =
        upload_type.ok_or_else(|| AppError::BadRequest("Missing 'uploadType' field".to_string()))?;
    let category = UploadCategory::parse(&upload_type).map_err(AppError::BadRequest)?;
    let user_id = user_id.unwrap_or_else(|| "anonymous".to_string());

    let size = bytes.len();
    let output = pipeline::process_upload(
        &state,
        category,
        &user_id,
        &filename,
        &content_type,
        bytes,
        raw_metadata,
    )
    .await?;

    Ok(Json(UploadResponse {
        upload: UploadedAsset {
            file_id: output.reference.asset_id,
            file_path: output.reference.path,
            url: output.reference.url,
            thumbnail_url: output.reference.thumbnail_url,
            width: output.asset.width,
            height: output.asset.height,
        },
        // `file` describes the upload as received; the processed rendition is
        // always the `upload` block's baseline JPEG.
        file: FileInfo {
            original_filename: filename,
            size,
            mime_type: content_type,
        },
        metadata: output.metadata,
    }))
}
