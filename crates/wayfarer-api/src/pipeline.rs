//! Server-side upload pipeline.
//!
//! Per photo: Received -> Validated -> Scanned -> Normalized -> Compressed ->
//! Uploaded -> MetadataAttached. An infected verdict or any terminal stage
//! error short-circuits to rejection; no partial buffers travel downstream.
//! The raw buffer is owned for the duration of the request only.

use bytes::Bytes;

use wayfarer_core::models::{ProcessedAsset, RemoteReference, SanitizedMetadata, UploadCategory};
use wayfarer_core::AppError;
use wayfarer_processing::{
    compress, extract_and_sanitize, normalize, sanitize_raw, strip_embedded_metadata,
    PhotoValidator,
};

use crate::state::AppState;

#[derive(Debug)]
pub struct PipelineOutput {
    pub reference: RemoteReference,
    pub asset: ProcessedAsset,
    /// `None` when neither the client nor the image carried any usable metadata.
    pub metadata: Option<SanitizedMetadata>,
}

/// Run one photo through the full ingestion pipeline.
///
/// `user_id` is the acting user as identified by the caller; this subsystem
/// treats it as opaque and only threads it into audit events and credential
/// requests. `raw_metadata` is the client-supplied EXIF-derived JSON, which
/// takes precedence over parsing the original bytes. Metadata sanitization
/// always works from pre-normalization input, since conversion may strip or
/// alter embedded tags.
pub async fn process_upload(
    state: &AppState,
    category: UploadCategory,
    user_id: &str,
    filename: &str,
    content_type: &str,
    data: Bytes,
    raw_metadata: Option<serde_json::Value>,
) -> Result<PipelineOutput, AppError> {
    // Validated: cheap checks first, before any scan or decode.
    let validator = PhotoValidator::new(state.config.byte_ceiling(category));
    validator
        .validate(data.len(), filename, content_type)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    tracing::debug!(%category, filename, size = data.len(), "Upload validated");

    // Scanned: infected is terminal, with a security-audit event.
    let verdict = state.scanner.scan(&data, filename).await;
    if verdict.infected {
        tracing::warn!(
            signatures = ?verdict.signatures,
            %category,
            user = user_id,
            filename,
            scanner_available = verdict.scanner_available,
            "Security audit: upload rejected by virus scan"
        );
        return Err(AppError::SecurityViolation(verdict.signatures.join(", ")));
    }
    if !verdict.scanner_available {
        if let Some(error) = &verdict.error {
            tracing::warn!(error = %error, "Scanner unavailable, continuing per fail-open posture");
        }
    }

    // Normalized / Compressed: CPU-bound, moved off the async worker. The
    // sanitizer consumes the original bytes in the same pass.
    let target = state.config.compression_target(category);
    let content_type = content_type.to_string();
    let original = data.clone();
    let (asset, metadata) = tokio::task::spawn_blocking(
        move || -> Result<(ProcessedAsset, SanitizedMetadata), AppError> {
            let normalized = normalize(&original, &content_type)
                .map_err(|e| AppError::Conversion(e.to_string()))?;
            if normalized.converted {
                tracing::debug!(
                    mime_type = %normalized.mime_type,
                    width = normalized.width,
                    height = normalized.height,
                    "Upload normalized"
                );
            }

            let metadata = match &raw_metadata {
                Some(raw) => sanitize_raw(raw),
                None => extract_and_sanitize(&original),
            };

            let outcome = compress(&normalized.bytes, target);
            let bytes = strip_embedded_metadata(&outcome.bytes);
            let asset = ProcessedAsset {
                bytes: Bytes::from(bytes),
                mime_type: normalized.mime_type,
                width: outcome.width,
                height: outcome.height,
            };
            Ok((asset, metadata))
        },
    )
    .await
    .map_err(|e| AppError::Internal(format!("processing task failed: {}", e)))??;

    // Uploaded: fresh single-use credential, one retry with another fresh
    // credential, then terminal.
    let remote_name = sanitize_filename(filename)?;
    let folder = category.folder();
    let credential = state.store.request_credential(category, user_id);
    let reference = match state
        .store
        .upload(&credential, &remote_name, folder, &asset.mime_type, asset.bytes.clone())
        .await
    {
        Ok(reference) => reference,
        Err(first) => {
            tracing::warn!(error = %first, "Upload failed, retrying once with a fresh credential");
            let credential = state.store.request_credential(category, user_id);
            state
                .store
                .upload(&credential, &remote_name, folder, &asset.mime_type, asset.bytes.clone())
                .await
                .map_err(|e| AppError::Upload(e.to_string()))?
        }
    };

    tracing::info!(
        asset_id = %reference.asset_id,
        %category,
        size = asset.size(),
        "Upload complete"
    );

    // MetadataAttached
    let metadata = if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    };

    Ok(PipelineOutput {
        reference,
        asset,
        metadata,
    })
}

/// Strip any path components and non-portable characters from a client
/// filename before it becomes the remote `fileName`.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    const MAX_FILENAME_LENGTH: usize = 255;

    if filename.contains("..") {
        return Err(AppError::Validation(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let filename_only = std::path::Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '_' || c == '.') {
        return Err(AppError::Validation("Invalid filename".to_string()));
    }

    Ok(sanitized)
}
