//! Seam between the staging cache and the server's upload endpoint.

use async_trait::async_trait;

use wayfarer_core::models::{RemoteReference, UploadCategory};

use crate::photo::StagedPhoto;

/// Uploads one staged photo at a time. Implementations obtain a fresh
/// single-use credential for every call; credentials are never shared across
/// photos in a batch.
#[async_trait]
pub trait BatchUploader: Send + Sync {
    async fn upload_photo(
        &self,
        photo: &StagedPhoto,
        category: UploadCategory,
    ) -> anyhow::Result<RemoteReference>;
}

/// `BatchUploader` that posts to the ingestion service's upload endpoint.
pub struct ApiUploader {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponseBody {
    upload: UploadedAsset,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedAsset {
    file_id: String,
    file_path: String,
    url: String,
    thumbnail_url: String,
}

impl ApiUploader {
    /// `endpoint` is the full URL of the photo upload route.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl BatchUploader for ApiUploader {
    async fn upload_photo(
        &self,
        photo: &StagedPhoto,
        category: UploadCategory,
    ) -> anyhow::Result<RemoteReference> {
        let part = reqwest::multipart::Part::bytes(photo.bytes.to_vec())
            .file_name(photo.filename.clone())
            .mime_str(&photo.mime_type)?;
        let form = reqwest::multipart::Form::new()
            .text("uploadType", category.as_str().to_string())
            .part("photo", part);

        let response = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("upload rejected ({}): {}", status, body);
        }

        let parsed: UploadResponseBody = response.json().await?;
        Ok(RemoteReference {
            asset_id: parsed.upload.file_id,
            path: parsed.upload.file_path,
            url: parsed.upload.url,
            thumbnail_url: parsed.upload.thumbnail_url,
        })
    }
}
