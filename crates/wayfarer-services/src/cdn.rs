//! Remote store client for the CDN upload and management APIs.
//!
//! Uploads are authorized by single-use, short-expiry credentials signed with
//! the account private key (HMAC-SHA256 over token + expire). The private key
//! itself never travels with the request.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use wayfarer_core::models::{RemoteReference, UploadCategory};
use wayfarer_core::Config;

/// Transformation suffix the CDN resolves to a 300x300 thumbnail rendition.
const THUMBNAIL_TRANSFORM: &str = "tr=w-300,h-300";

#[derive(Debug, thiserror::Error)]
pub enum CdnError {
    #[error("CDN request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("CDN rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("CDN response missing expected fields: {0}")]
    InvalidResponse(String),
}

/// A single-use upload authorization. Valid until `expire` (unix seconds).
#[derive(Debug, Clone)]
pub struct SignedCredential {
    pub token: String,
    pub expire: i64,
    pub signature: String,
    pub public_key: String,
}

/// Pluggable remote-store seam for the upload pipeline.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Issue a fresh single-use credential for one upload by `user_id` into
    /// `category`. Each upload attempt gets its own; credentials are never
    /// reused across retries.
    fn request_credential(&self, category: UploadCategory, user_id: &str) -> SignedCredential;

    /// Multipart upload of a processed asset. Returns the remote reference
    /// only on success.
    async fn upload(
        &self,
        credential: &SignedCredential,
        file_name: &str,
        folder: &str,
        mime_type: &str,
        bytes: Bytes,
    ) -> Result<RemoteReference, CdnError>;

    /// Delete a previously uploaded asset by its remote id.
    async fn delete(&self, asset_id: &str) -> Result<(), CdnError>;
}

pub struct CdnClient {
    http: reqwest::Client,
    upload_url: String,
    api_url: String,
    url_endpoint: String,
    public_key: String,
    private_key: String,
    credential_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdnUploadResponse {
    file_id: String,
    file_path: String,
    url: String,
}

impl CdnClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: config.cdn_upload_url.clone(),
            api_url: config.cdn_api_url.trim_end_matches('/').to_string(),
            url_endpoint: config.cdn_url_endpoint.trim_end_matches('/').to_string(),
            public_key: config.cdn_public_key.clone(),
            private_key: config.cdn_private_key.clone(),
            credential_ttl_secs: config.credential_ttl_secs,
        }
    }

    fn sign(&self, token: &str, expire: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.private_key.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(token.as_bytes());
        mac.update(expire.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build the thumbnail rendition URL by query-parameter transformation.
    fn thumbnail_url(&self, url: &str) -> String {
        if url.contains('?') {
            format!("{}&{}", url, THUMBNAIL_TRANSFORM)
        } else {
            format!("{}?{}", url, THUMBNAIL_TRANSFORM)
        }
    }
}

#[async_trait]
impl RemoteStore for CdnClient {
    fn request_credential(&self, category: UploadCategory, user_id: &str) -> SignedCredential {
        let token = Uuid::new_v4().to_string();
        let expire = Utc::now().timestamp() + self.credential_ttl_secs as i64;
        let signature = self.sign(&token, expire);
        tracing::debug!(%category, user_id, token = %token, "Issued single-use upload credential");
        SignedCredential {
            token,
            expire,
            signature,
            public_key: self.public_key.clone(),
        }
    }

    async fn upload(
        &self,
        credential: &SignedCredential,
        file_name: &str,
        folder: &str,
        mime_type: &str,
        bytes: Bytes,
    ) -> Result<RemoteReference, CdnError> {
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;

        let form = reqwest::multipart::Form::new()
            .text("fileName", file_name.to_string())
            .text("folder", folder.to_string())
            .text("useUniqueFileName", "true")
            .text("token", credential.token.clone())
            .text("expire", credential.expire.to_string())
            .text("signature", credential.signature.clone())
            .text("publicKey", credential.public_key.clone())
            .part("file", part);

        tracing::debug!(file_name, folder, size, "Uploading asset to remote store");

        let response = self.http.post(&self.upload_url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %body, "Remote store rejected upload");
            return Err(CdnError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CdnUploadResponse = response
            .json()
            .await
            .map_err(|e| CdnError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            asset_id = %parsed.file_id,
            path = %parsed.file_path,
            "Asset uploaded to remote store"
        );

        Ok(RemoteReference {
            asset_id: parsed.file_id,
            path: parsed.file_path,
            thumbnail_url: self.thumbnail_url(&parsed.url),
            url: parsed.url,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), CdnError> {
        let url = format!("{}/files/{}", self.api_url, asset_id);
        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), asset_id, "Remote store delete failed");
            return Err(CdnError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(asset_id, "Asset deleted from remote store");
        Ok(())
    }
}
