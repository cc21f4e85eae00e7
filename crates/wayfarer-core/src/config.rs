//! Configuration module
//!
//! Environment-sourced configuration for the media ingestion service: scanner
//! host/port and posture, per-category byte-size ceilings, per-category
//! compression targets, and remote-store credentials.

use std::env;

use crate::models::{ScanPosture, UploadCategory};

const MAX_PHOTO_SIZE_MB: usize = 10;
const MAX_AVATAR_SIZE_MB: usize = 5;
const MAX_BANNER_SIZE_MB: usize = 10;
const PHOTO_TARGET_MB: usize = 2;
const AVATAR_TARGET_MB: usize = 1;
const BANNER_TARGET_MB: usize = 2;
const CLAMAV_TIMEOUT_SECS: u64 = 30;
const CREDENTIAL_TTL_SECS: u64 = 300;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    // ClamAV configuration
    pub clamav_enabled: bool,
    pub clamav_host: String,
    pub clamav_port: u16,
    pub clamav_fail_closed: bool,
    /// Timeout for a single scan, distinct from the overall request timeout.
    pub clamav_timeout_secs: u64,
    // Per-category size policy
    pub max_photo_size_bytes: usize,
    pub max_avatar_size_bytes: usize,
    pub max_banner_size_bytes: usize,
    pub photo_target_bytes: usize,
    pub avatar_target_bytes: usize,
    pub banner_target_bytes: usize,
    // Remote store (CDN) configuration
    pub cdn_upload_url: String,
    /// Management API base, used for asset deletion.
    pub cdn_api_url: String,
    pub cdn_url_endpoint: String,
    pub cdn_public_key: String,
    pub cdn_private_key: String,
    pub credential_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            clamav_enabled: env::var("CLAMAV_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            clamav_host: env::var("CLAMAV_HOST").unwrap_or_else(|_| "localhost".to_string()),
            clamav_port: env::var("CLAMAV_PORT")
                .unwrap_or_else(|_| "3310".to_string())
                .parse()
                .unwrap_or(3310),
            // Fail-open by default in development, fail-closed in production.
            // The fail-open default means uploads proceed unscanned when the
            // daemon is down; deployments that cannot accept that must set
            // CLAMAV_FAIL_CLOSED=true explicitly.
            clamav_fail_closed: env::var("CLAMAV_FAIL_CLOSED")
                .unwrap_or_else(|_| is_production.to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(is_production),
            clamav_timeout_secs: env::var("CLAMAV_TIMEOUT_SECS")
                .unwrap_or_else(|_| CLAMAV_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CLAMAV_TIMEOUT_SECS),
            max_photo_size_bytes: mb_from_env("MAX_PHOTO_SIZE_MB", MAX_PHOTO_SIZE_MB),
            max_avatar_size_bytes: mb_from_env("MAX_AVATAR_SIZE_MB", MAX_AVATAR_SIZE_MB),
            max_banner_size_bytes: mb_from_env("MAX_BANNER_SIZE_MB", MAX_BANNER_SIZE_MB),
            photo_target_bytes: mb_from_env("PHOTO_TARGET_SIZE_MB", PHOTO_TARGET_MB),
            avatar_target_bytes: mb_from_env("AVATAR_TARGET_SIZE_MB", AVATAR_TARGET_MB),
            banner_target_bytes: mb_from_env("BANNER_TARGET_SIZE_MB", BANNER_TARGET_MB),
            cdn_upload_url: env::var("CDN_UPLOAD_URL")
                .map_err(|_| anyhow::anyhow!("CDN_UPLOAD_URL must be set"))?,
            cdn_api_url: env::var("CDN_API_URL")
                .unwrap_or_else(|_| "https://api.imagekit.io/v1".to_string()),
            cdn_url_endpoint: env::var("CDN_URL_ENDPOINT")
                .map_err(|_| anyhow::anyhow!("CDN_URL_ENDPOINT must be set"))?,
            cdn_public_key: env::var("CDN_PUBLIC_KEY")
                .map_err(|_| anyhow::anyhow!("CDN_PUBLIC_KEY must be set"))?,
            cdn_private_key: env::var("CDN_PRIVATE_KEY")
                .map_err(|_| anyhow::anyhow!("CDN_PRIVATE_KEY must be set"))?,
            credential_ttl_secs: env::var("CDN_CREDENTIAL_TTL_SECS")
                .unwrap_or_else(|_| CREDENTIAL_TTL_SECS.to_string())
                .parse()
                .unwrap_or(CREDENTIAL_TTL_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.cdn_private_key.len() < 16 {
            return Err(anyhow::anyhow!(
                "CDN_PRIVATE_KEY must be at least 16 characters long"
            ));
        }
        if !self.cdn_upload_url.starts_with("http") {
            return Err(anyhow::anyhow!("CDN_UPLOAD_URL must be an http(s) URL"));
        }
        if !self.cdn_url_endpoint.starts_with("http") {
            return Err(anyhow::anyhow!("CDN_URL_ENDPOINT must be an http(s) URL"));
        }
        if !self.cdn_api_url.starts_with("http") {
            return Err(anyhow::anyhow!("CDN_API_URL must be an http(s) URL"));
        }
        if self.credential_ttl_secs == 0 {
            return Err(anyhow::anyhow!("CDN_CREDENTIAL_TTL_SECS must be positive"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Scanner posture, fixed at deployment time.
    pub fn scan_posture(&self) -> ScanPosture {
        if !self.clamav_enabled {
            ScanPosture::Disabled
        } else if self.clamav_fail_closed {
            ScanPosture::FailClosed
        } else {
            ScanPosture::FailOpen
        }
    }

    /// Raw upload byte ceiling for a category, checked before any conversion.
    pub fn byte_ceiling(&self, category: UploadCategory) -> usize {
        match category {
            UploadCategory::Location => self.max_photo_size_bytes,
            UploadCategory::Avatar => self.max_avatar_size_bytes,
            UploadCategory::Banner => self.max_banner_size_bytes,
        }
    }

    /// Encoded-size target the compressor works toward for a category.
    pub fn compression_target(&self, category: UploadCategory) -> usize {
        match category {
            UploadCategory::Location => self.photo_target_bytes,
            UploadCategory::Avatar => self.avatar_target_bytes,
            UploadCategory::Banner => self.banner_target_bytes,
        }
    }
}

fn mb_from_env(key: &str, default_mb: usize) -> usize {
    env::var(key)
        .unwrap_or_else(|_| default_mb.to_string())
        .parse::<usize>()
        .unwrap_or(default_mb)
        * 1024
        * 1024
}
