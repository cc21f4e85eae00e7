//! Client-side staging for batched photo uploads: preview-handle lifecycle,
//! primary-photo bookkeeping, and strictly sequential batch commit.

pub mod cache;
pub mod photo;
pub mod preview;
pub mod uploader;

pub use cache::{StagingCache, StagingError};
pub use photo::{StagedPhoto, UploadState};
pub use preview::PreviewHandle;
pub use uploader::{ApiUploader, BatchUploader};
