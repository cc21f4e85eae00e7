//! Client-side staging cache: the holding area for a batch of photos between
//! file selection and commit.
//!
//! The cache exclusively owns every preview handle it creates. Batch upload is
//! intentionally sequential to bound concurrent credential usage against the
//! remote store; do not fan it out.

use bytes::Bytes;
use image::ImageReader;
use std::io::Cursor;
use uuid::Uuid;

use wayfarer_core::models::{RemoteReference, UploadCategory};

use crate::photo::{StagedPhoto, UploadState};
use crate::preview::PreviewHandle;
use crate::uploader::BatchUploader;

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("Not an image: {0}")]
    NotAnImage(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Empty file")]
    EmptyFile,

    #[error("Could not read image dimensions: {0}")]
    Undecodable(String),

    #[error("No staged photo with id {0}")]
    UnknownId(Uuid),

    #[error("Upload failed for photo {id}: {message}")]
    UploadFailed { id: Uuid, message: String },
}

/// A batch of staged photos for one upload category.
pub struct StagingCache {
    category: UploadCategory,
    byte_ceiling: usize,
    photos: Vec<StagedPhoto>,
}

impl StagingCache {
    pub fn new(category: UploadCategory, byte_ceiling: usize) -> Self {
        Self {
            category,
            byte_ceiling,
            photos: Vec::new(),
        }
    }

    pub fn category(&self) -> UploadCategory {
        self.category
    }

    pub fn photos(&self) -> &[StagedPhoto] {
        &self.photos
    }

    pub fn get(&self, id: Uuid) -> Option<&StagedPhoto> {
        self.photos.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn primary(&self) -> Option<&StagedPhoto> {
        self.photos.iter().find(|p| p.is_primary)
    }

    /// Stage a selected file.
    ///
    /// MIME and size checks are synchronous and run before any decoding.
    /// Dimensions come from a header-only decode; the pixel data itself is not
    /// decompressed here. The first photo staged into an empty batch becomes
    /// primary.
    pub fn add(
        &mut self,
        bytes: Bytes,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        preview: PreviewHandle,
    ) -> Result<Uuid, StagingError> {
        let mime_type = mime_type.into();
        if !mime_type.to_lowercase().starts_with("image/") {
            return Err(StagingError::NotAnImage(mime_type));
        }
        let size = bytes.len();
        if size == 0 {
            return Err(StagingError::EmptyFile);
        }
        if size > self.byte_ceiling {
            return Err(StagingError::TooLarge {
                size,
                max: self.byte_ceiling,
            });
        }

        let (width, height) = ImageReader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()
            .map_err(|e| StagingError::Undecodable(e.to_string()))?
            .into_dimensions()
            .map_err(|e| StagingError::Undecodable(e.to_string()))?;

        let id = Uuid::new_v4();
        let is_primary = self.photos.is_empty();
        self.photos.push(StagedPhoto {
            id,
            bytes,
            preview,
            filename: filename.into(),
            size,
            mime_type,
            width,
            height,
            is_primary,
            state: UploadState::Idle,
            progress: 0,
            caption: None,
            error: None,
            reference: None,
        });
        tracing::debug!(%id, size, width, height, is_primary, "Photo staged");
        Ok(id)
    }

    /// Remove a staged photo, revoking its preview. If it was primary and
    /// others remain, the oldest remaining photo becomes primary.
    pub fn remove(&mut self, id: Uuid) -> Result<(), StagingError> {
        let index = self
            .photos
            .iter()
            .position(|p| p.id == id)
            .ok_or(StagingError::UnknownId(id))?;

        let mut removed = self.photos.remove(index);
        removed.preview.revoke();

        if removed.is_primary {
            if let Some(first) = self.photos.first_mut() {
                first.is_primary = true;
            }
        }
        Ok(())
    }

    /// Make the given photo primary, demoting the current one.
    pub fn set_primary(&mut self, id: Uuid) -> Result<(), StagingError> {
        if !self.photos.iter().any(|p| p.id == id) {
            return Err(StagingError::UnknownId(id));
        }
        for photo in &mut self.photos {
            photo.is_primary = photo.id == id;
        }
        Ok(())
    }

    pub fn update_caption(
        &mut self,
        id: Uuid,
        caption: impl Into<String>,
    ) -> Result<(), StagingError> {
        let photo = self
            .photos
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StagingError::UnknownId(id))?;
        photo.caption = Some(caption.into());
        Ok(())
    }

    /// Upload every pending photo, strictly one at a time in insertion order.
    ///
    /// The uploader obtains a fresh single-use credential per photo. The first
    /// failure marks that photo `Error`, leaves the rest untouched, and aborts;
    /// photos already uploaded in this batch stay uploaded. Callers decide
    /// whether to retry the failed item or discard the batch. Photos already
    /// in `Done` state are skipped, so a retry re-attempts only what failed.
    pub async fn upload_all(
        &mut self,
        uploader: &dyn BatchUploader,
    ) -> Result<Vec<RemoteReference>, StagingError> {
        let category = self.category;
        for photo in &mut self.photos {
            if photo.state == UploadState::Done {
                continue;
            }
            photo.state = UploadState::Uploading;
            photo.progress = 0;
            photo.error = None;

            match uploader.upload_photo(photo, category).await {
                Ok(reference) => {
                    photo.state = UploadState::Done;
                    photo.progress = 100;
                    photo.reference = Some(reference);
                    tracing::debug!(id = %photo.id, "Batch upload: photo done");
                }
                Err(e) => {
                    let message = e.to_string();
                    photo.state = UploadState::Error;
                    photo.error = Some(message.clone());
                    tracing::warn!(id = %photo.id, error = %message, "Batch upload aborted");
                    return Err(StagingError::UploadFailed {
                        id: photo.id,
                        message,
                    });
                }
            }
        }

        Ok(self
            .photos
            .iter()
            .filter_map(|p| p.reference.clone())
            .collect())
    }

    /// Release every staged resource. Idempotent; revocation itself is
    /// guarded per handle, so handles are released exactly once.
    pub fn clear(&mut self) {
        for photo in &mut self.photos {
            photo.preview.revoke();
        }
        self.photos.clear();
    }
}

impl Drop for StagingCache {
    fn drop(&mut self) {
        self.clear();
    }
}
