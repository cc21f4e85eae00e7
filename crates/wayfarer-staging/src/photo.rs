//! A photo held in the staging cache before commit.

use bytes::Bytes;
use uuid::Uuid;

use wayfarer_core::models::RemoteReference;

use crate::preview::PreviewHandle;

/// Per-photo upload lifecycle within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Done,
    Error,
}

/// An ephemeral, client-owned staged photo. Destroyed when removed or when
/// the owning batch is cleared.
#[derive(Debug)]
pub struct StagedPhoto {
    pub id: Uuid,
    pub bytes: Bytes,
    pub preview: PreviewHandle,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
    pub state: UploadState,
    /// Progress percentage of the in-flight upload, 0-100.
    pub progress: u8,
    pub caption: Option<String>,
    pub error: Option<String>,
    /// Populated only after a successful remote upload.
    pub reference: Option<RemoteReference>,
}

impl StagedPhoto {
    pub fn is_uploaded(&self) -> bool {
        self.state == UploadState::Done && self.reference.is_some()
    }
}
