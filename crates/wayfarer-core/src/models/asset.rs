use bytes::Bytes;

/// Result of normalization/compression. Replaces the original buffer in the
/// pipeline; the original buffer's EXIF remains the source of truth for the
/// metadata sanitizer.
#[derive(Debug, Clone)]
pub struct ProcessedAsset {
    pub bytes: Bytes,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl ProcessedAsset {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}
