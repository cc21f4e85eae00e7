//! Upload validation: MIME type, extension, and byte-size policy.
//!
//! Runs before any expensive work: validation failures must never trigger a
//! scan or a decode.

use std::path::Path;

/// Common validation errors for photo uploads
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Unsupported image format: {detail}")]
    UnsupportedFormat { detail: String },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

/// Extensions on the fixed allow-list: baseline JPEG, HEIC/HEIF, TIFF.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "heic", "heif", "tif", "tiff"];

/// Content types on the fixed allow-list.
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/heic", "image/heif", "image/tiff"];

/// Photo upload validator
///
/// Holds the category-specific byte ceiling; the encoding allow-list is fixed.
pub struct PhotoValidator {
    max_file_size: usize,
}

impl PhotoValidator {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    /// Validate the raw upload size, before any conversion.
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate the encoding by extension and declared content type.
    ///
    /// Either matching the allow-list is sufficient: browsers are known to
    /// misreport MIME types for correctly-extensioned files, so the checks are
    /// OR'd rather than AND'd.
    pub fn validate_format(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let extension_ok = extension
            .as_deref()
            .is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e));
        let content_type_ok = ALLOWED_CONTENT_TYPES.contains(&content_type.to_lowercase().as_str());

        if extension_ok || content_type_ok {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedFormat {
                detail: format!(
                    "{} ({}) is not an accepted image format (JPEG, HEIC, TIFF)",
                    filename, content_type
                ),
            })
        }
    }

    /// Validate all aspects of an upload. Size first: it is the cheapest check.
    pub fn validate(
        &self,
        size: usize,
        filename: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        if filename.trim().is_empty() {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        self.validate_file_size(size)?;
        self.validate_format(filename, content_type)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> PhotoValidator {
        PhotoValidator::new(1024 * 1024) // 1MB
    }

    #[test]
    fn test_size_at_ceiling_accepted() {
        let validator = test_validator();
        assert!(validator.validate_file_size(1024 * 1024).is_ok());
    }

    #[test]
    fn test_size_one_byte_over_rejected() {
        let validator = test_validator();
        assert!(matches!(
            validator.validate_file_size(1024 * 1024 + 1),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_empty_file_rejected() {
        let validator = test_validator();
        assert!(matches!(
            validator.validate_file_size(0),
            Err(ValidationError::EmptyFile)
        ));
    }

    #[test]
    fn test_good_extension_wrong_mime_accepted() {
        // Extension and MIME are OR'd, not AND'd.
        let validator = test_validator();
        assert!(validator
            .validate_format("photo.jpg", "application/octet-stream")
            .is_ok());
    }

    #[test]
    fn test_good_mime_wrong_extension_accepted() {
        let validator = test_validator();
        assert!(validator.validate_format("photo.bin", "image/jpeg").is_ok());
    }

    #[test]
    fn test_both_wrong_rejected() {
        let validator = test_validator();
        assert!(matches!(
            validator.validate_format("notes.txt", "text/plain"),
            Err(ValidationError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_heic_and_tiff_allowed() {
        let validator = test_validator();
        assert!(validator.validate_format("img.HEIC", "image/heic").is_ok());
        assert!(validator.validate_format("scan.tiff", "image/tiff").is_ok());
        assert!(validator.validate_format("scan.tif", "image/tiff").is_ok());
    }

    #[test]
    fn test_png_not_on_allow_list() {
        let validator = test_validator();
        assert!(validator.validate_format("img.png", "image/png").is_err());
    }

    #[test]
    fn test_validate_all() {
        let validator = test_validator();
        assert!(validator.validate(512, "a.jpg", "image/jpeg").is_ok());
        assert!(validator.validate(512, "", "image/jpeg").is_err());
        assert!(validator
            .validate(2 * 1024 * 1024, "a.jpg", "image/jpeg")
            .is_err());
    }
}
