//! Adaptive lossy compression toward a category-specific size target.
//!
//! Two-phase, bounded algorithm: a quality loop at original dimensions, then
//! at most one dimension-reduction pass. Compression is best-effort and
//! non-terminal: an upload is never blocked because compression underperformed.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};

use crate::jpeg::encode_jpeg;

/// Quality levels tried at original dimensions, best first.
const QUALITY_STEPS: &[u8] = &[90, 80, 70, 60];

/// Factor applied to both dimensions in the single fallback pass.
const DOWNSCALE_FACTOR: f32 = 0.9;

/// Quality used for the downscaled attempt.
const DOWNSCALE_QUALITY: u8 = 85;

/// Result of a compression attempt.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    /// Whether the encoded size reached the target.
    pub met_target: bool,
}

/// Compress `data` toward `target_bytes`.
///
/// Skips entirely when the input is already at or under the target, returning
/// the original bytes unchanged. On any decode or encode failure the original
/// bytes are returned unmodified (soft failure). The returned buffer is never
/// larger than the input.
pub fn compress(data: &[u8], target_bytes: usize) -> CompressionOutcome {
    let original_len = data.len();

    // Already at or under target: only the header is read, never the pixels.
    if original_len <= target_bytes {
        let (width, height) = header_dimensions(data);
        return CompressionOutcome {
            bytes: Bytes::copy_from_slice(data),
            width,
            height,
            met_target: true,
        };
    }

    let img = match image::load_from_memory(data) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, "Compression skipped: input failed to decode");
            return passthrough(data, target_bytes);
        }
    };
    let (width, height) = img.dimensions();

    // Phase one: re-encode at decreasing quality, original dimensions.
    let mut best: Option<(Vec<u8>, u32, u32)> = None;
    for &quality in QUALITY_STEPS {
        match encode_jpeg(&img, quality) {
            Ok(encoded) => {
                let len = encoded.len();
                if len <= target_bytes {
                    tracing::debug!(quality, size = len, "Compression target met");
                    return CompressionOutcome {
                        bytes: Bytes::from(encoded),
                        width,
                        height,
                        met_target: true,
                    };
                }
                if best.as_ref().is_none_or(|(b, _, _)| len < b.len()) {
                    best = Some((encoded, width, height));
                }
            }
            Err(e) => {
                tracing::warn!(quality, error = %e, "JPEG encode attempt failed");
            }
        }
    }

    // Phase two: a single dimension-reduction pass. Not iterated further.
    let scaled_w = ((width as f32) * DOWNSCALE_FACTOR).round().max(1.0) as u32;
    let scaled_h = ((height as f32) * DOWNSCALE_FACTOR).round().max(1.0) as u32;
    let scaled = img.resize_exact(scaled_w, scaled_h, FilterType::Lanczos3);
    match encode_jpeg(&scaled, DOWNSCALE_QUALITY) {
        Ok(encoded) => {
            let len = encoded.len();
            if len <= target_bytes {
                tracing::debug!(size = len, scaled_w, scaled_h, "Compression target met after downscale");
                return CompressionOutcome {
                    bytes: Bytes::from(encoded),
                    width: scaled_w,
                    height: scaled_h,
                    met_target: true,
                };
            }
            if best.as_ref().is_none_or(|(b, _, _)| len < b.len()) {
                best = Some((encoded, scaled_w, scaled_h));
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Downscale encode attempt failed");
        }
    }

    // Target unreachable: proceed with the smallest result obtained.
    match best {
        Some((encoded, w, h)) if encoded.len() < original_len => {
            tracing::warn!(
                original = original_len,
                achieved = encoded.len(),
                target = target_bytes,
                "Compression shortfall: proceeding with best-effort result"
            );
            CompressionOutcome {
                bytes: Bytes::from(encoded),
                width: w,
                height: h,
                met_target: false,
            }
        }
        _ => {
            tracing::warn!(
                original = original_len,
                target = target_bytes,
                "Compression shortfall: no attempt beat the original"
            );
            passthrough(data, target_bytes)
        }
    }
}

fn header_dimensions(data: &[u8]) -> (u32, u32) {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .unwrap_or((0, 0))
}

fn passthrough(data: &[u8], target_bytes: usize) -> CompressionOutcome {
    let (width, height) = header_dimensions(data);
    CompressionOutcome {
        bytes: Bytes::copy_from_slice(data),
        width,
        height,
        met_target: data.len() <= target_bytes,
    }
}
