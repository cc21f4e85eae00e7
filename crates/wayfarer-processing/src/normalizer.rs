//! Format normalization: camera-proprietary and archival formats (HEIC/HEIF,
//! TIFF) are decoded and re-encoded as baseline JPEG at high fidelity. Inputs
//! already in a baseline web format pass through untouched.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;

use crate::exif;
use crate::jpeg::encode_jpeg;

/// Quality used when re-encoding a converted image.
const NORMALIZE_QUALITY: u8 = 90;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Unsupported image format: {0}")]
    Unsupported(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Output of the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Bytes,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Original capture timestamp carried over from the source container.
    pub captured_at: Option<DateTime<Utc>>,
    /// Whether a format conversion actually happened.
    pub converted: bool,
}

/// Normalize an uploaded image to a baseline web format.
///
/// JPEG input passes through untouched unless it carries an EXIF orientation,
/// in which case it is re-encoded with the rotation applied. HEIC/HEIF and
/// TIFF are decoded to raw pixels (first frame for multi-frame TIFFs) and
/// re-encoded as baseline JPEG; the EXIF orientation is baked into the output
/// pixels and the capture timestamp is carried on the returned struct. A
/// malformed variant of an otherwise-allowed format is a terminal
/// `ConversionError`.
pub fn normalize(data: &[u8], content_type: &str) -> Result<NormalizedImage, ConversionError> {
    let captured_at = exif::capture_timestamp(data);

    if is_heif(data, content_type) {
        let img = decode_heif(data)?;
        return reencode(img, data, captured_at);
    }

    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => {
            // Downstream stages discard EXIF, so a rotation carried only in
            // the orientation tag must be baked into the pixels here.
            if exif::orientation(data).is_some_and(|o| o > 1) {
                let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
                    .map_err(|e| ConversionError::Decode(e.to_string()))?;
                return reencode(img, data, captured_at);
            }
            let (width, height) = ImageReader::new(Cursor::new(data))
                .with_guessed_format()
                .map_err(|e| ConversionError::Decode(e.to_string()))?
                .into_dimensions()
                .map_err(|e| ConversionError::Decode(e.to_string()))?;
            Ok(NormalizedImage {
                bytes: Bytes::copy_from_slice(data),
                mime_type: "image/jpeg".to_string(),
                width,
                height,
                captured_at,
                converted: false,
            })
        }
        Ok(ImageFormat::Tiff) => {
            // The tiff decoder reads the first IFD, so multi-frame TIFFs
            // deterministically yield their first frame.
            let img = image::load_from_memory_with_format(data, ImageFormat::Tiff)
                .map_err(|e| ConversionError::Decode(format!("TIFF decode failed: {}", e)))?;
            reencode(img, data, captured_at)
        }
        Ok(other) => Err(ConversionError::Unsupported(format!("{:?}", other))),
        Err(_) => Err(ConversionError::Unsupported(format!(
            "unrecognized image data (declared {})",
            content_type
        ))),
    }
}

fn reencode(
    img: DynamicImage,
    original: &[u8],
    captured_at: Option<DateTime<Utc>>,
) -> Result<NormalizedImage, ConversionError> {
    let img = match exif::orientation(original) {
        Some(orientation) if orientation > 1 => apply_orientation(img, orientation),
        _ => img,
    };
    let (width, height) = (img.width(), img.height());

    let encoded = encode_jpeg(&img, NORMALIZE_QUALITY)
        .map_err(|e| ConversionError::Encode(e.to_string()))?;

    Ok(NormalizedImage {
        bytes: Bytes::from(encoded),
        mime_type: "image/jpeg".to_string(),
        width,
        height,
        captured_at,
        converted: true,
    })
}

/// Bake the EXIF orientation into the pixel data.
fn apply_orientation(img: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// HEIF containers start with an ISO-BMFF `ftyp` box; image's format sniffing
/// does not cover them, so check the brand directly.
fn is_heif(data: &[u8], content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    if ct == "image/heic" || ct == "image/heif" {
        return true;
    }
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    matches!(&data[8..12], b"heic" | b"heix" | b"hevc" | b"heif" | b"mif1")
}

#[cfg(feature = "heif")]
fn decode_heif(data: &[u8]) -> Result<DynamicImage, ConversionError> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data)
        .map_err(|e| ConversionError::Decode(format!("HEIF parse failed: {}", e)))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| ConversionError::Decode(format!("HEIF primary image: {}", e)))?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| ConversionError::Decode(format!("HEIF decode failed: {}", e)))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| ConversionError::Decode("HEIF decode produced no RGB plane".to_string()))?;

    let width = plane.width;
    let height = plane.height;
    let stride = plane.stride;
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for row in 0..height as usize {
        let start = row * stride;
        rgb.extend_from_slice(&plane.data[start..start + (width as usize) * 3]);
    }

    let buffer = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| ConversionError::Decode("HEIF plane size mismatch".to_string()))?;
    Ok(DynamicImage::ImageRgb8(buffer))
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_data: &[u8]) -> Result<DynamicImage, ConversionError> {
    Err(ConversionError::Unsupported(
        "HEIC/HEIF decoding is not enabled in this build".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn tiff_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 240]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Tiff)
            .unwrap();
        buffer
    }

    fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([5, 5, 5])));
        encode_jpeg(&img, 90).unwrap()
    }

    /// JPEG fixture with a minimal EXIF block holding just the orientation tag.
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
        use img_parts::jpeg::Jpeg;
        use img_parts::ImageEXIF;

        // Little-endian TIFF header, one IFD0 entry: Orientation, SHORT x1.
        let mut payload = vec![
            0x49, 0x49, 0x2a, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x12, 0x01, 0x03, 0x00,
            0x01, 0x00, 0x00, 0x00,
        ];
        payload.extend_from_slice(&[orientation, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut jpeg = Jpeg::from_bytes(jpeg_fixture(width, height).into()).unwrap();
        jpeg.set_exif(Some(payload.into()));
        jpeg.encoder().bytes().to_vec()
    }

    #[test]
    fn test_jpeg_passthrough_unchanged() {
        let data = jpeg_fixture(80, 60);
        let out = normalize(&data, "image/jpeg").unwrap();
        assert!(!out.converted);
        assert_eq!(out.bytes.as_ref(), data.as_slice());
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!((out.width, out.height), (80, 60));
    }

    #[test]
    fn test_jpeg_orientation_is_baked_into_pixels() {
        let data = jpeg_with_orientation(40, 20, 6);
        assert_eq!(exif::orientation(&data), Some(6));

        let out = normalize(&data, "image/jpeg").unwrap();
        assert!(out.converted);
        // Orientation 6 is a 90-degree rotation, so the sides swap.
        assert_eq!((out.width, out.height), (20, 40));

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 40));
        // The output carries no orientation tag left to re-apply.
        assert_eq!(exif::orientation(&out.bytes), None);
    }

    #[test]
    fn test_jpeg_upright_orientation_still_passthrough() {
        let data = jpeg_with_orientation(40, 20, 1);
        let out = normalize(&data, "image/jpeg").unwrap();
        assert!(!out.converted);
        assert_eq!(out.bytes.as_ref(), data.as_slice());
    }

    #[test]
    fn test_tiff_converted_to_jpeg_same_dimensions() {
        let data = tiff_fixture(120, 90);
        let out = normalize(&data, "image/tiff").unwrap();
        assert!(out.converted);
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!((out.width, out.height), (120, 90));

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 90));
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_garbage_is_terminal() {
        let result = normalize(b"definitely not an image", "image/tiff");
        assert!(matches!(result, Err(ConversionError::Unsupported(_))));
    }

    #[test]
    fn test_format_outside_allow_list_rejected() {
        let img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        assert!(matches!(
            normalize(&buffer, "image/png"),
            Err(ConversionError::Unsupported(_))
        ));
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn test_heif_without_feature_is_unsupported() {
        // Minimal ftyp box with a heic brand
        let mut data = vec![0, 0, 0, 24];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            normalize(&data, "image/heic"),
            Err(ConversionError::Unsupported(_))
        ));
    }

    #[cfg(feature = "heif")]
    #[test]
    fn test_heif_converted_to_jpeg_same_dimensions() {
        use libheif_rs::{
            Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
            RgbChroma,
        };

        let (width, height) = (96u32, 64u32);
        let mut src = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).unwrap();
        src.create_plane(Channel::Interleaved, width, height, 24)
            .unwrap();
        {
            let planes = src.planes_mut();
            let plane = planes.interleaved.unwrap();
            let stride = plane.stride;
            for row in 0..height as usize {
                for col in 0..width as usize {
                    let i = row * stride + col * 3;
                    plane.data[i] = 40;
                    plane.data[i + 1] = 140;
                    plane.data[i + 2] = 220;
                }
            }
        }

        let lib_heif = LibHeif::new();
        let mut encoder = lib_heif
            .encoder_for_format(CompressionFormat::Hevc)
            .unwrap();
        encoder.set_quality(EncoderQuality::Lossy(90)).unwrap();
        let mut ctx = HeifContext::new().unwrap();
        ctx.encode_image(&src, &mut encoder, None).unwrap();
        let data = ctx.write_to_bytes().unwrap();

        let out = normalize(&data, "image/heic").unwrap();
        assert!(out.converted);
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!((out.width, out.height), (width, height));

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (width, height));
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_apply_orientation_rotates_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([1, 2, 3])));
        let rotated = apply_orientation(img, 6);
        assert_eq!((rotated.width(), rotated.height()), (20, 40));
    }
}
