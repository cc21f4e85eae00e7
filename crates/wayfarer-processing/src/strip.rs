//! Embedded-metadata removal for outbound assets.
//!
//! Sanitized metadata is extracted separately; the bytes that leave the
//! subsystem carry no EXIF at all.

use img_parts::jpeg::Jpeg;
use img_parts::ImageEXIF;

/// Strip the embedded EXIF block from a JPEG buffer.
///
/// Non-JPEG or unparseable input is returned unchanged; by the time this runs
/// the pipeline has already normalized everything to baseline JPEG.
pub fn strip_embedded_metadata(data: &[u8]) -> Vec<u8> {
    match Jpeg::from_bytes(data.to_vec().into()) {
        Ok(mut jpeg) => {
            jpeg.set_exif(None);
            jpeg.encoder().bytes().to_vec()
        }
        Err(_) => data.to_vec(),
    }
}
