//! Server-side photo processing stages: validation, format normalization,
//! adaptive compression, and EXIF metadata sanitization.
//!
//! Stages are pure functions over byte buffers so they can be driven from the
//! API pipeline (inside `spawn_blocking`) and tested without any I/O.

pub mod compressor;
pub mod exif;
mod jpeg;
pub mod normalizer;
pub mod strip;
pub mod validator;

pub use compressor::{compress, CompressionOutcome};
pub use exif::{extract_and_sanitize, sanitize_raw, strip_html};
pub use normalizer::{normalize, ConversionError, NormalizedImage};
pub use strip::strip_embedded_metadata;
pub use validator::{PhotoValidator, ValidationError};
