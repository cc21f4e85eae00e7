use serde::{Deserialize, Serialize};

/// Photo metadata after sanitization.
///
/// Invariants enforced by the sanitizer in `wayfarer-processing`:
/// - no string field contains markup
/// - every numeric field passed a runtime finite-number check
/// - `has_gps` is true only if both coordinates passed their numeric check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedMetadata {
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    pub has_gps: bool,
    /// Original capture timestamp, ISO 8601.
    pub captured_at: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub iso: Option<u32>,
    pub orientation: Option<u8>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub exposure_mode: Option<String>,
    pub white_balance: Option<String>,
    pub flash: Option<String>,
    pub color_space: Option<String>,
}

impl SanitizedMetadata {
    /// True when no field carries a value. Used by the API layer to emit
    /// `metadata: null` instead of an all-null object.
    pub fn is_empty(&self) -> bool {
        self == &SanitizedMetadata::default()
    }
}
