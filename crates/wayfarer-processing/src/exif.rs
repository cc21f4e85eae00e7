//! EXIF extraction and sanitization.
//!
//! The sanitizer always operates on the *original* (pre-normalization) bytes
//! or on the raw client-supplied metadata JSON, since conversion may strip or
//! alter embedded tags. Every numeric field must pass a runtime finite-number
//! check before it is accepted; every string field goes through the
//! HTML-stripping sanitizer. Failures null the field, never the pipeline.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ::exif::{In, Tag};
use std::io::Cursor;

use wayfarer_core::models::SanitizedMetadata;

/// Remove all HTML tags and attributes from a string.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Read the original capture timestamp from embedded EXIF, if present.
pub fn capture_timestamp(data: &[u8]) -> Option<DateTime<Utc>> {
    let exif = read_exif(data)?;
    extract_datetime(&exif)
}

/// Read the EXIF orientation tag (1-8), if present.
pub fn orientation(data: &[u8]) -> Option<u8> {
    let exif = read_exif(data)?;
    let value = exif
        .get_field(Tag::Orientation, In::PRIMARY)?
        .value
        .get_uint(0)?;
    if (1..=8).contains(&value) {
        Some(value as u8)
    } else {
        None
    }
}

/// Extract metadata from the original image bytes and sanitize it.
///
/// Missing or unreadable EXIF yields an empty (all-null) result rather than
/// an error.
pub fn extract_and_sanitize(data: &[u8]) -> SanitizedMetadata {
    let Some(exif) = read_exif(data) else {
        return SanitizedMetadata::default();
    };

    let gps_latitude = gps_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef);
    let gps_longitude = gps_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef);

    SanitizedMetadata {
        has_gps: gps_latitude.is_some() && gps_longitude.is_some(),
        gps_latitude,
        gps_longitude,
        gps_altitude: gps_altitude(&exif),
        captured_at: extract_datetime(&exif).map(|dt| dt.to_rfc3339()),
        camera_make: string_field(&exif, Tag::Make),
        camera_model: string_field(&exif, Tag::Model),
        lens_model: string_field(&exif, Tag::LensModel),
        iso: exif
            .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0)),
        orientation: orientation(data),
        focal_length: string_field(&exif, Tag::FocalLength),
        aperture: string_field(&exif, Tag::FNumber),
        shutter_speed: string_field(&exif, Tag::ExposureTime),
        exposure_mode: string_field(&exif, Tag::ExposureMode),
        white_balance: string_field(&exif, Tag::WhiteBalance),
        flash: string_field(&exif, Tag::Flash),
        color_space: string_field(&exif, Tag::ColorSpace),
    }
}

/// Sanitize raw EXIF-derived fields supplied by the client as JSON.
///
/// Numeric fields are accepted only when the JSON value is an actual finite
/// number (a string holding digits is rejected); string fields are
/// HTML-stripped. Unknown keys are ignored.
pub fn sanitize_raw(raw: &serde_json::Value) -> SanitizedMetadata {
    let gps_latitude = finite_number(raw, "gpsLatitude");
    let gps_longitude = finite_number(raw, "gpsLongitude");

    SanitizedMetadata {
        has_gps: gps_latitude.is_some() && gps_longitude.is_some(),
        gps_latitude,
        gps_longitude,
        gps_altitude: finite_number(raw, "gpsAltitude"),
        captured_at: raw
            .get("capturedAt")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp),
        camera_make: clean_string(raw, "cameraMake"),
        camera_model: clean_string(raw, "cameraModel"),
        lens_model: clean_string(raw, "lensModel"),
        iso: raw
            .get("iso")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok()),
        orientation: raw
            .get("orientation")
            .and_then(|v| v.as_u64())
            .filter(|v| (1..=8).contains(v))
            .map(|v| v as u8),
        focal_length: clean_string(raw, "focalLength"),
        aperture: clean_string(raw, "aperture"),
        shutter_speed: clean_string(raw, "shutterSpeed"),
        exposure_mode: clean_string(raw, "exposureMode"),
        white_balance: clean_string(raw, "whiteBalance"),
        flash: clean_string(raw, "flash"),
        color_space: clean_string(raw, "colorSpace"),
    }
}

fn finite_number(raw: &serde_json::Value, key: &str) -> Option<f64> {
    raw.get(key)?.as_f64().filter(|f| f.is_finite())
}

fn clean_string(raw: &serde_json::Value, key: &str) -> Option<String> {
    let cleaned = strip_html(raw.get(key)?.as_str()?);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Accept RFC 3339 directly, or the EXIF `YYYY:MM:DD HH:MM:SS` form.
fn parse_timestamp(s: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).to_rfc3339());
    }
    parse_exif_datetime(s).map(|dt| dt.to_rfc3339())
}

fn read_exif(data: &[u8]) -> Option<exif::Exif> {
    let mut reader = exif::Reader::new();
    reader.continue_on_error(true);
    let mut cursor = Cursor::new(data);
    reader
        .read_from_container(&mut cursor)
        .or_else(|e| e.distill_partial_result(|_| {}))
        .ok()
}

/// Prefer DateTimeOriginal > DateTimeDigitized > DateTime.
fn extract_datetime(exif: &exif::Exif) -> Option<DateTime<Utc>> {
    let datetime_tags = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];
    for tag in &datetime_tags {
        if let Some(field) = exif.get_field(*tag, In::PRIMARY) {
            if let Some(dt) = parse_exif_datetime(&field.display_value().to_string()) {
                return Some(dt);
            }
        }
    }
    None
}

/// Parse EXIF datetime string (format: "YYYY:MM:DD HH:MM:SS" or already
/// hyphenated by the library's display form).
fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    let normalized: String = {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 2 {
            return None;
        }
        format!("{} {}", parts[0].replace(':', "-"), parts[1])
    };
    let naive = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

fn gps_coordinate(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let coord_field = exif.get_field(coord_tag, In::PRIMARY)?;
    let ref_field = exif.get_field(ref_tag, In::PRIMARY)?;

    let rationals = match &coord_field.value {
        exif::Value::Rational(r) => r,
        _ => return None,
    };
    // GPS coordinates are stored as [degrees, minutes, seconds]
    if rationals.len() < 3 {
        return None;
    }

    let degrees = rationals[0].to_f64();
    let minutes = rationals[1].to_f64();
    let seconds = rationals[2].to_f64();

    let mut decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    if !decimal.is_finite() {
        return None;
    }

    let ref_str = ref_field.display_value().to_string();
    if ref_str == "S" || ref_str == "W" {
        decimal = -decimal;
    }

    Some(decimal)
}

fn gps_altitude(exif: &exif::Exif) -> Option<f64> {
    let alt_field = exif.get_field(Tag::GPSAltitude, In::PRIMARY)?;

    let mut altitude = match &alt_field.value {
        exif::Value::Rational(r) if !r.is_empty() => r[0].to_f64(),
        _ => return None,
    };
    if !altitude.is_finite() {
        return None;
    }

    // 1 = below sea level
    if let Some(ref_field) = exif.get_field(Tag::GPSAltitudeRef, In::PRIMARY) {
        if ref_field.value.get_uint(0) == Some(1) {
            altitude = -altitude;
        }
    }

    Some(altitude)
}

fn string_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let value = strip_html(field.display_value().to_string().trim_matches('"'));
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
