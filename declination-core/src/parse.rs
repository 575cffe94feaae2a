//! Free-text coordinate input.
//!
//! One location per line, either `lat, lng` or `name, lat, lng`:
//!
//! ```text
//! 40.7128, -74.0060
//! London, 51.5074, -0.1278
//! ```

use crate::{
    error::BatchError,
    model::{CoordinateError, CoordinateRecord},
    validate::{LATITUDE_RANGE, LONGITUDE_RANGE},
};

/// Parse every line of `text` into a record. Never fails; bad lines come back
/// as invalid records carrying a [`CoordinateError`].
pub fn parse(text: &str) -> Vec<CoordinateRecord> {
    text.trim().lines().enumerate().map(|(id, line)| parse_line(id, line)).collect()
}

/// Like [`parse`], but treats blank input as a caller error.
pub fn parse_input(text: &str) -> Result<Vec<CoordinateRecord>, BatchError> {
    if text.trim().is_empty() {
        return Err(BatchError::NoInput);
    }
    Ok(parse(text))
}

fn parse_line(id: usize, line: &str) -> CoordinateRecord {
    let parts: Vec<&str> = line.trim().split(',').map(str::trim).collect();

    let (name, lat, lng) = match parts.as_slice() {
        [lat, lng] => (None, *lat, *lng),
        [name, lat, lng] => (Some((*name).to_string()), *lat, *lng),
        _ => return invalid_format(id, None),
    };

    let (Some(latitude), Some(longitude)) = (parse_number(lat), parse_number(lng)) else {
        return invalid_format(id, name);
    };

    let error = if !LATITUDE_RANGE.contains(&latitude) {
        Some(CoordinateError::LatitudeOutOfRange)
    } else if !LONGITUDE_RANGE.contains(&longitude) {
        Some(CoordinateError::LongitudeOutOfRange)
    } else {
        None
    };

    CoordinateRecord { id, name, latitude, longitude, error }
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn invalid_format(id: usize, name: Option<String>) -> CoordinateRecord {
    CoordinateRecord {
        id,
        name,
        latitude: 0.0,
        longitude: 0.0,
        error: Some(CoordinateError::InvalidFormat),
    }
}
