//! Range checks for inputs accepted by the declination model.

use chrono::{Datelike, NaiveDate};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Years covered by the WMMHR model release.
pub const MODEL_YEARS: RangeInclusive<i32> = 2024..=2029;

pub const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;

/// Meters, from the deepest ocean trench to the upper thermosphere.
pub const ELEVATION_RANGE_M: RangeInclusive<f64> = -11_000.0..=85_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Coordinates must be valid numbers")]
    NotANumber,

    #[error("Latitude must be between -90° and 90° (got {0})")]
    LatitudeOutOfRange(f64),

    #[error("Longitude must be between -180° and 180° (got {0})")]
    LongitudeOutOfRange(f64),

    #[error("Elevation must be between -11,000m and 85,000m (got {0})")]
    ElevationOutOfRange(f64),

    #[error("Date must be between 2024 and 2029 (WMMHR model validity period), got year {year}")]
    DateOutOfRange { year: i32 },
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(ValidationError::NotANumber);
    }
    if !LATITUDE_RANGE.contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude));
    }
    if !LONGITUDE_RANGE.contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude));
    }
    Ok(())
}

pub fn validate_elevation(meters: f64) -> Result<(), ValidationError> {
    if !meters.is_finite() {
        return Err(ValidationError::NotANumber);
    }
    if !ELEVATION_RANGE_M.contains(&meters) {
        return Err(ValidationError::ElevationOutOfRange(meters));
    }
    Ok(())
}

pub fn validate_date(date: NaiveDate) -> Result<(), ValidationError> {
    let year = date.year();
    if !MODEL_YEARS.contains(&year) {
        return Err(ValidationError::DateOutOfRange { year });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_checked_latitude_first() {
        assert_eq!(validate_coordinates(45.0, 90.0), Ok(()));
        assert_eq!(
            validate_coordinates(95.0, 200.0),
            Err(ValidationError::LatitudeOutOfRange(95.0))
        );
        assert_eq!(
            validate_coordinates(45.0, -180.5),
            Err(ValidationError::LongitudeOutOfRange(-180.5))
        );
        assert_eq!(validate_coordinates(f64::NAN, 0.0), Err(ValidationError::NotANumber));
    }

    #[test]
    fn elevation_bounds_are_inclusive() {
        assert!(validate_elevation(-11_000.0).is_ok());
        assert!(validate_elevation(85_000.0).is_ok());
        assert!(validate_elevation(-11_000.1).is_err());
        assert_eq!(validate_elevation(f64::INFINITY), Err(ValidationError::NotANumber));
    }

    #[test]
    fn date_error_mentions_model_window() {
        let date = NaiveDate::from_ymd_opt(2031, 5, 5).expect("valid date");
        let err = validate_date(date).unwrap_err();
        assert!(err.to_string().contains("between 2024 and 2029"));
    }
}
