use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::validate::{self, ValidationError};

/// Why a parsed coordinate line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateError {
    InvalidFormat,
    LatitudeOutOfRange,
    LongitudeOutOfRange,
}

impl CoordinateError {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateError::InvalidFormat => "invalid format",
            CoordinateError::LatitudeOutOfRange => "latitude out of range",
            CoordinateError::LongitudeOutOfRange => "longitude out of range",
        }
    }
}

impl std::fmt::Display for CoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of batch input after parsing.
///
/// A record is valid exactly when `error` is `None`; in that case both
/// coordinates are finite and within range.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRecord {
    /// Zero-based line position in the input.
    pub id: usize,
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub error: Option<CoordinateError>,
}

impl CoordinateRecord {
    /// No parse error and both coordinates in range. The range is checked
    /// again so hand-built records can't slip past.
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && validate::validate_coordinates(self.latitude, self.longitude).is_ok()
    }
}

/// Parameters shared by every record of one batch run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchRequestConfig {
    date: NaiveDate,
    elevation: Option<f64>,
}

impl BatchRequestConfig {
    pub fn new(date: NaiveDate, elevation: Option<f64>) -> Result<Self, ValidationError> {
        validate::validate_date(date)?;
        if let Some(meters) = elevation {
            validate::validate_elevation(meters)?;
        }

        Ok(Self { date, elevation })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn elevation(&self) -> Option<f64> {
        self.elevation
    }

    pub fn request_for(&self, latitude: f64, longitude: f64) -> DeclinationRequest {
        DeclinationRequest { latitude, longitude, elevation: self.elevation, date: self.date }
    }
}

/// A single-point query sent to a [`crate::DeclinationProvider`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeclinationRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level.
    pub elevation: Option<f64>,
    pub date: NaiveDate,
}

/// Additional field components some endpoints report alongside declination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldComponents {
    pub inclination_deg: Option<f64>,
    pub total_intensity_nt: Option<f64>,
    pub horizontal_intensity_nt: Option<f64>,
    pub north_component_nt: Option<f64>,
    pub east_component_nt: Option<f64>,
    pub vertical_component_nt: Option<f64>,
}

/// Successful answer from the declination endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declination {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub date: NaiveDate,
    /// Positive is east.
    pub declination_deg: f64,
    /// Secular variation; positive drifts eastward.
    pub annual_change_deg_per_year: f64,
    pub model: String,
    #[serde(default)]
    pub components: FieldComponents,
}

/// Result for one valid record of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeclinationOutcome {
    Success {
        name: Option<String>,
        #[serde(flatten)]
        declination: Declination,
    },
    Failure {
        name: Option<String>,
        latitude: f64,
        longitude: f64,
        elevation: f64,
        date: NaiveDate,
        error_message: String,
    },
}

impl DeclinationOutcome {
    pub fn failure(
        record: &CoordinateRecord,
        config: &BatchRequestConfig,
        error_message: impl Into<String>,
    ) -> Self {
        DeclinationOutcome::Failure {
            name: record.name.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            elevation: config.elevation().unwrap_or(0.0),
            date: config.date(),
            error_message: error_message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeclinationOutcome::Success { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            DeclinationOutcome::Success { name, .. } | DeclinationOutcome::Failure { name, .. } => {
                name.as_deref()
            }
        }
    }

    pub fn latitude(&self) -> f64 {
        match self {
            DeclinationOutcome::Success { declination, .. } => declination.latitude,
            DeclinationOutcome::Failure { latitude, .. } => *latitude,
        }
    }

    pub fn longitude(&self) -> f64 {
        match self {
            DeclinationOutcome::Success { declination, .. } => declination.longitude,
            DeclinationOutcome::Failure { longitude, .. } => *longitude,
        }
    }

    pub fn elevation(&self) -> f64 {
        match self {
            DeclinationOutcome::Success { declination, .. } => declination.elevation,
            DeclinationOutcome::Failure { elevation, .. } => *elevation,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            DeclinationOutcome::Success { declination, .. } => declination.date,
            DeclinationOutcome::Failure { date, .. } => *date,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            DeclinationOutcome::Success { .. } => None,
            DeclinationOutcome::Failure { error_message, .. } => Some(error_message),
        }
    }
}
