use thiserror::Error;

use crate::model::DeclinationOutcome;

/// Batch-level failures. Per-record problems never surface here; they become
/// [`DeclinationOutcome::Failure`] rows instead.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no input: enter at least one coordinate line")]
    NoInput,

    #[error("no valid coordinates to process")]
    NoValidCoordinates,

    /// Something escaped the per-record boundary. `partial` holds the
    /// outcomes gathered before it happened, in input order.
    #[error("batch calculation failed: {message}")]
    Aborted { message: String, partial: Vec<DeclinationOutcome> },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("exported data is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error(transparent)]
    Invalid(#[from] crate::validate::ValidationError),

    #[error("start year {from} is after end year {to}")]
    InvalidRange { from: i32, to: i32 },

    #[error("interval must be at least 1 year")]
    ZeroInterval,

    #[error("Failed to fetch data for any year in the selected range ({from}-{to})")]
    NoData { from: i32, to: i32 },
}
