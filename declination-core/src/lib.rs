//! Core library for the `declination` CLI.
//!
//! This crate defines:
//! - Parsing of free-text coordinate lists
//! - The batch pipeline over a remote declination calculator
//! - CSV / tab-separated export of batch outcomes
//! - Year-by-year declination series for one location
//! - Configuration and the local history file
//!
//! It is used by `declination-cli`, but the pipeline is plain library code and
//! can be driven by any front end.

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod model;
pub mod parse;
pub mod provider;
pub mod series;
pub mod validate;

pub use batch::{BatchExecutor, BatchReport, CancelFlag, Progress, run};
pub use config::Config;
pub use error::{BatchError, ExportError, SeriesError};
pub use export::{ExportFormat, to_csv, to_tab_separated};
pub use history::HistoryStore;
pub use model::{
    BatchRequestConfig, CoordinateError, CoordinateRecord, Declination, DeclinationOutcome,
    DeclinationRequest, FieldComponents,
};
pub use parse::{parse, parse_input};
pub use provider::{DeclinationProvider, provider_from_config};
pub use series::{DeclinationSeries, SeriesPoint, SeriesRequest, SeriesStats, fetch_series};
pub use validate::ValidationError;
