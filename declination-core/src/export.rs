//! Tabular export of batch outcomes.
//!
//! Header: `[Name,]Latitude,Longitude,Elevation,Date,Declination,Annual Change,Model`.
//!
//! Failed rows are always written. Both formats mark them the same way:
//! `ERROR` in the Declination and Annual Change columns and an empty Model,
//! so a real 0° declination can't be mistaken for a failure.

use chrono::NaiveDate;
use csv::{QuoteStyle, WriterBuilder};

use crate::{error::ExportError, model::DeclinationOutcome};

pub const FAILURE_MARKER: &str = "ERROR";

const COLUMNS: [&str; 7] =
    ["Latitude", "Longitude", "Elevation", "Date", "Declination", "Annual Change", "Model"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
}

impl ExportFormat {
    pub fn render(
        &self,
        outcomes: &[DeclinationOutcome],
        include_names: bool,
    ) -> Result<String, ExportError> {
        match self {
            ExportFormat::Csv => to_csv(outcomes, include_names),
            ExportFormat::Tsv => to_tab_separated(outcomes, include_names),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
        }
    }

    /// e.g. `declination_batch_2025-06-01.csv`
    pub fn default_file_name(&self, today: NaiveDate) -> String {
        format!("declination_batch_{}.{}", today.format("%Y-%m-%d"), self.extension())
    }
}

/// Comma-separated. The Name field is always double-quoted, with embedded
/// quotes doubled; the other fields are numbers, dates and model codes and are
/// written bare.
pub fn to_csv(outcomes: &[DeclinationOutcome], include_names: bool) -> Result<String, ExportError> {
    let mut builder = WriterBuilder::new();
    builder.quote_style(QuoteStyle::Never);
    write_table(&builder, outcomes, include_names, quoted)
}

/// Tab-separated for pasting into spreadsheets. Nothing is quoted or escaped.
pub fn to_tab_separated(
    outcomes: &[DeclinationOutcome],
    include_names: bool,
) -> Result<String, ExportError> {
    let mut builder = WriterBuilder::new();
    builder.delimiter(b'\t').quote_style(QuoteStyle::Never);
    write_table(&builder, outcomes, include_names, str::to_string)
}

fn write_table(
    builder: &WriterBuilder,
    outcomes: &[DeclinationOutcome],
    include_names: bool,
    name_field: fn(&str) -> String,
) -> Result<String, ExportError> {
    let mut wtr = builder.from_writer(Vec::new());

    let mut header: Vec<&str> = Vec::with_capacity(COLUMNS.len() + 1);
    if include_names {
        header.push("Name");
    }
    header.extend(COLUMNS);
    wtr.write_record(&header)?;

    for outcome in outcomes {
        wtr.write_record(row(outcome, include_names.then_some(name_field)))?;
    }

    let bytes = wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn row(outcome: &DeclinationOutcome, name_field: Option<fn(&str) -> String>) -> Vec<String> {
    let mut fields = Vec::with_capacity(COLUMNS.len() + 1);
    if let Some(name_field) = name_field {
        fields.push(name_field(outcome.name().unwrap_or_default()));
    }

    fields.push(outcome.latitude().to_string());
    fields.push(outcome.longitude().to_string());
    fields.push(outcome.elevation().to_string());
    fields.push(outcome.date().format("%Y-%m-%d").to_string());

    match outcome {
        DeclinationOutcome::Success { declination, .. } => {
            fields.push(declination.declination_deg.to_string());
            fields.push(declination.annual_change_deg_per_year.to_string());
            fields.push(declination.model.clone());
        }
        DeclinationOutcome::Failure { .. } => {
            fields.push(FAILURE_MARKER.to_string());
            fields.push(FAILURE_MARKER.to_string());
            fields.push(String::new());
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Declination, FieldComponents};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
    }

    fn success(name: Option<&str>, lat: f64, lng: f64, decl: f64) -> DeclinationOutcome {
        DeclinationOutcome::Success {
            name: name.map(str::to_string),
            declination: Declination {
                latitude: lat,
                longitude: lng,
                elevation: 0.0,
                date: date(),
                declination_deg: decl,
                annual_change_deg_per_year: -0.12,
                model: "WMMHR".into(),
                components: FieldComponents::default(),
            },
        }
    }

    fn failure(name: Option<&str>, lat: f64, lng: f64) -> DeclinationOutcome {
        DeclinationOutcome::Failure {
            name: name.map(str::to_string),
            latitude: lat,
            longitude: lng,
            elevation: 0.0,
            date: date(),
            error_message: "Network timeout".into(),
        }
    }

    #[test]
    fn csv_with_names_has_header_and_one_row_per_outcome() {
        let outcomes =
            vec![success(Some("London"), 51.5074, -0.1278, 1.2), success(None, 40.7128, -74.006, -12.9)];

        let csv = to_csv(&outcomes, true).expect("csv");
        let lines: Vec<&str> = csv.lines().collect();

        assert!(lines[0].starts_with("Name,Latitude,Longitude,"));
        assert_eq!(lines[0], "Name,Latitude,Longitude,Elevation,Date,Declination,Annual Change,Model");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "\"London\",51.5074,-0.1278,0,2025-06-01,1.2,-0.12,WMMHR");
        assert_eq!(lines[2], "\"\",40.7128,-74.006,0,2025-06-01,-12.9,-0.12,WMMHR");
    }

    #[test]
    fn csv_without_names_omits_name_column() {
        let csv = to_csv(&[success(Some("ignored"), 1.0, 2.0, 3.0)], false).expect("csv");
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Latitude,Longitude,Elevation,Date,Declination,Annual Change,Model");
        assert_eq!(lines[1], "1,2,0,2025-06-01,3,-0.12,WMMHR");
    }

    #[test]
    fn failed_rows_are_kept_and_marked() {
        let outcomes = vec![
            success(None, 1.0, 1.0, 0.0),
            failure(Some("Unreachable"), 2.0, 2.0),
            success(None, 3.0, 3.0, 4.5),
        ];

        let csv = to_csv(&outcomes, true).expect("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "\"\",1,1,0,2025-06-01,0,-0.12,WMMHR");
        assert_eq!(lines[2], "\"Unreachable\",2,2,0,2025-06-01,ERROR,ERROR,");

        let tsv = to_tab_separated(&outcomes, false).expect("tsv");
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "2\t2\t0\t2025-06-01\tERROR\tERROR\t");
    }

    #[test]
    fn csv_quotes_names_with_commas() {
        let csv = to_csv(&[success(Some("Paris, France"), 48.85, 2.35, 1.0)], true).expect("csv");
        let row = csv.lines().nth(1).expect("data row");
        assert!(row.starts_with("\"Paris, France\",48.85,2.35,"));
    }

    #[test]
    fn csv_always_quotes_names_and_doubles_inner_quotes() {
        let outcomes = [
            success(Some("Oslo"), 59.91, 10.75, 2.0),
            failure(Some("Fort \"Alpha\""), 1.0, 1.0),
        ];
        let csv = to_csv(&outcomes, true).expect("csv");
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Name,Latitude,Longitude,Elevation,Date,Declination,Annual Change,Model");
        assert_eq!(lines[1], "\"Oslo\",59.91,10.75,0,2025-06-01,2,-0.12,WMMHR");
        assert_eq!(lines[2], "\"Fort \"\"Alpha\"\"\",1,1,0,2025-06-01,ERROR,ERROR,");

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let names: Vec<String> = reader
            .records()
            .map(|r| r.expect("record")[0].to_string())
            .collect();
        assert_eq!(names, ["Oslo", "Fort \"Alpha\""]);
    }

    #[test]
    fn tsv_never_quotes() {
        let outcomes = [success(Some("Paris, \"Rive Gauche\""), 48.85, 2.35, 1.0)];
        let tsv = to_tab_separated(&outcomes, true).expect("tsv");
        let lines: Vec<&str> = tsv.lines().collect();

        assert_eq!(lines[0], "Name\tLatitude\tLongitude\tElevation\tDate\tDeclination\tAnnual Change\tModel");
        assert_eq!(lines[1], "Paris, \"Rive Gauche\"\t48.85\t2.35\t0\t2025-06-01\t1\t-0.12\tWMMHR");
    }

    #[test]
    fn default_file_name_uses_date_and_extension() {
        assert_eq!(ExportFormat::Csv.default_file_name(date()), "declination_batch_2025-06-01.csv");
        assert_eq!(ExportFormat::Tsv.default_file_name(date()), "declination_batch_2025-06-01.tsv");
    }
}
