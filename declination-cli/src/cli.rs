use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use declination_core::{
    BatchExecutor, BatchRequestConfig, CancelFlag, Config, Declination, DeclinationOutcome,
    DeclinationSeries, ExportFormat, HistoryStore, Progress, SeriesRequest, fetch_series,
    parse_input, provider_from_config, validate,
};
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Conventional exit status after SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "declination", version, about = "Magnetic declination batch calculator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Csv,
    Tsv,
}

impl From<Format> for ExportFormat {
    fn from(value: Format) -> Self {
        match value {
            Format::Csv => ExportFormat::Csv,
            Format::Tsv => ExportFormat::Tsv,
        }
    }
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Coordinate list, one `lat, lng` or `name, lat, lng` per line. Reads stdin if absent or `-`.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Calculation date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Elevation above sea level in meters, applied to every location.
    #[arg(long, allow_negative_numbers = true)]
    elevation: Option<f64>,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Include the Name column.
    #[arg(long)]
    names: bool,

    /// Output file, or a directory to place a dated file in. Writes stdout if absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum calculator calls in flight; overrides the configured value.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Don't record the outcomes in the local history.
    #[arg(long)]
    no_history: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calculate declination for every location in a coordinate list.
    Batch(BatchArgs),

    /// Parse a coordinate list and report invalid lines without calling the calculator.
    Check {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Calculate declination for a single location.
    Point {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        /// Calculation date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Elevation above sea level in meters.
        #[arg(long, allow_negative_numbers = true)]
        elevation: Option<f64>,
    },

    /// Declination at one location for each year of the model window.
    Series {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        /// First year.
        #[arg(long, default_value_t = *validate::MODEL_YEARS.start())]
        from: i32,

        /// Last year.
        #[arg(long, default_value_t = *validate::MODEL_YEARS.end())]
        to: i32,

        /// Step between years.
        #[arg(long, default_value_t = 1)]
        interval: u32,

        /// Elevation above sea level in meters.
        #[arg(long, allow_negative_numbers = true)]
        elevation: Option<f64>,
    },

    /// Show or clear the local calculation history.
    History {
        #[arg(long)]
        clear: bool,

        #[arg(long, value_enum, default_value_t = Format::Tsv)]
        format: Format,
    },

    /// Configure the calculator endpoint and API key.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Batch(args) => run_batch(args).await,
            Command::Check { input } => run_check(input.as_deref()),
            Command::Point { latitude, longitude, date, elevation } => {
                run_point(latitude, longitude, date, elevation).await
            }
            Command::Series { latitude, longitude, from, to, interval, elevation } => {
                let request =
                    SeriesRequest::new(latitude, longitude, elevation, from, to, interval)?;
                run_series(&request).await
            }
            Command::History { clear, format } => run_history(clear, format),
            Command::Configure => run_configure(),
        }
    }
}

async fn run_batch(args: BatchArgs) -> Result<()> {
    let text = read_input(args.input.as_deref())?;
    let records = parse_input(&text)?;
    report_invalid(&records);

    let request_cfg = BatchRequestConfig::new(resolve_date(args.date), args.elevation)?;

    let config = Config::load()?;
    let provider = provider_from_config(&config)?;
    let concurrency = args.concurrency.unwrap_or(config.concurrency);

    let cancel = CancelFlag::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if let Some(code) = watch_interrupts(tokio::signal::ctrl_c, on_ctrl_c).await {
            std::process::exit(code);
        }
    });

    let report = BatchExecutor::new(provider.as_ref())
        .with_concurrency(concurrency)
        .with_cancel(cancel)
        .execute(&records, &request_cfg, print_progress)
        .await?;
    eprintln!();

    for outcome in &report.outcomes {
        if let Some(message) = outcome.error_message() {
            eprintln!(
                "  failed: {} ({}, {}): {message}",
                outcome.name().unwrap_or("-"),
                outcome.latitude(),
                outcome.longitude(),
            );
        }
    }
    eprintln!("{} succeeded, {} failed", report.succeeded(), report.failed());
    if report.cancelled {
        warn!(processed = report.outcomes.len(), "Batch cancelled, exporting partial results");
    }

    let format = ExportFormat::from(args.format);
    let table = format.render(&report.outcomes, args.names)?;
    write_output(args.output.as_deref(), format, &table)?;

    if !args.no_history {
        HistoryStore::open_default(config.history_limit)?.append(&report.outcomes)?;
    }

    Ok(())
}

fn run_check(input: Option<&Path>) -> Result<()> {
    let text = read_input(input)?;
    let records = parse_input(&text)?;

    for record in &records {
        let status = match record.error {
            Some(err) => err.to_string(),
            None => "ok".to_string(),
        };
        println!(
            "{:>4}  {:<24} {:>11} {:>12}  {status}",
            record.id + 1,
            record.name.as_deref().unwrap_or("-"),
            record.latitude,
            record.longitude,
        );
    }

    let valid = records.iter().filter(|r| r.is_valid()).count();
    println!("{valid} of {} lines valid", records.len());
    Ok(())
}

async fn run_point(
    latitude: f64,
    longitude: f64,
    date: Option<NaiveDate>,
    elevation: Option<f64>,
) -> Result<()> {
    validate::validate_coordinates(latitude, longitude)?;
    let request_cfg = BatchRequestConfig::new(resolve_date(date), elevation)?;

    let config = Config::load()?;
    let provider = provider_from_config(&config)?;

    let declination = provider.declination(&request_cfg.request_for(latitude, longitude)).await?;
    print!("{}", describe(&declination));

    HistoryStore::open_default(config.history_limit)?
        .append(&[DeclinationOutcome::Success { name: None, declination }])?;

    Ok(())
}

async fn run_series(request: &SeriesRequest) -> Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;

    let series = fetch_series(provider.as_ref(), request).await?;
    print!("{}", describe_series(&series));
    for (year, message) in &series.skipped {
        eprintln!("  skipped {year}: {message}");
    }

    Ok(())
}

fn run_history(clear: bool, format: Format) -> Result<()> {
    let config = Config::load()?;
    let store = HistoryStore::open_default(config.history_limit)?;

    if clear {
        store.clear()?;
        println!("History cleared ({})", store.path().display());
        return Ok(());
    }

    let entries = store.load()?;
    if entries.is_empty() {
        println!("No history yet");
        return Ok(());
    }

    print!("{}", ExportFormat::from(format).render(&entries, true)?);
    Ok(())
}

fn run_configure() -> Result<()> {
    let mut config = Config::load()?;

    config.endpoint = inquire::Text::new("Calculator endpoint:")
        .with_default(&config.endpoint)
        .prompt()?;

    let fallback = inquire::Text::new("Fallback (proxy) endpoint, empty for none:")
        .with_default(config.fallback_endpoint.as_deref().unwrap_or(""))
        .prompt()?;
    config.fallback_endpoint = Some(fallback.trim().to_string()).filter(|s| !s.is_empty());

    config.api_key =
        inquire::Text::new("API key:").with_default(&config.api_key).prompt()?;

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

/// First interrupt cancels the batch so partial results still get exported;
/// a second one returns the exit code to quit with immediately.
async fn watch_interrupts<F>(mut next_signal: impl FnMut() -> F, cancel: CancelFlag) -> Option<i32>
where
    F: Future<Output = io::Result<()>>,
{
    next_signal().await.ok()?;
    eprintln!("\nInterrupted, finishing the current location (Ctrl-C again to quit)...");
    cancel.cancel();

    next_signal().await.ok()?;
    eprintln!("\nInterrupted again, exiting");
    Some(INTERRUPTED_EXIT_CODE)
}

fn resolve_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => fs::read_to_string(p)
            .with_context(|| format!("Failed to read coordinate file: {}", p.display())),
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn report_invalid(records: &[declination_core::CoordinateRecord]) {
    let invalid: Vec<_> = records.iter().filter(|r| !r.is_valid()).collect();
    if invalid.is_empty() {
        info!(count = records.len(), "Parsed coordinates");
        return;
    }

    eprintln!("Skipping {} invalid line(s):", invalid.len());
    for record in invalid {
        if let Some(err) = record.error {
            eprintln!("  line {}: {err}", record.id + 1);
        }
    }
}

fn print_progress(progress: Progress) {
    eprint!(
        "\rCalculating... {:>3}% ({}/{})",
        progress.percent(),
        progress.completed,
        progress.total
    );
}

fn write_output(output: Option<&Path>, format: ExportFormat, table: &str) -> Result<()> {
    let Some(path) = output else {
        io::stdout().write_all(table.as_bytes()).context("Failed to write to stdout")?;
        return Ok(());
    };

    let path = if path.is_dir() {
        path.join(format.default_file_name(Local::now().date_naive()))
    } else {
        path.to_path_buf()
    };

    fs::write(&path, table)
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    eprintln!("Results written to {}", path.display());
    Ok(())
}

fn describe(d: &Declination) -> String {
    let mut out = String::new();
    out.push_str(&format!("Location:      {:.4}°, {:.4}°\n", d.latitude, d.longitude));
    out.push_str(&format!("Elevation:     {} m\n", d.elevation));
    out.push_str(&format!("Date:          {}\n", d.date));
    out.push_str(&format!("Declination:   {}\n", signed_bearing(d.declination_deg)));
    out.push_str(&format!(
        "Annual change: {} per year\n",
        signed_bearing(d.annual_change_deg_per_year)
    ));
    out.push_str(&format!("Model:         {}\n", d.model));
    if let Some(incl) = d.components.inclination_deg {
        out.push_str(&format!("Inclination:   {incl:.2}°\n"));
    }
    if let Some(total) = d.components.total_intensity_nt {
        out.push_str(&format!("Total field:   {total:.1} nT\n"));
    }
    out
}

fn describe_series(series: &DeclinationSeries) -> String {
    let mut out = String::new();
    for point in &series.points {
        out.push_str(&format!("{}  {}\n", point.year, signed_bearing(point.declination_deg)));
    }

    let stats = &series.stats;
    out.push_str(&format!("Min:           {}\n", signed_bearing(stats.min_deg)));
    out.push_str(&format!("Max:           {}\n", signed_bearing(stats.max_deg)));
    out.push_str(&format!("Average:       {}\n", signed_bearing(stats.average_deg)));
    out.push_str(&format!("Total change:  {:+.2}°\n", stats.total_change_deg));
    out.push_str(&format!("Per year:      {:+.3}°\n", stats.change_per_year_deg));
    out
}

/// `7.71° E` for positive angles, `3.20° W` for negative ones.
fn signed_bearing(deg: f64) -> String {
    let dir = if deg < 0.0 { 'W' } else { 'E' };
    format!("{:.2}° {dir}", deg.abs())
}
