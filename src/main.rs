//! CLI entry point for the BMTC GTFS pipeline.
//!
//! Provides one subcommand per stage: scraping the transit API into raw
//! archives, building the GTFS feed, validating it, and analyzing route and
//! stop frequencies.

use anyhow::{Context, Result};
use bmtc_gtfs::{
    analyzers,
    config::Config,
    gtfs::builder::{self, BuildOptions},
    infra::bmtc::BmtcClient,
    output::{print_json, print_pretty},
    raw::RawStore,
    scrape::{ScrapeOptions, Scraper},
    validate::{self, ExternalValidator, Status},
};
use chrono::{NaiveDate, Utc, Weekday};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bmtc_gtfs")]
#[command(about = "Builds an unofficial GTFS feed for BMTC buses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch route lists, geometries, stop lists and timetables from the API
    Scrape {
        /// Directory for the raw archives
        #[arg(short, long, default_value = "raw")]
        raw_dir: PathBuf,

        /// Number of days of timetables to fetch
        #[arg(short, long, default_value_t = 7)]
        days: u32,

        /// Maximum number of concurrent requests
        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,

        /// Reuse entries already present in the raw archives
        #[arg(long, default_value_t = false)]
        resume: bool,

        /// Day timetables are counted from (defaults to today)
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },
    /// Turn the raw archives into a GTFS zip
    Build {
        #[arg(short, long, default_value = "raw")]
        raw_dir: PathBuf,

        /// Path of the GTFS zip to write
        #[arg(short, long, default_value = "gtfs/bmtc.zip")]
        output: PathBuf,

        /// Weekday whose timetables become the schedule
        #[arg(long, default_value = "monday")]
        service_day: Weekday,

        /// First day of service (defaults to today)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Last day of service (defaults to one year after the first)
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },
    /// Run the feed through the configured validators
    Validate {
        #[arg(short, long, default_value = "gtfs/bmtc.zip")]
        feed: PathBuf,

        /// Directory for validator output, logs and the report
        #[arg(short, long, default_value = "validation")]
        output_dir: PathBuf,
    },
    /// Write route, stop and aggregated-stop frequencies as GeoJSON and CSV
    Analyze {
        #[arg(short, long, default_value = "gtfs/bmtc.zip")]
        feed: PathBuf,

        #[arg(long, default_value = "geojson")]
        geojson_dir: PathBuf,

        #[arg(long, default_value = "csv")]
        csv_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bmtc_gtfs.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bmtc_gtfs.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let today = Utc::now().date_naive();

    match cli.command {
        Commands::Scrape {
            raw_dir,
            days,
            concurrency,
            resume,
            start_date,
        } => {
            let api = BmtcClient::from_config(&config.api)?;
            let options = ScrapeOptions {
                days,
                start_date: start_date.unwrap_or(today),
                concurrency,
                request_delay: config.api.request_delay,
                resume,
            };
            let stats = Scraper::new(api, RawStore::new(raw_dir), options)
                .run()
                .await?;
            info!(routes = stats.routes, "Scrape complete");
        }
        Commands::Build {
            raw_dir,
            output,
            service_day,
            start_date,
            end_date,
        } => {
            let mut options = BuildOptions::new(start_date.unwrap_or(today), config.feed);
            options.service_day = service_day;
            if let Some(end_date) = end_date {
                options.end_date = end_date;
            }
            if options.end_date < options.start_date {
                anyhow::bail!(
                    "service ends ({}) before it starts ({})",
                    options.end_date,
                    options.start_date
                );
            }
            let stats = builder::run(&raw_dir, &output, &options)
                .with_context(|| format!("build from {} failed", raw_dir.display()))?;
            info!(
                routes = stats.routes_included,
                trips = stats.trips,
                feed = %output.display(),
                "Build complete"
            );
        }
        Commands::Validate { feed, output_dir } => {
            let validators = ExternalValidator::defaults(&config.validators);
            let report = validate::run(&feed, &output_dir, &validators).await?;
            for validator in &report.validators {
                match validator.status {
                    Status::Passed | Status::Skipped => {
                        info!(validator = %validator.name, status = ?validator.status, "Validation result")
                    }
                    _ => warn!(validator = %validator.name, status = ?validator.status, "Validation result"),
                }
            }
            print_json(&report)?;
        }
        Commands::Analyze {
            feed,
            geojson_dir,
            csv_dir,
        } => {
            let summary = analyzers::run(&feed, &geojson_dir, &csv_dir)?;
            print_pretty(&summary);
        }
    }

    Ok(())
}
