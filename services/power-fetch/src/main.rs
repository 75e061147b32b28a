//! Command-line front end for the NASA POWER S3 client.
//!
//! Fetches a point time series and prints it as a table, JSON or CSV:
//!
//! ```text
//! power-fetch --lat 40.7128 --lon -74.0060 --start 2023-01-01 --end 2023-01-10 \
//!     --variables T2M,RH2M
//! ```

mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use power_s3::{
    infer_collection, ClientConfig, Frequency, PowerClient, PowerQuery, DEFAULT_COLLECTION,
};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "power-fetch")]
#[command(about = "Fetch NASA POWER point time series from S3 Zarr stores")]
struct Args {
    /// Latitude in degrees (-90 to 90)
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude in degrees (-180 to 180)
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Start date (YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]), inclusive
    #[arg(long)]
    start: String,

    /// End date (YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]), inclusive
    #[arg(long)]
    end: String,

    /// Comma-separated variable names (e.g. T2M,RH2M)
    #[arg(long, value_delimiter = ',', required = true)]
    variables: Vec<String>,

    /// Dataset frequency
    #[arg(long, default_value = "daily")]
    frequency: Frequency,

    /// Collection (default: inferred from the variables, else meteorology)
    #[arg(long, env = "POWER_COLLECTION")]
    collection: Option<String>,

    /// YAML file with bucket overrides
    #[arg(long, env = "POWER_BUCKETS_FILE")]
    buckets: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing (stderr, so stdout carries only the result)
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let collection = resolve_collection(args.collection.as_deref(), &args.variables);
    debug!(collection = %collection, "Using collection");

    let config = ClientConfig::from_env();
    let mut client = PowerClient::with_config(config).context("failed to create POWER client")?;

    if let Some(path) = &args.buckets {
        client
            .buckets_mut()
            .load_overrides(path)
            .with_context(|| format!("failed to load bucket overrides from {}", path.display()))?;
        info!(path = %path.display(), "Loaded bucket overrides");
    }

    let query = PowerQuery::parse_dates(args.lat, args.lon, &args.start, &args.end)?
        .variables(args.variables.iter().map(|v| v.trim().to_string()))
        .frequency(args.frequency)
        .collection(collection);

    let table = client.get_data(&query)?;

    print!("{}", output::render(&table, args.format)?);

    Ok(())
}

/// Explicit collection wins; otherwise use the variables' known collection.
fn resolve_collection(explicit: Option<&str>, variables: &[String]) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| infer_collection(variables).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_COLLECTION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_collection() {
        let solar = vec!["ALLSKY_SFC_SW_DWN".to_string()];
        let mixed = vec!["T2M".to_string(), "ALLSKY_KT".to_string()];
        let unknown = vec!["FOO".to_string()];

        assert_eq!(resolve_collection(None, &solar), "solar");
        assert_eq!(resolve_collection(Some("meteorology"), &solar), "meteorology");
        assert_eq!(resolve_collection(None, &mixed), "meteorology");
        assert_eq!(resolve_collection(None, &unknown), "meteorology");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "power-fetch",
            "--lat",
            "40.7128",
            "--lon",
            "-74.0060",
            "--start",
            "2023-01-01",
            "--end",
            "2023-01-10",
            "--variables",
            "T2M,RH2M",
            "--frequency",
            "monthly",
            "--format",
            "csv",
        ])
        .unwrap();
        assert_eq!(args.lon, -74.006);
        assert_eq!(args.variables, vec!["T2M", "RH2M"]);
        assert_eq!(args.frequency, Frequency::Monthly);
        assert_eq!(args.format, OutputFormat::Csv);
    }

    #[test]
    fn test_args_reject_bad_frequency() {
        let result = Args::try_parse_from([
            "power-fetch",
            "--lat",
            "0",
            "--lon",
            "0",
            "--start",
            "2023-01-01",
            "--end",
            "2023-01-02",
            "--variables",
            "T2M",
            "--frequency",
            "weekly",
        ]);
        assert!(result.is_err());
    }
}
