use std::path::PathBuf;
use std::sync::OnceLock;

use clap::{Args, Parser, Subcommand};
use regex::Regex;

use crate::error::{DemandError, Result};

// ── Defaults ───────────────────────────────────────────────────────────────────

pub const DEFAULT_SOURCE_CSV: &str = "data/uber_data.csv";
pub const DEFAULT_DB_PATH: &str = "data/uber.db";
pub const DEFAULT_TABLE_NAME: &str = "uber_trips";
pub const DEFAULT_CLEANED_CSV: &str = "data/cleaned.csv";
pub const DEFAULT_HOURLY_CSV: &str = "data/demand_by_hour.csv";
pub const DEFAULT_MODEL_PATH: &str = "models/demand_model.json";
/// Rows read from the source per ingestion chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
/// One week of hourly periods.
pub const DEFAULT_FORECAST_PERIODS: usize = 168;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Batch pipeline turning raw trip records into an hourly ride-demand forecast
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ride-demand",
    about = "Batch pipeline turning raw trip records into an hourly ride-demand forecast",
    version
)]
pub struct Settings {
    #[command(subcommand)]
    pub command: Command,

    /// Logging level
    #[arg(long, global = true, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Append log output to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Stream the raw trip file into the structured store
    Ingest(IngestConfig),
    /// Validate and filter stored trips into the cleaned dataset
    Clean(CleanConfig),
    /// Count cleaned trips per hour into a gap-free demand series
    Aggregate(AggregateConfig),
    /// Evaluate the forecaster on a held-out suffix, then fit and save the final model
    Train(TrainConfig),
    /// Run ingest, clean, aggregate and train in order
    Run(PipelineConfig),
    /// Load a saved model and forecast future hourly demand
    Forecast(ForecastRequest),
}

// ── Stage configurations ───────────────────────────────────────────────────────

#[derive(Args, Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Raw trip CSV file
    #[arg(long, default_value = DEFAULT_SOURCE_CSV)]
    pub source: PathBuf,

    /// SQLite database file
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Destination table
    #[arg(long, default_value = DEFAULT_TABLE_NAME)]
    pub table: String,

    /// Rows per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct CleanConfig {
    /// SQLite database file
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Source table
    #[arg(long, default_value = DEFAULT_TABLE_NAME)]
    pub table: String,

    /// Cleaned CSV output
    #[arg(long, default_value = DEFAULT_CLEANED_CSV)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct AggregateConfig {
    /// Cleaned CSV input
    #[arg(long, default_value = DEFAULT_CLEANED_CSV)]
    pub input: PathBuf,

    /// Hourly demand CSV output
    #[arg(long, default_value = DEFAULT_HOURLY_CSV)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Hourly demand CSV input
    #[arg(long, default_value = DEFAULT_HOURLY_CSV)]
    pub input: PathBuf,

    /// Model artifact output
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,
}

/// Every path the four stages touch, for a single end-to-end run.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Raw trip CSV file
    #[arg(long, default_value = DEFAULT_SOURCE_CSV)]
    pub source: PathBuf,

    /// SQLite database file
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Trip table
    #[arg(long, default_value = DEFAULT_TABLE_NAME)]
    pub table: String,

    /// Rows per ingestion chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Cleaned CSV path
    #[arg(long, default_value = DEFAULT_CLEANED_CSV)]
    pub cleaned: PathBuf,

    /// Hourly demand CSV path
    #[arg(long, default_value = DEFAULT_HOURLY_CSV)]
    pub hourly: PathBuf,

    /// Model artifact path
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,
}

impl PipelineConfig {
    pub fn ingest(&self) -> IngestConfig {
        IngestConfig {
            source: self.source.clone(),
            db: self.db.clone(),
            table: self.table.clone(),
            chunk_size: self.chunk_size,
        }
    }

    pub fn clean(&self) -> CleanConfig {
        CleanConfig {
            db: self.db.clone(),
            table: self.table.clone(),
            output: self.cleaned.clone(),
        }
    }

    pub fn aggregate(&self) -> AggregateConfig {
        AggregateConfig {
            input: self.cleaned.clone(),
            output: self.hourly.clone(),
        }
    }

    pub fn train(&self) -> TrainConfig {
        TrainConfig {
            input: self.hourly.clone(),
            model: self.model.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    /// Model artifact to load
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Number of future hourly periods
    #[arg(long, default_value_t = DEFAULT_FORECAST_PERIODS)]
    pub periods: usize,

    /// Forecast CSV output (stdout when omitted)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Also predict over the fitted history
    #[arg(long)]
    pub include_history: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and apply `--debug`.
    pub fn load() -> Self {
        Self::load_from(std::env::args_os())
    }

    /// Same as [`Settings::load`] over an explicit argument list.
    pub fn load_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Validation ─────────────────────────────────────────────────────────────────

/// Reject table identifiers that are not plain SQL identifiers.
///
/// The name is interpolated into DDL, so only `[A-Za-z_][A-Za-z0-9_]*` is
/// accepted.
pub fn validate_table_name(name: &str) -> Result<()> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let re = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("regex is valid"));
    if re.is_match(name) {
        Ok(())
    } else {
        Err(DemandError::Config(format!(
            "invalid table name {name:?}: expected letters, digits and underscores"
        )))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
