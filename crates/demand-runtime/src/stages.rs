//! Per-stage entry points.
//!
//! Each function checks the artifact its stage consumes before doing any
//! work, runs inside an `info_span!` named after the stage and returns the
//! stage's summary.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use demand_core::persist::write_atomic;
use demand_core::settings::{AggregateConfig, CleanConfig, ForecastRequest, IngestConfig, TrainConfig};
use demand_core::{DemandError, Result};
use demand_data::aggregator::{aggregate_file, read_hourly, AggregateSummary};
use demand_data::cleaner::{clean_store, CleanSummary};
use demand_data::ingest::{ingest_csv, IngestSummary};
use demand_forecast::{evaluate, EvaluationReport, Forecast, ForecastModel, ModelConfig};
use tracing::{info, info_span};

/// Outcome of the training stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub points: usize,
    pub evaluation: EvaluationReport,
    pub history_start: NaiveDateTime,
    pub history_end: NaiveDateTime,
    pub model_path: PathBuf,
}

fn require(path: &Path, artifact: &str, producer: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(DemandError::missing(
            format!("{artifact} {}", path.display()),
            producer,
        ))
    }
}

// ── Stages ────────────────────────────────────────────────────────────────────

pub fn run_ingestion(cfg: &IngestConfig) -> Result<IngestSummary> {
    let _span = info_span!("ingest").entered();
    ingest_csv(cfg)
}

pub fn run_cleaning(cfg: &CleanConfig) -> Result<CleanSummary> {
    let _span = info_span!("clean").entered();
    require(&cfg.db, "trip store", "ingest")?;
    info!(db = %cfg.db.display(), table = %cfg.table, "cleaning stored trips");
    clean_store(cfg)
}

pub fn run_aggregation(cfg: &AggregateConfig) -> Result<AggregateSummary> {
    let _span = info_span!("aggregate").entered();
    require(&cfg.input, "cleaned dataset", "clean")?;
    info!(input = %cfg.input.display(), "aggregating demand by hour");
    aggregate_file(cfg)
}

/// Evaluate on a 90/10 chronological split, then refit on the whole series
/// and save the final model.
pub fn run_training(cfg: &TrainConfig) -> Result<TrainSummary> {
    let _span = info_span!("train").entered();
    require(&cfg.input, "hourly demand series", "aggregate")?;

    info!(input = %cfg.input.display(), "reading hourly demand data");
    let series = read_hourly(&cfg.input)?;
    let config = ModelConfig::default();

    info!("Evaluating model performance...");
    let evaluation = evaluate(&series, config)?;
    info!("--- Model Evaluation Results ---");
    info!("Mean Absolute Error (MAE):      {:.2} rides", evaluation.mae);
    info!("Root Mean Squared Error (RMSE): {:.2} rides", evaluation.rmse);
    info!("Mean Absolute Percentage Error (MAPE): {:.2}%", evaluation.mape);
    info!("R-squared (R²):                 {:.2}", evaluation.r2);
    info!("---------------------------------");

    info!(points = series.len(), "Training final model on all data...");
    let model = ForecastModel::fit(&series, config)?;
    model.save(&cfg.model)?;
    info!(
        model = %cfg.model.display(),
        sigma = model.sigma(),
        "Model training and saving complete."
    );

    Ok(TrainSummary {
        points: series.len(),
        evaluation,
        history_start: model.history_start(),
        history_end: model.history_end(),
        model_path: cfg.model.clone(),
    })
}

/// Load the saved model, forecast `req.periods` hours past its history and
/// write the CSV to `req.output`, or to stdout when no path is given.
pub fn run_forecast(req: &ForecastRequest) -> Result<Forecast> {
    let _span = info_span!("forecast").entered();
    if req.periods == 0 {
        return Err(DemandError::Config(
            "forecast horizon must be at least one period".to_string(),
        ));
    }
    require(&req.model, "model artifact", "train")?;

    let model = ForecastModel::load(&req.model)?;
    let timestamps = model.make_future_timestamps(req.periods, req.include_history);
    let forecast = model.predict(&timestamps);
    info!(
        periods = req.periods,
        rows = forecast.len(),
        from = %model.history_end(),
        "forecast produced"
    );

    match &req.output {
        Some(path) => {
            write_atomic(path, |w| forecast.write_csv(w))?;
            info!(output = %path.display(), "forecast saved");
        }
        None => {
            let mut out = std::io::stdout().lock();
            forecast.write_csv(&mut out)?;
            out.flush()?;
        }
    }
    Ok(forecast)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
