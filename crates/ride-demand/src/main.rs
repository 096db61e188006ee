mod bootstrap;

use std::process::ExitCode;

use anyhow::Result;
use demand_core::settings::{Command, Settings};
use demand_runtime::{
    run_aggregation, run_cleaning, run_forecast, run_ingestion, run_training, PipelineOrchestrator,
};

fn main() -> ExitCode {
    let settings = Settings::load();

    let subscriber = match bootstrap::build_subscriber(&settings.log_level, settings.log_file.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ride-demand: failed to set up logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    tracing::subscriber::with_default(subscriber, || match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    })
}

fn run(settings: &Settings) -> Result<()> {
    tracing::debug!("ride-demand v{} starting", env!("CARGO_PKG_VERSION"));

    match &settings.command {
        Command::Ingest(cfg) => {
            let summary = run_ingestion(cfg)?;
            tracing::info!(
                "Data ingestion complete: {} rows from {} chunks ({} skipped)",
                summary.rows_written,
                summary.chunks_written,
                summary.chunks_skipped
            );
        }
        Command::Clean(cfg) => {
            let summary = run_cleaning(cfg)?;
            tracing::info!(
                "Cleaning complete: kept {} of {} rows",
                summary.rows_written,
                summary.rows_read
            );
        }
        Command::Aggregate(cfg) => {
            let summary = run_aggregation(cfg)?;
            tracing::info!(
                "Feature engineering complete: {} hourly points from {} to {}",
                summary.hours,
                summary.start,
                summary.end
            );
        }
        Command::Train(cfg) => {
            let summary = run_training(cfg)?;
            tracing::info!("Evaluation: {}", summary.evaluation);
        }
        Command::Run(cfg) => {
            let mut orchestrator = PipelineOrchestrator::new(cfg.clone());
            orchestrator.run()?;
            tracing::info!("Pipeline complete; model saved to {}", cfg.model.display());
        }
        Command::Forecast(req) => {
            run_forecast(req)?;
        }
    }

    Ok(())
}
