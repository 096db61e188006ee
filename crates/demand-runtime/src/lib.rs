//! Runtime layer of the ride-demand pipeline.
//!
//! Wraps each stage with its prerequisite check and tracing span, and
//! sequences all four stages for a full run.

pub mod orchestrator;
pub mod stages;

pub use demand_core as core;
pub use demand_data as data;
pub use demand_forecast as forecast;
pub use orchestrator::{PipelineOrchestrator, PipelineReport, Stage, StageState};
pub use stages::{run_aggregation, run_cleaning, run_forecast, run_ingestion, run_training, TrainSummary};
