//! Forecasting layer of the ride-demand pipeline.
//!
//! Fits an additive trend + weekly + daily seasonality model to the hourly
//! demand series, scores it on a chronological hold-out and persists the
//! final fit as a JSON artifact.

pub mod evaluation;
pub mod linalg;
pub mod metrics;
pub mod model;

pub use demand_core as core;
pub use evaluation::{chronological_split, evaluate, TRAIN_FRACTION};
pub use metrics::EvaluationReport;
pub use model::{Forecast, ForecastModel, ForecastPoint, ModelConfig};
