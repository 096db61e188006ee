//! Shared building blocks for the ride-demand pipeline.
//!
//! Holds the trip and demand data model, the error taxonomy, CLI settings,
//! timestamp helpers, the geographic bounding box, and atomic file output.

pub mod error;
pub mod geo;
pub mod models;
pub mod persist;
pub mod settings;
pub mod time_utils;

pub use error::{DemandError, Result};
