//! Data layer of the ride-demand pipeline.
//!
//! Streams the raw trip CSV into SQLite, filters stored trips into the
//! cleaned dataset and counts them into a gap-free hourly series.

pub mod aggregator;
pub mod cleaner;
pub mod ingest;
pub mod reader;
pub mod store;

pub use demand_core as core;
