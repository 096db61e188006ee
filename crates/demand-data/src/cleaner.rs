//! Validity filtering of stored trips into the cleaned dataset.
//!
//! Every predicate is a pure `Vec → Vec` step. [`clean_records`] runs them
//! in a fixed order and records how many rows each one removed.

use std::fs::File;
use std::path::Path;

use demand_core::geo::{BoundingBox, NYC_BOUNDS};
use demand_core::models::{CleanedTripRecord, RawTripRecord, TripRecord};
use demand_core::persist::write_atomic;
use demand_core::settings::CleanConfig;
use demand_core::{DemandError, Result};
use tracing::{debug, info};

use crate::store::TripStore;

/// Durations must be strictly greater than this many seconds.
pub const MIN_TRIP_SECONDS: i64 = 60;
/// Durations must be strictly less than this many seconds.
pub const MAX_TRIP_SECONDS: i64 = 5400;

// ── Summaries ─────────────────────────────────────────────────────────────────

/// Row counts around one filtering step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStep {
    pub name: &'static str,
    pub before: usize,
    pub after: usize,
}

impl FilterStep {
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub steps: Vec<FilterStep>,
}

// ── Predicates ────────────────────────────────────────────────────────────────

/// Drop every record with at least one null field.
pub fn drop_incomplete(records: Vec<RawTripRecord>) -> Vec<TripRecord> {
    records.iter().filter_map(RawTripRecord::complete).collect()
}

/// Keep trips carrying at least one passenger.
pub fn filter_passengers(records: Vec<TripRecord>) -> Vec<TripRecord> {
    records.into_iter().filter(|r| r.passenger_count > 0).collect()
}

/// Keep trips whose pickup and dropoff both lie inside `bounds`.
pub fn filter_bounds(records: Vec<TripRecord>, bounds: &BoundingBox) -> Vec<TripRecord> {
    records.into_iter().filter(|r| r.within(bounds)).collect()
}

/// Keep trips with `MIN_TRIP_SECONDS < duration < MAX_TRIP_SECONDS`.
pub fn filter_duration(records: Vec<TripRecord>) -> Vec<TripRecord> {
    records
        .into_iter()
        .filter(|r| r.trip_duration > MIN_TRIP_SECONDS && r.trip_duration < MAX_TRIP_SECONDS)
        .collect()
}

/// Run every predicate in order and derive the minute duration.
pub fn clean_records(
    records: Vec<RawTripRecord>,
    bounds: &BoundingBox,
) -> (Vec<CleanedTripRecord>, Vec<FilterStep>) {
    let mut steps = Vec::with_capacity(4);
    let mut step = |name: &'static str, before: usize, after: usize| {
        debug!(step = name, before, after, "filter applied");
        steps.push(FilterStep { name, before, after });
    };

    let n = records.len();
    let trips = drop_incomplete(records);
    step("drop_incomplete", n, trips.len());

    let n = trips.len();
    let trips = filter_passengers(trips);
    step("passenger_count", n, trips.len());

    let n = trips.len();
    let trips = filter_bounds(trips, bounds);
    step("bounding_box", n, trips.len());

    let n = trips.len();
    let trips = filter_duration(trips);
    step("trip_duration", n, trips.len());

    let cleaned = trips.into_iter().map(CleanedTripRecord::from).collect();
    (cleaned, steps)
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// Read the whole trip table, clean it and write `cfg.output`.
pub fn clean_store(cfg: &CleanConfig) -> Result<CleanSummary> {
    let store = TripStore::open_existing(&cfg.db, &cfg.table)?;
    if !store.table_exists()? {
        return Err(DemandError::missing(
            format!("table {} in {}", cfg.table, cfg.db.display()),
            "ingest",
        ));
    }

    let raw = store.read_all()?;
    let rows_read = raw.len();
    info!(rows = rows_read, table = %cfg.table, "loaded trips for cleaning");

    let (cleaned, steps) = clean_records(raw, &NYC_BOUNDS);
    for s in &steps {
        info!(step = s.name, before = s.before, after = s.after, "Removed {} rows", s.removed());
    }

    if cleaned.is_empty() {
        return Err(DemandError::DegenerateInput(format!(
            "no trips survived cleaning out of {rows_read} rows"
        )));
    }

    write_cleaned(&cfg.output, &cleaned)?;
    info!(
        rows = cleaned.len(),
        output = %cfg.output.display(),
        "cleaned data saved"
    );

    Ok(CleanSummary {
        rows_read,
        rows_written: cleaned.len(),
        steps,
    })
}

// ── Cleaned dataset I/O ───────────────────────────────────────────────────────

/// Write `records` as CSV with a header row, atomically.
pub fn write_cleaned(path: &Path, records: &[CleanedTripRecord]) -> Result<()> {
    write_atomic(path, |w| {
        let mut wtr = csv::Writer::from_writer(w);
        for r in records {
            wtr.serialize(r)?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Read a cleaned dataset.
///
/// Fails with [`DemandError::MissingPrerequisite`] when the file is absent.
pub fn read_cleaned(path: &Path) -> Result<Vec<CleanedTripRecord>> {
    if !path.is_file() {
        return Err(DemandError::missing(
            format!("cleaned dataset {}", path.display()),
            "clean",
        ));
    }
    let mut rdr = csv::Reader::from_reader(File::open(path)?);
    let records = rdr.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
