//! Hourly demand aggregation over cleaned trips.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use demand_core::models::{CleanedTripRecord, HourlyDemandPoint};
use demand_core::persist::write_atomic;
use demand_core::settings::AggregateConfig;
use demand_core::time_utils::{floor_to_hour, hourly_range};
use demand_core::{DemandError, Result};
use tracing::{debug, info};

use crate::cleaner::read_cleaned;

/// Outcome of one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSummary {
    pub trips: usize,
    pub hours: usize,
    /// Hours with no pickups, materialised as zero.
    pub empty_hours: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

// ── HourlyAggregator ──────────────────────────────────────────────────────────

/// Stateless helper that buckets trips by pickup hour.
pub struct HourlyAggregator;

impl HourlyAggregator {
    /// Count pickups per hour-aligned interval. Keys are sorted ascending.
    pub fn count_by_hour(trips: &[CleanedTripRecord]) -> BTreeMap<NaiveDateTime, u64> {
        let mut counts: BTreeMap<NaiveDateTime, u64> = BTreeMap::new();
        for trip in trips {
            *counts.entry(floor_to_hour(trip.pickup_datetime)).or_default() += 1;
        }
        counts
    }

    /// Reindex `counts` onto every hour between its first and last key,
    /// inclusive, filling absent hours with zero.
    pub fn fill_gaps(counts: &BTreeMap<NaiveDateTime, u64>) -> Vec<HourlyDemandPoint> {
        let (Some((&start, _)), Some((&end, _))) = (counts.first_key_value(), counts.last_key_value()) else {
            return Vec::new();
        };
        hourly_range(start, end)
            .map(|ds| HourlyDemandPoint {
                ds,
                y: counts.get(&ds).copied().unwrap_or(0),
            })
            .collect()
    }

    /// Gap-free hourly series for `trips`.
    pub fn aggregate(trips: &[CleanedTripRecord]) -> Vec<HourlyDemandPoint> {
        Self::fill_gaps(&Self::count_by_hour(trips))
    }
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// Read `cfg.input`, aggregate it and write `cfg.output`.
pub fn aggregate_file(cfg: &AggregateConfig) -> Result<AggregateSummary> {
    let trips = read_cleaned(&cfg.input)?;
    if trips.is_empty() {
        return Err(DemandError::DegenerateInput(format!(
            "cleaned dataset {} has no rows",
            cfg.input.display()
        )));
    }

    let counts = HourlyAggregator::count_by_hour(&trips);
    let series = HourlyAggregator::fill_gaps(&counts);
    debug!(observed_hours = counts.len(), "pickups bucketed");

    // Non-empty input always yields at least one point.
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Err(DemandError::DegenerateInput("no hourly points produced".to_string()));
    };
    let summary = AggregateSummary {
        trips: trips.len(),
        hours: series.len(),
        empty_hours: series.len() - counts.len(),
        start: first.ds,
        end: last.ds,
    };

    write_hourly(&cfg.output, &series)?;
    info!(
        trips = summary.trips,
        hours = summary.hours,
        empty_hours = summary.empty_hours,
        output = %cfg.output.display(),
        "hourly demand saved"
    );
    Ok(summary)
}

// ── Hourly series I/O ─────────────────────────────────────────────────────────

/// Write the series as `ds,y` CSV, atomically.
pub fn write_hourly(path: &Path, series: &[HourlyDemandPoint]) -> Result<()> {
    write_atomic(path, |w| {
        let mut wtr = csv::Writer::from_writer(w);
        for point in series {
            wtr.serialize(point)?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Read a `ds,y` series.
///
/// Fails with [`DemandError::MissingPrerequisite`] when the file is absent.
pub fn read_hourly(path: &Path) -> Result<Vec<HourlyDemandPoint>> {
    if !path.is_file() {
        return Err(DemandError::missing(
            format!("hourly demand series {}", path.display()),
            "aggregate",
        ));
    }
    let mut rdr = csv::Reader::from_reader(File::open(path)?);
    let series = rdr.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(series)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::write_cleaned;
    use demand_core::time_utils::parse_timestamp;
    use tempfile::TempDir;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn trip(pickup: &str) -> CleanedTripRecord {
        let pickup = ts(pickup);
        CleanedTripRecord {
            pickup_datetime: pickup,
            dropoff_datetime: pickup + chrono::Duration::minutes(10),
            pickup_longitude: -73.98,
            pickup_latitude: 40.76,
            dropoff_longitude: -73.96,
            dropoff_latitude: 40.77,
            passenger_count: 1,
            trip_duration: 600,
            trip_duration_minutes: 10.0,
        }
    }

    // ── count_by_hour ─────────────────────────────────────────────────────────

    #[test]
    fn test_count_by_hour_floors_pickups() {
        let trips = vec![
            trip("2016-03-14 17:00:00"),
            trip("2016-03-14 17:59:59"),
            trip("2016-03-14 18:00:00"),
        ];
        let counts = HourlyAggregator::count_by_hour(&trips);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&ts("2016-03-14 17:00:00")], 2);
        assert_eq!(counts[&ts("2016-03-14 18:00:00")], 1);
    }

    // ── fill_gaps ─────────────────────────────────────────────────────────────

    #[test]
    fn test_fill_gaps_materialises_zero_hours() {
        let trips = vec![trip("2016-03-14 22:10:00"), trip("2016-03-15 01:50:00")];
        let series = HourlyAggregator::aggregate(&trips);

        let counts: Vec<u64> = series.iter().map(|p| p.y).collect();
        assert_eq!(counts, vec![1, 0, 0, 1]);
        assert_eq!(series[1].ds, ts("2016-03-14 23:00:00"));
    }

    #[test]
    fn test_trips_a_week_apart_give_169_rows() {
        let trips = vec![trip("2016-03-14 09:15:00"), trip("2016-03-21 09:45:00")];
        let series = HourlyAggregator::aggregate(&trips);

        assert_eq!(series.len(), 169);
        assert_eq!(series.iter().map(|p| p.y).sum::<u64>(), 2);
        assert!(series.windows(2).all(|w| w[1].ds - w[0].ds == chrono::Duration::hours(1)));
    }

    #[test]
    fn test_single_hour() {
        let series = HourlyAggregator::aggregate(&[trip("2016-03-14 09:15:00")]);
        assert_eq!(
            series,
            vec![HourlyDemandPoint {
                ds: ts("2016-03-14 09:00:00"),
                y: 1
            }]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(HourlyAggregator::aggregate(&[]).is_empty());
    }

    // ── aggregate_file ────────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let cfg = AggregateConfig {
            input: dir.path().join("cleaned.csv"),
            output: dir.path().join("hourly").join("demand.csv"),
        };
        write_cleaned(
            &cfg.input,
            &[
                trip("2016-03-14 17:05:00"),
                trip("2016-03-14 17:35:00"),
                trip("2016-03-14 20:00:00"),
            ],
        )
        .unwrap();

        let summary = aggregate_file(&cfg).unwrap();
        assert_eq!(summary.trips, 3);
        assert_eq!(summary.hours, 4);
        assert_eq!(summary.empty_hours, 2);
        assert_eq!(summary.start, ts("2016-03-14 17:00:00"));
        assert_eq!(summary.end, ts("2016-03-14 20:00:00"));

        let text = std::fs::read_to_string(&cfg.output).unwrap();
        assert!(text.starts_with("ds,y\n2016-03-14 17:00:00,2\n"));
        assert_eq!(read_hourly(&cfg.output).unwrap().len(), 4);
    }

    #[test]
    fn test_aggregate_file_header_only_is_degenerate() {
        let dir = TempDir::new().unwrap();
        let cfg = AggregateConfig {
            input: dir.path().join("cleaned.csv"),
            output: dir.path().join("demand.csv"),
        };
        std::fs::write(&cfg.input, demand_core::models::CLEANED_COLUMNS.join(",") + "\n").unwrap();

        let err = aggregate_file(&cfg).unwrap_err();
        assert!(matches!(err, DemandError::DegenerateInput(_)));
        assert!(!cfg.output.exists());
    }

    #[test]
    fn test_aggregate_file_missing_input() {
        let dir = TempDir::new().unwrap();
        let cfg = AggregateConfig {
            input: dir.path().join("absent.csv"),
            output: dir.path().join("demand.csv"),
        };
        match aggregate_file(&cfg).unwrap_err() {
            DemandError::MissingPrerequisite { producer, .. } => assert_eq!(producer, "clean"),
            other => panic!("unexpected error {other}"),
        }
    }
}
