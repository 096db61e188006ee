use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::geo::BoundingBox;
use crate::time_utils::naive_datetime;

/// The eight source columns every ingested chunk is projected onto, in
/// store order.
pub const EXPECTED_COLUMNS: [&str; 8] = [
    "pickup_datetime",
    "dropoff_datetime",
    "pickup_longitude",
    "pickup_latitude",
    "dropoff_longitude",
    "dropoff_latitude",
    "passenger_count",
    "trip_duration",
];

/// Header of the cleaned dataset: [`EXPECTED_COLUMNS`] plus the derived
/// duration in minutes.
pub const CLEANED_COLUMNS: [&str; 9] = [
    "pickup_datetime",
    "dropoff_datetime",
    "pickup_longitude",
    "pickup_latitude",
    "dropoff_longitude",
    "dropoff_latitude",
    "passenger_count",
    "trip_duration",
    "trip_duration_minutes",
];

/// One trip exactly as it was received. Any field may be null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTripRecord {
    pub pickup_datetime: Option<NaiveDateTime>,
    pub dropoff_datetime: Option<NaiveDateTime>,
    pub pickup_longitude: Option<f64>,
    pub pickup_latitude: Option<f64>,
    pub dropoff_longitude: Option<f64>,
    pub dropoff_latitude: Option<f64>,
    pub passenger_count: Option<i64>,
    /// Trip duration in seconds.
    pub trip_duration: Option<i64>,
}

impl RawTripRecord {
    /// Return the non-null view of this record, or `None` when any field is
    /// missing.
    pub fn complete(&self) -> Option<TripRecord> {
        Some(TripRecord {
            pickup_datetime: self.pickup_datetime?,
            dropoff_datetime: self.dropoff_datetime?,
            pickup_longitude: self.pickup_longitude?,
            pickup_latitude: self.pickup_latitude?,
            dropoff_longitude: self.dropoff_longitude?,
            dropoff_latitude: self.dropoff_latitude?,
            passenger_count: self.passenger_count?,
            trip_duration: self.trip_duration?,
        })
    }
}

/// A trip with every field present, not yet range-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub pickup_longitude: f64,
    pub pickup_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_latitude: f64,
    pub passenger_count: i64,
    pub trip_duration: i64,
}

impl TripRecord {
    /// `true` when both pickup and dropoff lie inside `bounds`.
    pub fn within(&self, bounds: &BoundingBox) -> bool {
        bounds.contains(self.pickup_longitude, self.pickup_latitude)
            && bounds.contains(self.dropoff_longitude, self.dropoff_latitude)
    }
}

/// A trip that passed every validity predicate, as written to the cleaned
/// dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedTripRecord {
    #[serde(with = "naive_datetime")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(with = "naive_datetime")]
    pub dropoff_datetime: NaiveDateTime,
    pub pickup_longitude: f64,
    pub pickup_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_latitude: f64,
    pub passenger_count: i64,
    pub trip_duration: i64,
    pub trip_duration_minutes: f64,
}

impl From<TripRecord> for CleanedTripRecord {
    fn from(trip: TripRecord) -> Self {
        Self {
            trip_duration_minutes: duration_minutes(trip.trip_duration),
            pickup_datetime: trip.pickup_datetime,
            dropoff_datetime: trip.dropoff_datetime,
            pickup_longitude: trip.pickup_longitude,
            pickup_latitude: trip.pickup_latitude,
            dropoff_longitude: trip.dropoff_longitude,
            dropoff_latitude: trip.dropoff_latitude,
            passenger_count: trip.passenger_count,
            trip_duration: trip.trip_duration,
        }
    }
}

/// Number of trips picked up within one hour-aligned interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyDemandPoint {
    #[serde(with = "naive_datetime")]
    pub ds: NaiveDateTime,
    pub y: u64,
}

/// Seconds → minutes, rounded to two decimal places.
pub fn duration_minutes(seconds: i64) -> f64 {
    (seconds as f64 / 60.0 * 100.0).round() / 100.0
}
