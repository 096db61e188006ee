//! SQLite-backed trip table.
//!
//! The store holds exactly one table per name, with one column per
//! [`EXPECTED_COLUMNS`] entry. Timestamps are kept as
//! `YYYY-MM-DD HH:MM:SS` text in `TIMESTAMP` columns; nulls are preserved.

use std::path::Path;

use demand_core::models::{RawTripRecord, EXPECTED_COLUMNS};
use demand_core::persist::ensure_parent_dir;
use demand_core::settings::validate_table_name;
use demand_core::time_utils::{format_timestamp, parse_timestamp};
use demand_core::{DemandError, Result};
use rusqlite::{params, Connection, OpenFlags, Transaction};
use tracing::debug;

// ── TripStore ─────────────────────────────────────────────────────────────────

/// Handle on one trip table inside a SQLite database file.
pub struct TripStore {
    conn: Connection,
    table: String,
}

impl TripStore {
    /// Open (creating if needed) the database at `path` for writing.
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        ensure_parent_dir(path)?;
        let conn = Connection::open(path)?;
        debug!(db = %path.display(), table, "opened trip store");
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// Open an existing database read-only.
    ///
    /// Fails with [`DemandError::MissingPrerequisite`] when the file is absent.
    pub fn open_existing(path: &Path, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        if !path.exists() {
            return Err(DemandError::missing(
                format!("trip store {}", path.display()),
                "ingest",
            ));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// `true` when the table is present in the database.
    pub fn table_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", self.table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Start a load: one transaction that replaces the table on the first
    /// written chunk and appends every chunk after it.
    pub fn begin_load(&mut self) -> Result<TripLoad<'_>> {
        let tx = self.conn.transaction()?;
        Ok(TripLoad {
            tx,
            table: self.table.clone(),
            replaced: false,
            rows: 0,
        })
    }

    /// Read every row of the table.
    pub fn read_all(&self) -> Result<Vec<RawTripRecord>> {
        let sql = format!("SELECT {} FROM \"{}\"", EXPECTED_COLUMNS.join(", "), self.table);
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], |row| {
                let ts = |idx: usize| -> rusqlite::Result<_> {
                    Ok(row
                        .get::<_, Option<String>>(idx)?
                        .as_deref()
                        .and_then(parse_timestamp))
                };
                Ok(RawTripRecord {
                    pickup_datetime: ts(0)?,
                    dropoff_datetime: ts(1)?,
                    pickup_longitude: row.get(2)?,
                    pickup_latitude: row.get(3)?,
                    dropoff_longitude: row.get(4)?,
                    dropoff_latitude: row.get(5)?,
                    passenger_count: row.get(6)?,
                    trip_duration: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

// ── TripLoad ──────────────────────────────────────────────────────────────────

/// An in-progress load. Dropping it without [`TripLoad::commit`] rolls every
/// chunk back and leaves the previous table intact.
pub struct TripLoad<'a> {
    tx: Transaction<'a>,
    table: String,
    replaced: bool,
    rows: u64,
}

impl TripLoad<'_> {
    /// Write one chunk, replacing the table first if this is the first chunk.
    pub fn write_chunk(&mut self, records: &[RawTripRecord]) -> Result<usize> {
        if !self.replaced {
            self.tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS \"{t}\";
                 CREATE TABLE \"{t}\" (
                     pickup_datetime TIMESTAMP,
                     dropoff_datetime TIMESTAMP,
                     pickup_longitude REAL,
                     pickup_latitude REAL,
                     dropoff_longitude REAL,
                     dropoff_latitude REAL,
                     passenger_count INTEGER,
                     trip_duration INTEGER
                 );",
                t = self.table
            ))?;
            self.replaced = true;
        }

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            self.table,
            EXPECTED_COLUMNS.join(", ")
        );
        let mut stmt = self.tx.prepare_cached(&sql)?;
        for r in records {
            stmt.execute(params![
                r.pickup_datetime.as_ref().map(format_timestamp),
                r.dropoff_datetime.as_ref().map(format_timestamp),
                r.pickup_longitude,
                r.pickup_latitude,
                r.dropoff_longitude,
                r.dropoff_latitude,
                r.passenger_count,
                r.trip_duration,
            ])?;
        }

        self.rows += records.len() as u64;
        Ok(records.len())
    }

    /// `true` once at least one chunk has been written.
    pub fn has_replaced(&self) -> bool {
        self.replaced
    }

    /// Commit the load and return the number of rows written.
    pub fn commit(self) -> Result<u64> {
        self.tx.commit()?;
        Ok(self.rows)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
