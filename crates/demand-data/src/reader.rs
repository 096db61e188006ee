//! Chunked loading of the raw trip CSV.
//!
//! [`TripChunks`] reads the source lazily, `chunk_size` rows at a time, and
//! projects every chunk onto [`EXPECTED_COLUMNS`]. A chunk that does not
//! carry all eight columns comes back as [`DemandError::MalformedChunk`] so
//! the consumer can log it and move on; any other error ends the stream.
//!
//! Rows are read as raw bytes and only the eight projected fields are
//! decoded, so stray bytes in ignored columns never reach the parser. A
//! projected field that is not valid UTF-8 becomes null.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ByteRecord;
use demand_core::models::{RawTripRecord, EXPECTED_COLUMNS};
use demand_core::time_utils::parse_timestamp;
use demand_core::{DemandError, Result};
use tracing::debug;

// ── TripChunk ─────────────────────────────────────────────────────────────────

/// One projected batch of source rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TripChunk {
    /// 1-based position of the chunk in the source.
    pub index: usize,
    pub records: Vec<RawTripRecord>,
}

// ── TripChunks ────────────────────────────────────────────────────────────────

/// Finite, non-restartable iterator of projected chunks.
///
/// Column presence is judged per chunk: a single row cut short before an
/// expected column discards its whole chunk, up to `chunk_size` rows, while
/// the chunks around it load normally.
pub struct TripChunks<R: Read> {
    reader: csv::Reader<R>,
    header: Vec<String>,
    chunk_size: usize,
    chunks_read: usize,
    exhausted: bool,
}

impl TripChunks<File> {
    /// Open `path` for chunked reading.
    ///
    /// Fails with [`DemandError::SourceNotFound`] when the file is absent.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DemandError::SourceNotFound(path.to_path_buf()),
            _ => DemandError::Io(e),
        })?;
        Self::from_reader(file, chunk_size)
    }
}

impl<R: Read> TripChunks<R> {
    /// Wrap any reader producing CSV with a header row.
    pub fn from_reader(rdr: R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DemandError::Config("chunk size must be positive".to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let header = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();

        Ok(Self {
            reader,
            header,
            chunk_size,
            chunks_read: 0,
            exhausted: false,
        })
    }

    /// Project raw rows onto the expected schema.
    fn project(&self, index: usize, rows: &[ByteRecord]) -> Result<TripChunk> {
        // A column counts as present only when every row of the chunk reaches it.
        let shortest = rows.iter().map(|r| r.len()).min().unwrap_or(0);

        let mut positions = [0usize; EXPECTED_COLUMNS.len()];
        let mut missing = Vec::new();
        for (slot, name) in positions.iter_mut().zip(EXPECTED_COLUMNS) {
            match self.header.iter().position(|h| h == name) {
                Some(pos) if pos < shortest => *slot = pos,
                _ => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(DemandError::MalformedChunk { index, missing });
        }

        let [
            pickup,
            dropoff,
            pickup_lon,
            pickup_lat,
            dropoff_lon,
            dropoff_lat,
            passengers,
            duration,
        ] = positions;
        let records = rows
            .iter()
            .map(|row| RawTripRecord {
                pickup_datetime: parse_timestamp(field(row, pickup)),
                dropoff_datetime: parse_timestamp(field(row, dropoff)),
                pickup_longitude: parse_float(field(row, pickup_lon)),
                pickup_latitude: parse_float(field(row, pickup_lat)),
                dropoff_longitude: parse_float(field(row, dropoff_lon)),
                dropoff_latitude: parse_float(field(row, dropoff_lat)),
                passenger_count: parse_integer(field(row, passengers)),
                trip_duration: parse_integer(field(row, duration)),
            })
            .collect();

        Ok(TripChunk { index, records })
    }
}

impl<R: Read> Iterator for TripChunks<R> {
    type Item = Result<TripChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let mut rows: Vec<ByteRecord> = Vec::with_capacity(self.chunk_size.min(4096));
        let mut record = ByteRecord::new();
        while rows.len() < self.chunk_size {
            match self.reader.read_byte_record(&mut record) {
                Ok(true) => rows.push(record.clone()),
                Ok(false) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e.into()));
                }
            }
        }

        if rows.is_empty() {
            return None;
        }

        self.chunks_read += 1;
        debug!(chunk = self.chunks_read, rows = rows.len(), "read source chunk");
        Some(self.project(self.chunks_read, &rows))
    }
}

// ── Field parsers ─────────────────────────────────────────────────────────────

/// Text of field `pos`, or `""` when it is absent or not valid UTF-8.
fn field(row: &ByteRecord, pos: usize) -> &str {
    row.get(pos)
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .unwrap_or("")
}

/// Parse a finite float; empty, `NaN` and unparseable text become `None`.
pub fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer, also accepting integral float text such as `"2.0"`.
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    parse_float(s)
        .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
        .map(|v| v as i64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,pickup_datetime,dropoff_datetime,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,trip_duration,passenger_count";

    fn row(id: u32, passengers: &str) -> String {
        format!(
            "id{id},2016-03-14 17:24:55,2016-03-14 17:32:30,-73.98,40.76,-73.96,40.76,455,{passengers}"
        )
    }

    fn csv_text(rows: &[String]) -> String {
        let mut out = String::from(HEADER);
        for r in rows {
            out.push('\n');
            out.push_str(r);
        }
        out.push('\n');
        out
    }

    fn chunks(text: &str, size: usize) -> Vec<Result<TripChunk>> {
        TripChunks::from_reader(text.as_bytes(), size).unwrap().collect()
    }

    // ── chunking ──────────────────────────────────────────────────────────────

    #[test]
    fn test_rows_split_into_chunks() {
        let rows: Vec<String> = (0..5).map(|i| row(i, "1")).collect();
        let out = chunks(&csv_text(&rows), 2);

        let sizes: Vec<usize> = out
            .iter()
            .map(|c| c.as_ref().unwrap().records.len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let indices: Vec<usize> = out.iter().map(|c| c.as_ref().unwrap().index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_header_only_yields_nothing() {
        assert!(chunks(&csv_text(&[]), 10).is_empty());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = TripChunks::from_reader(HEADER.as_bytes(), 0);
        assert!(matches!(result, Err(DemandError::Config(_))));
    }

    // ── projection ────────────────────────────────────────────────────────────

    #[test]
    fn test_projection_ignores_extra_columns_and_reorders() {
        let out = chunks(&csv_text(&[row(1, "3")]), 10);
        let rec = &out[0].as_ref().unwrap().records[0];
        assert_eq!(rec.passenger_count, Some(3));
        assert_eq!(rec.trip_duration, Some(455));
        assert_eq!(rec.pickup_longitude, Some(-73.98));
        assert_eq!(rec.pickup_datetime, parse_timestamp("2016-03-14 17:24:55"));
    }

    #[test]
    fn test_empty_fields_become_null() {
        let text = csv_text(&[
            "id1,,2016-03-14 17:32:30,-73.98,,-73.96,40.76,455,".to_string(),
        ]);
        let out = chunks(&text, 10);
        let rec = &out[0].as_ref().unwrap().records[0];
        assert!(rec.pickup_datetime.is_none());
        assert!(rec.pickup_latitude.is_none());
        assert!(rec.passenger_count.is_none());
        assert_eq!(rec.trip_duration, Some(455));
    }

    #[test]
    fn test_missing_header_column_marks_every_chunk() {
        let text = "pickup_datetime,dropoff_datetime,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,trip_duration\n\
                    2016-03-14 17:24:55,2016-03-14 17:32:30,-73.98,40.76,-73.96,40.76,455\n";
        let out = chunks(text, 10);
        assert_eq!(out.len(), 1);
        match &out[0] {
            Err(DemandError::MalformedChunk { index, missing }) => {
                assert_eq!(*index, 1);
                assert_eq!(missing, &vec!["passenger_count".to_string()]);
            }
            other => panic!("expected malformed chunk, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_rows_only_affect_their_chunk() {
        let truncated = "id9,2016-03-14 17:24:55,2016-03-14 17:32:30,-73.98,40.76,-73.96,40.76,455".to_string();
        let rows = vec![row(1, "1"), row(2, "1"), truncated, row(4, "1"), row(5, "2"), row(6, "1")];
        let out = chunks(&csv_text(&rows), 2);

        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        let err = out[1].as_ref().unwrap_err();
        assert!(err.is_recoverable());
        match err {
            DemandError::MalformedChunk { index, missing } => {
                assert_eq!(*index, 2);
                assert_eq!(missing, &vec!["passenger_count".to_string()]);
            }
            other => panic!("expected malformed chunk, got {other:?}"),
        }
        assert_eq!(out[2].as_ref().unwrap().records.len(), 2);
    }

    #[test]
    fn test_invalid_utf8_does_not_end_the_stream() {
        let mut text = csv_text(&[row(1, "1"), row(2, "1")]).into_bytes();
        // Undecodable bytes in the ignored `id` column, then in `passenger_count`.
        text.extend_from_slice(b"id\xff\xfe,2016-03-14 17:24:55,2016-03-14 17:32:30,-73.98,40.76,-73.96,40.76,455,2\n");
        text.extend_from_slice(b"id4,2016-03-14 17:24:55,2016-03-14 17:32:30,-73.98,40.76,-73.96,40.76,455,\xff\n");

        let out: Vec<_> = TripChunks::from_reader(text.as_slice(), 2).unwrap().collect();
        assert_eq!(out.len(), 2);
        let second = &out[1].as_ref().unwrap().records;
        assert_eq!(second[0].passenger_count, Some(2));
        assert_eq!(second[0].trip_duration, Some(455));
        assert!(second[1].passenger_count.is_none());
        assert!(second[1].pickup_datetime.is_some());
    }

    #[test]
    fn test_open_missing_file_is_source_not_found() {
        let result = TripChunks::open(Path::new("/tmp/does-not-exist-demand-xyz.csv"), 10);
        assert!(matches!(result, Err(DemandError::SourceNotFound(_))));
    }

    // ── field parsers ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float(" -73.98 "), Some(-73.98));
        assert_eq!(parse_float(""), None);
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_float("abc"), None);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("455"), Some(455));
        assert_eq!(parse_integer("2.0"), Some(2));
        assert_eq!(parse_integer("2.5"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("-1"), Some(-1));
    }
}
