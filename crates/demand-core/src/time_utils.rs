use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Canonical on-disk timestamp format, shared by the store and every CSV.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse a timestamp string into a timezone-naive [`NaiveDateTime`].
///
/// Accepts the space- or `T`-separated ISO forms (with optional fractional
/// seconds or without seconds), a bare date (midnight), and RFC 3339 strings
/// carrying an offset, which keep their wall-clock time.
/// Returns `None` for empty strings or unrecognised formats.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    const FMTS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in FMTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::default()))
}

/// Format a timestamp with [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// ── Hour arithmetic ───────────────────────────────────────────────────────────

/// Truncate `ts` to the start of its hour-aligned interval.
pub fn floor_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(ts.hour(), 0, 0).unwrap_or_default();
    NaiveDateTime::new(ts.date(), time)
}

/// Every whole hour from `start` to `end`, both inclusive.
///
/// Both bounds are floored first. Yields nothing when `end < start`.
pub fn hourly_range(start: NaiveDateTime, end: NaiveDateTime) -> impl Iterator<Item = NaiveDateTime> {
    let start = floor_to_hour(start);
    let end = floor_to_hour(end);
    std::iter::successors(Some(start), |ts| Some(*ts + Duration::hours(1)))
        .take_while(move |ts| *ts <= end)
}

// ── Serde adapters ────────────────────────────────────────────────────────────

/// `#[serde(with = "...")]` adapter writing [`TIMESTAMP_FORMAT`] and reading
/// anything [`parse_timestamp`] understands.
pub mod naive_datetime {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
