//! Nanosecond-epoch time helpers. All timestamps in the workspace are `i64`
//! nanoseconds since the Unix epoch, UTC; `chrono` types appear only at the
//! edges.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
pub const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
pub const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;

/// Midnight UTC of `date`, in epoch nanoseconds.
pub fn date_start_ns(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp() * NANOS_PER_SECOND)
        .unwrap_or(0)
}

/// Calendar date containing `ts_ns`.
pub fn date_of_ns(ts_ns: i64) -> NaiveDate {
    to_datetime(ts_ns).date_naive()
}

/// Time of day of `ts_ns` within its UTC date.
pub fn time_of_ns(ts_ns: i64) -> NaiveTime {
    to_datetime(ts_ns).time()
}

/// `ts_ns` aligned down to a multiple of `increment_ns`.
pub fn round_down(ts_ns: i64, increment_ns: i64) -> i64 {
    if increment_ns <= 0 {
        return ts_ns;
    }
    (ts_ns.div_euclid(increment_ns)) * increment_ns
}

pub fn to_datetime(ts_ns: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(
        ts_ns.div_euclid(NANOS_PER_SECOND),
        ts_ns.rem_euclid(NANOS_PER_SECOND) as u32,
    )
    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub fn from_datetime(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_nanos_opt()
        .unwrap_or_else(|| dt.timestamp() * NANOS_PER_SECOND)
}
