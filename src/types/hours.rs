//! Naive-UTC hourly time helpers.
//!
//! All timestamps in this crate are timezone-naive and interpreted as UTC.
//! Station logs are assumed to already be recorded in UTC; nothing here
//! converts between zones.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike};
use polars::prelude::TimeUnit;

pub const MS_PER_HOUR: i64 = 3_600_000;

/// Truncates a timestamp to the start of its hour.
pub fn truncate_to_hour(datetime: NaiveDateTime) -> NaiveDateTime {
    datetime.date().and_time(NaiveTime::MIN) + Duration::hours(datetime.hour() as i64)
}

/// Every top-of-hour timestamp in the closed range `[start, end]`.
///
/// Both bounds are truncated to the hour first. Yields nothing if `end < start`.
pub fn hourly_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> impl Iterator<Item = NaiveDateTime> {
    let end = truncate_to_hour(end);
    std::iter::successors(Some(truncate_to_hour(start)), |hour| {
        Some(*hour + Duration::hours(1))
    })
    .take_while(move |hour| *hour <= end)
}

pub fn datetime_to_ms(datetime: NaiveDateTime) -> i64 {
    datetime.and_utc().timestamp_millis()
}

pub fn ms_to_datetime(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Converts a raw polars datetime value in the given unit to a `NaiveDateTime`.
pub(crate) fn physical_to_datetime(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Milliseconds => ms_to_datetime(value),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value).map(|dt| dt.naive_utc()),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value).naive_utc()),
    }
}
