//! UTC day bucketing for streaks and dedup keys
//!
//! All day arithmetic in the reward engine happens on UTC calendar days.
//! Buckets are stored as "YYYY-MM-DD" strings.

use chrono::{DateTime, NaiveDate, Utc};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// UTC calendar day of an instant.
pub fn utc_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Compute the day bucket string for a UTC calendar day.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use levelup::rewards::day_bucket;
///
/// let day = NaiveDate::from_ymd_opt(2023, 12, 28).unwrap();
/// assert_eq!(day_bucket(day), "2023-12-28");
/// ```
pub fn day_bucket(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Parse a day bucket string back to a calendar day.
pub fn parse_day_bucket(bucket: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(bucket, DAY_FORMAT).ok()
}
