use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Storage format for every date/time column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local wall-clock time, without zone.
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Convert an epoch-millisecond timestamp to local wall-clock time.
pub fn millis_to_local(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(&Local).naive_local())
}

/// Epoch milliseconds for the instant `days` days before now. Windows
/// reaching past the earliest representable instant saturate to it.
pub fn days_ago_millis(days: u32) -> i64 {
    Duration::try_days(i64::from(days))
        .and_then(|window| Local::now().checked_sub_signed(window))
        .map(|start| start.timestamp_millis())
        .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC.timestamp_millis())
}

/// Epoch milliseconds for local midnight at the start of `date`.
pub fn date_start_millis(date: NaiveDate) -> Option<i64> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_opt_timestamp(dt: Option<&NaiveDateTime>) -> Option<String> {
    dt.map(format_timestamp)
}
