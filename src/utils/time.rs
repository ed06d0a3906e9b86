use time::{macros::format_description, OffsetDateTime};

const NANOS_PER_MILLI: i128 = 1_000_000;

#[inline]
pub fn sleep_for_ms(ms: u64) {
    std::thread::sleep(std::time::Duration::from_millis(ms));
}

#[inline]
pub fn curr_time_millis() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / NANOS_PER_MILLI) as u64
}

#[inline]
pub fn milli2nano<T: Into<i128>>(t: T) -> i128 {
    NANOS_PER_MILLI * t.into()
}

/// Formats a millisecond timestamp as `hh:mm:ss.mmm` (UTC), for log lines.
pub fn format_time_millis(ts_millis: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(milli2nano(ts_millis))
        .ok()
        .and_then(|t| {
            t.format(format_description!(
                "[hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .ok()
        })
        .unwrap_or_else(|| ts_millis.to_string())
}
