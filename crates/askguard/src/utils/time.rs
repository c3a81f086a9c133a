use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};

/// Current UTC wall clock as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn now_utc_timestamp() -> String {
    format_utc(OffsetDateTime::now_utc())
}

#[must_use]
pub fn format_utc(moment: OffsetDateTime) -> String {
    let dt = moment.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.millisecond()
    )
}

/// Elapsed time in seconds, rounded to 4 decimal places.
#[must_use]
pub fn elapsed_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::OffsetDateTime;

    use super::{elapsed_secs, format_utc};

    #[test]
    fn formats_utc_with_millis_and_zulu_suffix() {
        let moment = OffsetDateTime::from_unix_timestamp_nanos(1_770_274_803_042_000_000)
            .expect("timestamp should be in range");
        assert_eq!(format_utc(moment), "2026-02-05T07:00:03.042Z");
    }

    #[test]
    fn elapsed_rounds_to_four_places() {
        assert_eq!(elapsed_secs(Duration::from_micros(123_456)), 0.1235);
        assert_eq!(elapsed_secs(Duration::ZERO), 0.0);
    }
}
