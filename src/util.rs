use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Minutes in an hour.
const HOUR: u64 = 60;
/// Hours in a day.
const DAY: u64 = 24;
/// Days in a month, as far as listening totals are concerned.
const MONTH: u64 = 31;

/// Formats a number of minutes as a compact, human-readable duration.
///
/// Only the two most significant units are shown:
///
/// | Minutes | Output     |
/// |---------|------------|
/// | 45      | `45 mins`  |
/// | 90      | `1h 30m`   |
/// | 1500    | `1d 1h`    |
/// | 44640   | `1m 0d`    |
///
/// Months are counted as 31 days, so `m` after a day count means months.
#[must_use]
pub fn format_duration(minutes: u64) -> String {
    if minutes < HOUR {
        return format!("{minutes} mins");
    }

    let hours = minutes / HOUR;
    let remaining_minutes = minutes % HOUR;
    if hours < DAY {
        return format!("{hours}h {remaining_minutes}m");
    }

    let days = hours / DAY;
    let remaining_hours = hours % DAY;
    if days < MONTH {
        return format!("{days}d {remaining_hours}h");
    }

    let months = days / MONTH;
    let remaining_days = days % MONTH;
    format!("{months}m {remaining_days}d")
}

/// Whole minutes in `duration`, rounded down.
#[must_use]
pub fn whole_minutes(duration: Duration) -> u64 {
    duration.as_secs() / 60
}

/// Milliseconds between the Unix epoch and `time`.
///
/// Times before the epoch are clamped to zero.
///
/// # Errors
///
/// Will return `Err` if the milliseconds do not fit in a `u64`, the range
/// [`from_millis_since_epoch`] reads back.
pub fn millis_since_epoch(time: SystemTime) -> Result<u64> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis();
    u64::try_from(millis)
        .map_err(|_| Error::invalid_argument(format!("{millis} ms since epoch out of range")))
}

/// The inverse of [`millis_since_epoch`].
#[must_use]
pub fn from_millis_since_epoch(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_boundaries() {
        let table = [
            (0, "0 mins"),
            (45, "45 mins"),
            (59, "59 mins"),
            (60, "1h 0m"),
            (90, "1h 30m"),
            (1439, "23h 59m"),
            (1440, "1d 0h"),
            (1500, "1d 1h"),
            (44_639, "30d 23h"),
            (44_640, "1m 0d"),
            (89_280, "2m 0d"),
            (90_720, "2m 1d"),
        ];
        for (minutes, expected) in table {
            assert_eq!(format_duration(minutes), expected, "{minutes} minutes");
        }
    }

    #[test]
    fn whole_minutes_rounds_down() {
        assert_eq!(whole_minutes(Duration::from_millis(59_999)), 0);
        assert_eq!(whole_minutes(Duration::from_millis(215_000)), 3);
    }

    #[test]
    fn epoch_millis_round_trip() {
        let time = from_millis_since_epoch(1_700_000_000_123);
        assert_eq!(millis_since_epoch(time).unwrap(), 1_700_000_000_123);

        let last = from_millis_since_epoch(u64::MAX);
        assert_eq!(millis_since_epoch(last).unwrap(), u64::MAX);
        assert!(millis_since_epoch(last + Duration::from_millis(1)).is_err());
    }
}
