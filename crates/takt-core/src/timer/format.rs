use serde::{Deserialize, Serialize};

const HOUR_MS: u64 = 3_600_000;
const MINUTE_MS: u64 = 60_000;
const SECOND_MS: u64 = 1_000;

/// Decomposed wall-clock duration for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedTime {
    /// Whole hours, unbounded (no wrap at 24).
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    /// Hundredths of a second, for stopwatch-style displays.
    pub hundredths: u64,
    /// `HH:MM:SS`, each field zero-padded to at least two digits.
    pub text: String,
}

/// Split a millisecond duration into display fields.
pub fn format_time(ms: u64) -> FormattedTime {
    let hours = ms / HOUR_MS;
    let minutes = (ms % HOUR_MS) / MINUTE_MS;
    let seconds = (ms % MINUTE_MS) / SECOND_MS;
    let hundredths = (ms % SECOND_MS) / 10;
    let text = format!("{hours:02}:{minutes:02}:{seconds:02}");
    FormattedTime {
        hours,
        minutes,
        seconds,
        hundredths,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_all_zeros() {
        let f = format_time(0);
        assert_eq!(f.hours, 0);
        assert_eq!(f.minutes, 0);
        assert_eq!(f.seconds, 0);
        assert_eq!(f.hundredths, 0);
        assert_eq!(f.text, "00:00:00");
    }

    #[test]
    fn one_hour_two_minutes_five_seconds() {
        let f = format_time(3_725_010);
        assert_eq!(f.hours, 1);
        assert_eq!(f.minutes, 2);
        assert_eq!(f.seconds, 5);
        assert_eq!(f.hundredths, 1);
        assert_eq!(f.text, "01:02:05");
    }

    #[test]
    fn sub_second_remainder_truncates_to_hundredths() {
        assert_eq!(format_time(999).hundredths, 99);
        assert_eq!(format_time(9).hundredths, 0);
        assert_eq!(format_time(10).hundredths, 1);
    }

    #[test]
    fn hours_do_not_wrap_at_24() {
        let f = format_time(100 * 3_600_000);
        assert_eq!(f.hours, 100);
        assert_eq!(f.text, "100:00:00");
    }

    #[test]
    fn fields_just_below_rollover() {
        let f = format_time(59 * 60_000 + 59 * 1_000 + 990);
        assert_eq!(f.hours, 0);
        assert_eq!(f.minutes, 59);
        assert_eq!(f.seconds, 59);
        assert_eq!(f.hundredths, 99);
        assert_eq!(f.text, "00:59:59");
    }
}
