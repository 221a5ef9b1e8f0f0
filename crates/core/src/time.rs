use chrono::{Datelike, Days, Local, NaiveDate};
use thiserror::Error;

/// Storage and display format for calendar dates (`YYYY-MM-DD`, zero padded).
///
/// Because the format is fixed-width, the lexicographic order of formatted
/// dates matches their chronological order.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Years that fit the four-digit `YYYY` field.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DateError {
    #[error("invalid date: {raw:?} (expected YYYY-MM-DD)")]
    InvalidDate { raw: String },

    #[error("invalid month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("date out of range: {from} + {days} days")]
    OutOfRange { from: NaiveDate, days: u64 },
}

/// True if `date` formats as exactly ten `YYYY-MM-DD` characters.
#[must_use]
pub fn in_range(date: NaiveDate) -> bool {
    YEAR_RANGE.contains(&date.year())
}

/// Parses a `YYYY-MM-DD` calendar date.
///
/// # Errors
///
/// Returns `DateError::InvalidDate` if `raw` is not a valid calendar date
/// or its year falls outside 0000..=9999.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DateError> {
    let invalid = || DateError::InvalidDate {
        raw: raw.to_owned(),
    };
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| invalid())?;
    if in_range(date) { Ok(date) } else { Err(invalid()) }
}

/// `from` plus `days`, kept inside the four-digit year range.
///
/// # Errors
///
/// Returns `DateError::OutOfRange` if the result would leave 0000..=9999.
pub fn add_days(from: NaiveDate, days: u64) -> Result<NaiveDate, DateError> {
    from.checked_add_days(Days::new(days))
        .filter(|date| in_range(*date))
        .ok_or(DateError::OutOfRange { from, days })
}

/// Formats a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// A calendar clock that yields "today" as a date without a time of day.
///
/// Services read it on every call instead of capturing today once, so a
/// long-running session picks up midnight rollover.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Local,
    Fixed(NaiveDate),
}

impl Clock {
    /// Returns a clock that follows the local system calendar.
    #[must_use]
    pub fn local() -> Self {
        Self::Local
    }

    /// Returns a clock fixed at the given date.
    #[must_use]
    pub fn fixed(on: NaiveDate) -> Self {
        Self::Fixed(on)
    }

    /// Returns today's date according to the clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::Local => Local::now().date_naive(),
            Clock::Fixed(d) => *d,
        }
    }
}

/// Returns a deterministic date for tests and examples (2024-06-12, a Wednesday).
///
/// # Panics
///
/// Panics if the fixed date cannot be represented.
#[must_use]
pub fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 12).expect("fixed date should be valid")
}

/// Returns a `Clock` fixed at the deterministic test date.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_today())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_agree() {
        let d = parse_date("2024-03-09").unwrap();
        assert_eq!(format_date(d), "2024-03-09");
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(
            parse_date(" 2024-01-01 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn parse_rejects_garbage_and_impossible_dates() {
        assert!(matches!(
            parse_date("yesterday"),
            Err(DateError::InvalidDate { .. })
        ));
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn parse_rejects_years_outside_four_digits() {
        assert!(matches!(
            parse_date("+262142-12-20"),
            Err(DateError::InvalidDate { .. })
        ));
        assert!(parse_date("+10000-01-01").is_err());
        assert!(parse_date("-0001-12-31").is_err());
        let last = parse_date("9999-12-31").unwrap();
        assert_eq!(format_date(last), "9999-12-31");
    }

    #[test]
    fn add_days_stops_at_year_9999() {
        let last = parse_date("9999-12-31").unwrap();
        assert!(matches!(
            add_days(last, 1),
            Err(DateError::OutOfRange { days: 1, .. })
        ));
        assert!(add_days(NaiveDate::MAX, 1).is_err());
        assert_eq!(
            add_days(parse_date("2024-12-31").unwrap(), 1).unwrap(),
            parse_date("2025-01-01").unwrap()
        );
    }

    #[test]
    fn fixed_clock_reports_its_date() {
        assert_eq!(fixed_clock().today(), fixed_today());
    }
}
