//! Standard monthly expiration arithmetic.
//!
//! U.S. equity options settle on the third Friday of the month. Everything in the
//! tracker speaks in those dates, formatted `YYYY-MM-DD`.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpiryError {
    #[error("month out of range: {0}")]
    InvalidMonth(u32),
    #[error("unparseable expiry: {0:?}")]
    Unparseable(String),
    #[error("expiry arithmetic overflowed from {0}")]
    OutOfRange(NaiveDate),
}

/// Third Friday of `month` (1-12) in `year`.
///
/// Falls back to the 15th if fewer than three Fridays are found, which no real
/// calendar month produces.
pub fn third_friday(year: i32, month: u32) -> Result<NaiveDate, ExpiryError> {
    if !(1..=12).contains(&month) {
        return Err(ExpiryError::InvalidMonth(month));
    }
    let mut fridays = 0;
    for day in 1..=31 {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };
        if date.weekday() == Weekday::Fri {
            fridays += 1;
            if fridays == 3 {
                return Ok(date);
            }
        }
    }
    NaiveDate::from_ymd_opt(year, month, 15).ok_or(ExpiryError::InvalidMonth(month))
}

/// `YYYY-MM` becomes that month's third Friday; anything else is passed through.
pub fn normalize_expiry(input: &str) -> String {
    if let Some((year, month)) = parse_year_month(input) {
        if let Ok(date) = third_friday(year, month) {
            return date.format(DATE_FORMAT).to_string();
        }
    }
    input.to_string()
}

/// Normalizes then parses a user supplied expiry.
pub fn parse_expiry(input: &str) -> Result<NaiveDate, ExpiryError> {
    let normalized = normalize_expiry(input.trim());
    NaiveDate::parse_from_str(&normalized, DATE_FORMAT)
        .map_err(|_| ExpiryError::Unparseable(input.to_string()))
}

pub fn format_expiry(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn is_standard_monthly_expiry(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Fri && (15..=21).contains(&date.day())
}

/// Third Friday of the month `months` away from `date`'s month.
pub fn shift_months(date: NaiveDate, months: i32) -> Result<NaiveDate, ExpiryError> {
    let first = date.with_day(1).ok_or(ExpiryError::OutOfRange(date))?;
    let step = Months::new(months.unsigned_abs());
    let target = if months >= 0 {
        first.checked_add_months(step)
    } else {
        first.checked_sub_months(step)
    }
    .ok_or(ExpiryError::OutOfRange(date))?;
    third_friday(target.year(), target.month())
}

/// Expiry given to a freshly added ticker: two months out.
pub fn default_expiry(today: NaiveDate) -> Result<NaiveDate, ExpiryError> {
    shift_months(today, 2)
}

fn parse_year_month(input: &str) -> Option<(i32, u32)> {
    let bytes = input.as_bytes();
    if !input.is_ascii() || bytes.len() != 7 || bytes[4] != b'-' {
        return None;
    }
    if !input[..4].bytes().all(|b| b.is_ascii_digit())
        || !input[5..].bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let year = input[..4].parse().ok()?;
    let month = input[5..].parse().ok()?;
    Some((year, month))
}
