use chrono::{Datelike, NaiveDate, Weekday};
use proptest::prelude::*;
use roll_tracker::expiry::{
    default_expiry, is_standard_monthly_expiry, normalize_expiry, parse_expiry, shift_months,
    third_friday, ExpiryError,
};
use rstest::rstest;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[rstest]
#[case(2026, 10, date(2026, 10, 16))]
#[case(2026, 12, date(2026, 12, 18))]
#[case(2027, 1, date(2027, 1, 15))]
#[case(2024, 2, date(2024, 2, 16))]
fn third_friday_known_months(#[case] year: i32, #[case] month: u32, #[case] expected: NaiveDate) {
    assert_eq!(third_friday(year, month).unwrap(), expected);
}

#[test]
fn third_friday_rejects_bad_month() {
    assert_eq!(third_friday(2026, 13), Err(ExpiryError::InvalidMonth(13)));
    assert_eq!(third_friday(2026, 0), Err(ExpiryError::InvalidMonth(0)));
}

#[test]
fn normalize_expands_year_month() {
    assert_eq!(normalize_expiry("2026-12"), "2026-12-18");
}

#[rstest]
#[case("2026-12-11")]
#[case("2026-12-18")]
#[case("next month")]
#[case("2026-13")]
#[case("")]
fn normalize_passes_through_other_shapes(#[case] input: &str) {
    assert_eq!(normalize_expiry(input), input);
}

#[rstest]
#[case(date(2026, 12, 18), true)]
#[case(date(2026, 12, 11), false)]
#[case(date(2026, 11, 27), false)]
#[case(date(2026, 12, 17), false)]
#[case(date(2027, 1, 15), true)]
fn standard_monthly_window(#[case] input: NaiveDate, #[case] expected: bool) {
    assert_eq!(is_standard_monthly_expiry(input), expected);
}

#[test]
fn shift_months_crosses_year_boundaries() {
    assert_eq!(shift_months(date(2026, 12, 18), 1).unwrap(), date(2027, 1, 15));
    assert_eq!(shift_months(date(2027, 1, 15), -1).unwrap(), date(2026, 12, 18));
    assert_eq!(shift_months(date(2026, 11, 20), 3).unwrap(), date(2027, 2, 19));
}

#[test]
fn default_expiry_is_two_months_out() {
    assert_eq!(default_expiry(date(2026, 10, 18)).unwrap(), date(2026, 12, 18));
    assert_eq!(default_expiry(date(2026, 11, 30)).unwrap(), date(2027, 1, 15));
}

#[test]
fn parse_expiry_accepts_both_shapes() {
    assert_eq!(parse_expiry("2027-01").unwrap(), date(2027, 1, 15));
    assert_eq!(parse_expiry(" 2027-01-15 ").unwrap(), date(2027, 1, 15));
    assert!(matches!(parse_expiry("Jan 2027"), Err(ExpiryError::Unparseable(_))));
}

proptest! {
    #[test]
    fn third_friday_is_friday_in_window(year in 1970i32..2200, month in 1u32..=12) {
        let friday = third_friday(year, month).unwrap();
        prop_assert_eq!(friday.weekday(), Weekday::Fri);
        prop_assert!((15..=21).contains(&friday.day()));
        prop_assert_eq!(friday.month(), month);
        prop_assert!(is_standard_monthly_expiry(friday));
    }

    #[test]
    fn normalize_is_idempotent_for_year_month(year in 1970i32..2200, month in 1u32..=12) {
        let input = format!("{year:04}-{month:02}");
        let once = normalize_expiry(&input);
        prop_assert_eq!(normalize_expiry(&once), once);
    }

    #[test]
    fn normalize_is_idempotent_for_full_dates(year in 1970i32..2200, month in 1u32..=12, day in 1u32..=28) {
        let input = format!("{year:04}-{month:02}-{day:02}");
        let once = normalize_expiry(&input);
        prop_assert_eq!(&once, &input);
        prop_assert_eq!(normalize_expiry(&once), once);
    }
}
