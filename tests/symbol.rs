use chrono::NaiveDate;
use proptest::prelude::*;
use roll_tracker::model::{OptionKind, Ticker};
use roll_tracker::symbol::{
    decode_underlying, encode_symbol, is_encodable_strike, ParsedContractSymbol,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

fn ticker(s: &str) -> Ticker {
    Ticker::from_str(s).unwrap()
}

fn dec_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn encodes_whole_strike() {
    let symbol = encode_symbol(&ticker("AAPL"), dec_date(2026, 12, 18), dec!(210));
    assert_eq!(symbol, "O:AAPL261218C00210000");
}

#[test]
fn encodes_fractional_strike_in_thousandths() {
    let symbol = encode_symbol(&ticker("F"), dec_date(2027, 1, 15), dec!(12.5));
    assert_eq!(symbol, "O:F270115C00012500");
}

#[test]
fn rounds_to_nearest_milli() {
    let down = encode_symbol(&ticker("SPY"), dec_date(2026, 12, 18), dec!(450.0004));
    let up = encode_symbol(&ticker("SPY"), dec_date(2026, 12, 18), dec!(450.0005));
    assert_eq!(down, "O:SPY261218C00450000");
    assert_eq!(up, "O:SPY261218C00450001");
}

#[test]
fn parses_full_symbol() {
    let parsed = ParsedContractSymbol::from_str("O:MSFT270115P00395500").unwrap();
    assert_eq!(parsed.ticker, "MSFT");
    assert_eq!(parsed.expiry, dec_date(2027, 1, 15));
    assert_eq!(parsed.kind, OptionKind::Put);
    assert_eq!(parsed.strike, dec!(395.5));
}

#[test]
fn decode_rejects_non_conforming_strings() {
    for raw in [
        "",
        "AAPL",
        "O:",
        "O:AAPL",
        "O:aapl261218C00210000",
        "O:AAPL261218X00210000",
        "O:AAPL261318C00210000",
        "O:AAPL261218C0021000",
        "O:AAPL261218C002100000",
        "X:AAPL261218C00210000",
        "O:ÄAPL261218C00210000",
    ] {
        assert_eq!(decode_underlying(raw), None, "{raw} should not decode");
    }
}

#[test]
fn encodable_strikes_fit_eight_digits() {
    assert!(is_encodable_strike(dec!(0.001)));
    assert!(is_encodable_strike(dec!(99999.999)));
    assert!(!is_encodable_strike(Decimal::ZERO));
    assert!(!is_encodable_strike(dec!(-5)));
    assert!(!is_encodable_strike(dec!(0.0004)));
    assert!(!is_encodable_strike(dec!(100000)));

    let widest = encode_symbol(&ticker("SPY"), dec_date(2026, 12, 18), dec!(99999.999));
    assert_eq!(decode_underlying(&widest), Some("SPY".to_string()));
}

proptest! {
    #[test]
    fn underlying_round_trips(
        name in "[A-Z]{1,5}",
        days in 0i64..3650,
        cents in 1u32..500_000,
    ) {
        let t = ticker(&name);
        let expiry = dec_date(2025, 1, 1) + chrono::Duration::days(days);
        let strike = Decimal::new(cents as i64, 2);
        let symbol = encode_symbol(&t, expiry, strike);
        prop_assert_eq!(decode_underlying(&symbol), Some(name.clone()));
        let parsed = ParsedContractSymbol::from_str(&symbol).unwrap();
        prop_assert_eq!(parsed.expiry, expiry);
        prop_assert_eq!(parsed.strike, strike.normalize());
    }
}
