use crate::model::{OptionKind, ParseSymbolError, Ticker};
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::*;
use std::str::FromStr;

pub const SYMBOL_PREFIX: &str = "O:";
const STRIKE_SCALE: u32 = 3;
/// Eight strike digits in thousandths.
const MAX_STRIKE_MILLIS: u64 = 99_999_999;

/// `O:` + ticker + `YYMMDD` + `C` + strike in thousandths, zero padded to 8 digits.
///
/// Only strikes accepted by [`is_encodable_strike`] produce a decodable symbol;
/// callers filter or reject anything else before building contracts.
pub fn encode_symbol(ticker: &Ticker, expiry: NaiveDate, strike: Decimal) -> String {
    format!(
        "{SYMBOL_PREFIX}{}{:02}{:02}{:02}{}{:08}",
        ticker,
        expiry.year().rem_euclid(100),
        expiry.month(),
        expiry.day(),
        OptionKind::Call,
        strike_millis(strike)
    )
}

/// Underlying ticker of a well-formed contract symbol.
pub fn decode_underlying(symbol: &str) -> Option<String> {
    ParsedContractSymbol::from_str(symbol)
        .ok()
        .map(|parsed| parsed.ticker)
}

/// Positive and small enough to fit the eight-digit strike field once rounded.
pub fn is_encodable_strike(strike: Decimal) -> bool {
    strike > Decimal::ZERO && (1..=MAX_STRIKE_MILLIS).contains(&strike_millis(strike))
}

fn strike_millis(strike: Decimal) -> u64 {
    (strike * Decimal::from(10u64.pow(STRIKE_SCALE)))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContractSymbol {
    pub ticker: String,
    pub expiry: NaiveDate,
    pub kind: OptionKind,
    pub strike: Decimal,
}

impl FromStr for ParsedContractSymbol {
    type Err = ParseSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Format e.g. O:AAPL261218C00210000
        let body = s
            .strip_prefix(SYMBOL_PREFIX)
            .filter(|body| body.is_ascii())
            .ok_or_else(|| ParseSymbolError::InvalidFormat(s.to_string()))?;
        let ticker_len = body
            .bytes()
            .take_while(|b| b.is_ascii_uppercase())
            .count();
        let tail = &body[ticker_len..];
        if !(1..=6).contains(&ticker_len) || tail.len() != 15 {
            return Err(ParseSymbolError::InvalidFormat(s.to_string()));
        }

        let (date_part, rest) = tail.split_at(6);
        let (kind_part, strike_part) = rest.split_at(1);
        if !date_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseSymbolError::InvalidExpiry(date_part.to_string()));
        }
        if !strike_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseSymbolError::InvalidStrike(strike_part.to_string()));
        }

        let expiry = NaiveDate::parse_from_str(&format!("20{date_part}"), "%Y%m%d")
            .map_err(|_| ParseSymbolError::InvalidExpiry(date_part.to_string()))?;
        let kind = kind_part.parse()?;
        let millis = strike_part
            .parse::<i64>()
            .map_err(|_| ParseSymbolError::InvalidStrike(strike_part.to_string()))?;

        Ok(Self {
            ticker: body[..ticker_len].to_string(),
            expiry,
            kind,
            strike: Decimal::new(millis, STRIKE_SCALE).normalize(),
        })
    }
}
