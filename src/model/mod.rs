use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

pub const SENTINEL_LABEL: &str = "OPZIONE INESISTENTE";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Underlying equity symbol: one to five ASCII letters, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = TickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.len() > 5 {
            return Err(TickerError::InvalidLength(s.to_string()));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TickerError::InvalidCharacters(s.to_string()));
        }
        Ok(Ticker(trimmed.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for Ticker {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TickerError {
    #[error("ticker must be 1-5 letters: {0:?}")]
    InvalidLength(String),
    #[error("ticker may only contain letters: {0:?}")]
    InvalidCharacters(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Call,
    Put,
}

impl Display for OptionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionKind::Call => write!(f, "C"),
            OptionKind::Put => write!(f, "P"),
        }
    }
}

impl FromStr for OptionKind {
    type Err = ParseSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "C" | "CALL" => Ok(OptionKind::Call),
            "P" | "PUT" => Ok(OptionKind::Put),
            other => Err(ParseSymbolError::UnknownOptionKind(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseSymbolError {
    #[error("invalid contract symbol format: {0}")]
    InvalidFormat(String),
    #[error("unknown option kind: {0}")]
    UnknownOptionKind(String),
    #[error("invalid expiry in symbol: {0}")]
    InvalidExpiry(String),
    #[error("invalid strike in symbol: {0}")]
    InvalidStrike(String),
}

/// One listed option contract as returned by the provider's reference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionContract {
    pub symbol: String,
    pub underlying: Ticker,
    pub kind: OptionKind,
    pub expiration: NaiveDate,
    pub strike: Decimal,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ContractQuote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last_trade_price: Decimal,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SpotQuote {
    pub price: Decimal,
    pub change_percent: Decimal,
}

/// A labelled reference to a comparison contract. Replaced wholesale, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionEntry {
    pub label: String,
    pub strike: Option<Decimal>,
    pub expiry: Option<NaiveDate>,
    pub symbol: Option<String>,
    #[serde(default)]
    pub bid: Decimal,
    #[serde(default)]
    pub ask: Decimal,
    #[serde(default)]
    pub last_trade_price: Decimal,
}

impl OptionEntry {
    pub fn contract(ticker: &Ticker, expiry: NaiveDate, strike: Decimal) -> Self {
        Self {
            label: contract_label(ticker, expiry, strike),
            strike: Some(strike),
            expiry: Some(expiry),
            symbol: Some(crate::symbol::encode_symbol(ticker, expiry, strike)),
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            last_trade_price: Decimal::ZERO,
        }
    }

    pub fn sentinel() -> Self {
        Self {
            label: SENTINEL_LABEL.to_string(),
            strike: None,
            expiry: None,
            symbol: None,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            last_trade_price: Decimal::ZERO,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.symbol.is_none()
    }

    pub fn with_quote(&self, quote: ContractQuote) -> Self {
        Self {
            bid: quote.bid,
            ask: quote.ask,
            last_trade_price: quote.last_trade_price,
            ..self.clone()
        }
    }
}

pub fn contract_label(ticker: &Ticker, expiry: NaiveDate, strike: Decimal) -> String {
    format!(
        "{} {} C{}",
        ticker,
        expiry.format("%Y-%m-%d"),
        strike.normalize()
    )
}

/// The tracked call for one (owner, ticker) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionData {
    pub owner: OwnerId,
    pub ticker: Ticker,
    #[serde(default)]
    pub spot: Decimal,
    #[serde(default)]
    pub change_percent: Decimal,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    #[serde(default)]
    pub current_bid: Decimal,
    #[serde(default)]
    pub current_ask: Decimal,
    #[serde(default)]
    pub current_last_trade_price: Decimal,
    #[serde(default)]
    pub earlier: Vec<OptionEntry>,
    #[serde(default)]
    pub future: Vec<OptionEntry>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OptionData {
    pub fn new(owner: OwnerId, ticker: Ticker, strike: Decimal, expiry: NaiveDate) -> Self {
        Self {
            owner,
            ticker,
            spot: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            strike,
            expiry,
            current_bid: Decimal::ZERO,
            current_ask: Decimal::ZERO,
            current_last_trade_price: Decimal::ZERO,
            earlier: Vec::new(),
            future: Vec::new(),
            updated_at: None,
        }
    }

    pub fn current_symbol(&self) -> String {
        crate::symbol::encode_symbol(&self.ticker, self.expiry, self.strike)
    }

    pub fn current_label(&self) -> String {
        contract_label(&self.ticker, self.expiry, self.strike)
    }

    /// Percent distance of the strike above spot. `None` without a positive spot.
    pub fn delta(&self) -> Option<Decimal> {
        strike_delta(self.strike, self.spot)
    }

    /// Every contract symbol this position needs a live quote for.
    pub fn referenced_symbols(&self) -> Vec<String> {
        let mut symbols = vec![self.current_symbol()];
        symbols.extend(
            self.earlier
                .iter()
                .chain(self.future.iter())
                .filter_map(|entry| entry.symbol.clone()),
        );
        symbols
    }
}

pub fn strike_delta(strike: Decimal, spot: Decimal) -> Option<Decimal> {
    if spot <= Decimal::ZERO {
        return None;
    }
    Some((strike - spot) / spot * Decimal::ONE_HUNDRED)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertLevel {
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "fattibile_high")]
    FattibileHigh,
}

impl AlertLevel {
    /// Delta thresholds, checked in this order.
    pub const THRESHOLDS: [AlertLevel; 4] = [
        AlertLevel::Four,
        AlertLevel::Three,
        AlertLevel::Two,
        AlertLevel::One,
    ];

    pub fn threshold(&self) -> Option<Decimal> {
        match self {
            AlertLevel::Four => Some(Decimal::from(4)),
            AlertLevel::Three => Some(Decimal::from(3)),
            AlertLevel::Two => Some(Decimal::from(2)),
            AlertLevel::One => Some(Decimal::ONE),
            AlertLevel::FattibileHigh => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Four => "4",
            AlertLevel::Three => "3",
            AlertLevel::Two => "2",
            AlertLevel::One => "1",
            AlertLevel::FattibileHigh => "fattibile_high",
        }
    }
}

impl Display for AlertLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = ParseAlertLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "4" => Ok(AlertLevel::Four),
            "3" => Ok(AlertLevel::Three),
            "2" => Ok(AlertLevel::Two),
            "1" => Ok(AlertLevel::One),
            "fattibile_high" => Ok(AlertLevel::FattibileHigh),
            other => Err(ParseAlertLevelError(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown alert level: {0}")]
pub struct ParseAlertLevelError(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SentMarker {
    pub owner: OwnerId,
    pub ticker: Ticker,
    pub level: AlertLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertEnablement {
    pub owner: OwnerId,
    pub ticker: Ticker,
    pub enabled: bool,
}

/// Live prices gathered for one refresh pass, keyed by contract symbol or ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteBook {
    contracts: HashMap<String, ContractQuote>,
    spots: HashMap<String, SpotQuote>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_quote(&mut self, symbol: impl Into<String>, quote: ContractQuote) {
        self.contracts.insert(symbol.into(), quote);
    }

    pub fn insert_spot(&mut self, ticker: &Ticker, spot: SpotQuote) {
        self.spots.insert(ticker.to_string(), spot);
    }

    pub fn quote(&self, symbol: &str) -> Option<&ContractQuote> {
        self.contracts.get(symbol)
    }

    pub fn spot(&self, ticker: &Ticker) -> Option<&SpotQuote> {
        self.spots.get(ticker.as_str())
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }
}
