use crate::actionable::any_fattibile;
use crate::expiry::{shift_months, ExpiryError};
use crate::model::{OptionData, OptionEntry, QuoteBook, Ticker};
use crate::symbol::is_encodable_strike;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Strike-to-spot distance (percent) under which the tracked call is rolled.
pub const ROLL_DELTA_THRESHOLD: Decimal = dec!(4);
/// Strike offset of the synthetic comparison contracts built on a shift.
pub const SHIFT_STRIKE_STEP: Decimal = dec!(5);

#[derive(Debug, Clone, PartialEq)]
pub enum RollDecision {
    Stable,
    Shifted(OptionData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftReason {
    StrikeTooClose,
    EarlierFattibile,
}

pub fn shift_reason(position: &OptionData, quotes: &QuoteBook) -> Option<ShiftReason> {
    if position
        .delta()
        .is_some_and(|delta| delta < ROLL_DELTA_THRESHOLD)
    {
        return Some(ShiftReason::StrikeTooClose);
    }
    if any_fattibile(&position.earlier, position, quotes) {
        return Some(ShiftReason::EarlierFattibile);
    }
    None
}

/// Re-evaluated from scratch every pass; a shifted position is simply the next
/// pass's baseline.
pub fn evaluate_roll(position: &OptionData, quotes: &QuoteBook) -> Result<RollDecision, ExpiryError> {
    let Some(reason) = shift_reason(position, quotes) else {
        return Ok(RollDecision::Stable);
    };
    let shifted = shift_position(position)?;
    debug!(
        target: "roll",
        ticker = %position.ticker,
        ?reason,
        from = %position.expiry,
        to = %shifted.expiry,
        "tracked expiry advanced"
    );
    Ok(RollDecision::Shifted(shifted))
}

/// Advances the tracked expiry one month and rebuilds single synthetic comparison
/// entries around it. Quotes on the new entries start at zero; a synthetic strike
/// that cannot be listed (at or below zero) becomes a sentinel.
pub fn shift_position(position: &OptionData) -> Result<OptionData, ExpiryError> {
    let expiry = shift_months(position.expiry, 1)?;
    let earlier_expiry = shift_months(expiry, -1)?;
    let future_expiry = shift_months(expiry, 1)?;
    let ticker = &position.ticker;
    Ok(OptionData {
        expiry,
        earlier: vec![synthetic_entry(
            ticker,
            earlier_expiry,
            position.strike - SHIFT_STRIKE_STEP,
        )],
        future: vec![synthetic_entry(
            ticker,
            future_expiry,
            position.strike + SHIFT_STRIKE_STEP,
        )],
        ..position.clone()
    })
}

fn synthetic_entry(ticker: &Ticker, expiry: NaiveDate, strike: Decimal) -> OptionEntry {
    if is_encodable_strike(strike) {
        OptionEntry::contract(ticker, expiry, strike)
    } else {
        OptionEntry::sentinel()
    }
}
