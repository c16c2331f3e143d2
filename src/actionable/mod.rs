//! The "fattibile" check: is a comparison contract worth rolling into right now?
//!
//! Candidates are priced bid-first (what we would receive selling them), the tracked
//! contract ask-first (what it costs to buy it back).

use crate::model::{OptionData, OptionEntry, QuoteBook};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Minimum out-of-the-money cushion for a candidate strike, as a spot multiplier.
pub const OTM_CUSHION: Decimal = dec!(1.04);

/// Live price of a comparison contract; a quote miss falls back to the entry's
/// stored snapshot.
pub fn candidate_price(candidate: &OptionEntry, quotes: &QuoteBook) -> Decimal {
    let live = candidate
        .symbol
        .as_deref()
        .and_then(|symbol| quotes.quote(symbol));
    match live {
        Some(quote) => positive_or(quote.bid, quote.last_trade_price),
        None => positive_or(candidate.bid, candidate.last_trade_price),
    }
}

/// Live price of the tracked contract, falling back to the stored ask/last.
pub fn tracked_price(position: &OptionData, quotes: &QuoteBook) -> Decimal {
    let stored = positive_or(position.current_ask, position.current_last_trade_price);
    match quotes.quote(&position.current_symbol()) {
        Some(quote) if quote.ask > Decimal::ZERO => quote.ask,
        Some(quote) if quote.last_trade_price > Decimal::ZERO => quote.last_trade_price,
        _ => stored,
    }
}

/// Never true without a positive spot: the cushion test is meaningless against zero.
pub fn is_fattibile(candidate: &OptionEntry, position: &OptionData, quotes: &QuoteBook) -> bool {
    let spot = position.spot;
    if spot <= Decimal::ZERO {
        return false;
    }
    let Some(strike) = candidate.strike else {
        return false;
    };
    let offered = candidate_price(candidate, quotes);
    if offered <= Decimal::ZERO {
        return false;
    }
    let cost = tracked_price(position, quotes);
    if cost <= Decimal::ZERO {
        return false;
    }
    spot < strike && strike >= spot * OTM_CUSHION && offered >= cost
}

pub fn any_fattibile(entries: &[OptionEntry], position: &OptionData, quotes: &QuoteBook) -> bool {
    entries
        .iter()
        .any(|entry| is_fattibile(entry, position, quotes))
}

fn positive_or(preferred: Decimal, fallback: Decimal) -> Decimal {
    if preferred > Decimal::ZERO {
        preferred
    } else {
        fallback
    }
}
