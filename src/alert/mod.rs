use crate::actionable::{candidate_price, is_fattibile, tracked_price};
use crate::model::{AlertLevel, OptionData, OptionEntry, QuoteBook, SentMarker};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

/// A notification the dispatcher must deliver, once, after persisting its marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub marker: SentMarker,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertInput<'a> {
    pub position: &'a OptionData,
    pub quotes: &'a QuoteBook,
    pub enabled: bool,
    pub already_sent: &'a HashSet<AlertLevel>,
}

pub fn evaluate_alerts(input: AlertInput<'_>) -> Vec<AlertEvent> {
    let AlertInput {
        position,
        quotes,
        enabled,
        already_sent,
    } = input;
    if !enabled || position.spot <= Decimal::ZERO {
        return Vec::new();
    }
    let current = tracked_price(position, quotes);
    if current <= Decimal::ZERO || !all_priced(&position.future, quotes) {
        return Vec::new();
    }
    let Some(delta) = position.delta() else {
        return Vec::new();
    };

    let mut events: Vec<AlertEvent> = AlertLevel::THRESHOLDS
        .iter()
        .filter(|level| !already_sent.contains(*level))
        .filter(|level| level.threshold().is_some_and(|limit| delta < limit))
        .map(|level| AlertEvent {
            marker: marker(position, *level),
            message: roll_message(position, *level, delta, current),
        })
        .collect();

    if !already_sent.contains(&AlertLevel::FattibileHigh) && all_priced(&position.earlier, quotes)
    {
        if let Some(entry) = position
            .earlier
            .iter()
            .find(|entry| is_fattibile(entry, position, quotes))
        {
            events.push(AlertEvent {
                marker: marker(position, AlertLevel::FattibileHigh),
                message: earlier_message(position, entry, candidate_price(entry, quotes), current),
            });
        }
    }
    events
}

fn all_priced(entries: &[OptionEntry], quotes: &QuoteBook) -> bool {
    !entries.is_empty()
        && entries
            .iter()
            .all(|entry| candidate_price(entry, quotes) > Decimal::ZERO)
}

fn marker(position: &OptionData, level: AlertLevel) -> SentMarker {
    SentMarker {
        owner: position.owner.clone(),
        ticker: position.ticker.clone(),
        level,
    }
}

pub fn roll_message(position: &OptionData, level: AlertLevel, delta: Decimal, price: Decimal) -> String {
    format!(
        "ROLL {ticker}: strike {strike} is {delta}% above spot {spot} (under {level}%).\n\
         Current call {label} @ {price}.",
        ticker = position.ticker,
        strike = position.strike.normalize(),
        delta = delta.round_dp(2),
        spot = position.spot.round_dp(2),
        level = level,
        label = position.current_label(),
        price = price.round_dp(2),
    )
}

pub fn earlier_message(
    position: &OptionData,
    entry: &OptionEntry,
    offered: Decimal,
    cost: Decimal,
) -> String {
    format!(
        "EARLIER {ticker}: {candidate} @ {offered} covers current call {label} @ {cost} \
         (spot {spot}).",
        ticker = position.ticker,
        candidate = entry.label,
        offered = offered.round_dp(2),
        label = position.current_label(),
        cost = cost.round_dp(2),
        spot = position.spot.round_dp(2),
    )
}
