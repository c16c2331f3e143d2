use chrono::NaiveDate;
use roll_tracker::model::{ContractQuote, OptionData, OptionEntry, OwnerId, QuoteBook, Ticker};
use roll_tracker::roll::{evaluate_roll, shift_reason, RollDecision, ShiftReason};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn ticker() -> Ticker {
    Ticker::from_str("ACME").unwrap()
}

fn position(spot: Decimal, strike: Decimal) -> OptionData {
    let mut p = OptionData::new(OwnerId::new("u1"), ticker(), strike, d(2026, 12, 18));
    p.spot = spot;
    p
}

#[test]
fn strike_within_four_percent_shifts() {
    let p = position(dec!(100), dec!(103));
    let decision = evaluate_roll(&p, &QuoteBook::new()).unwrap();
    let RollDecision::Shifted(shifted) = decision else {
        panic!("expected a shift");
    };
    assert_eq!(shifted.expiry, d(2027, 1, 15));
    assert_eq!(shifted.strike, dec!(103));

    assert_eq!(shifted.earlier.len(), 1);
    assert_eq!(shifted.earlier[0].expiry, Some(d(2026, 12, 18)));
    assert_eq!(shifted.earlier[0].strike, Some(dec!(98)));
    assert_eq!(shifted.future.len(), 1);
    assert_eq!(shifted.future[0].expiry, Some(d(2027, 2, 19)));
    assert_eq!(shifted.future[0].strike, Some(dec!(108)));
    assert_eq!(shifted.future[0].bid, Decimal::ZERO);
}

#[test]
fn comfortable_strike_without_actionable_earlier_is_stable() {
    let p = position(dec!(100), dec!(110));
    assert_eq!(
        evaluate_roll(&p, &QuoteBook::new()).unwrap(),
        RollDecision::Stable
    );
}

#[test]
fn actionable_earlier_contract_shifts() {
    let mut p = position(dec!(100), dec!(115));
    let earlier = OptionEntry::contract(&ticker(), d(2026, 11, 20), dec!(108));
    p.earlier = vec![earlier.clone()];
    let mut book = QuoteBook::new();
    book.insert_quote(
        earlier.symbol.clone().unwrap(),
        ContractQuote {
            bid: dec!(5),
            ask: dec!(5.2),
            last_trade_price: dec!(5.1),
        },
    );
    book.insert_quote(
        p.current_symbol(),
        ContractQuote {
            bid: dec!(4.3),
            ask: dec!(4.5),
            last_trade_price: dec!(4.4),
        },
    );
    assert_eq!(shift_reason(&p, &book), Some(ShiftReason::EarlierFattibile));
    assert!(matches!(
        evaluate_roll(&p, &book).unwrap(),
        RollDecision::Shifted(_)
    ));
}

#[test]
fn missing_spot_never_triggers_on_delta() {
    let p = position(Decimal::ZERO, dec!(103));
    assert_eq!(shift_reason(&p, &QuoteBook::new()), None);
}

#[test]
fn shift_crosses_year_end() {
    let mut p = position(dec!(100), dec!(101));
    p.expiry = d(2026, 11, 20);
    let RollDecision::Shifted(shifted) = evaluate_roll(&p, &QuoteBook::new()).unwrap() else {
        panic!("expected a shift");
    };
    assert_eq!(shifted.expiry, d(2026, 12, 18));
    assert_eq!(shifted.earlier[0].expiry, Some(d(2026, 11, 20)));
    assert_eq!(shifted.future[0].expiry, Some(d(2027, 1, 15)));
}

#[test]
fn low_strike_shift_leaves_unlistable_earlier_slot_empty() {
    let p = position(dec!(100), dec!(4));
    let RollDecision::Shifted(shifted) = evaluate_roll(&p, &QuoteBook::new()).unwrap() else {
        panic!("expected a shift");
    };
    assert!(shifted.earlier[0].is_sentinel());
    assert_eq!(shifted.future[0].strike, Some(dec!(9)));
}

#[test]
fn zero_spot_with_priced_earlier_entry_stays_stable() {
    let mut p = position(Decimal::ZERO, dec!(110));
    p.current_ask = dec!(4.2);
    let earlier = OptionEntry::contract(&ticker(), d(2026, 11, 20), dec!(108));
    p.earlier = vec![earlier.clone()];
    let mut book = QuoteBook::new();
    book.insert_quote(
        earlier.symbol.clone().unwrap(),
        ContractQuote {
            bid: dec!(5),
            ask: dec!(5.2),
            last_trade_price: dec!(5.1),
        },
    );
    assert_eq!(evaluate_roll(&p, &book).unwrap(), RollDecision::Stable);
}
