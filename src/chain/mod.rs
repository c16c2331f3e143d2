use crate::expiry::is_standard_monthly_expiry;
use crate::model::{OptionContract, OptionEntry, OptionKind, Ticker};
use crate::symbol::is_encodable_strike;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Which neighbour to look for relative to a reference strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Higher,
    Lower,
}

/// Which side of the tracked expiry a comparison ladder covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderSide {
    Earlier,
    Future,
}

impl LadderSide {
    fn direction(self) -> Direction {
        match self {
            LadderSide::Earlier => Direction::Lower,
            LadderSide::Future => Direction::Higher,
        }
    }
}

pub const LADDER_DEPTH: usize = 2;

/// Monthly call strikes for one underlying, grouped by expiry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainLadder {
    by_expiry: BTreeMap<NaiveDate, Vec<Decimal>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderStats {
    pub expiries: usize,
    pub strikes: usize,
}

impl ChainLadder {
    pub fn build(contracts: &[OptionContract]) -> Self {
        let mut by_expiry: BTreeMap<NaiveDate, Vec<Decimal>> = BTreeMap::new();
        for contract in contracts {
            if contract.kind != OptionKind::Call
                || !is_standard_monthly_expiry(contract.expiration)
                || !is_encodable_strike(contract.strike)
            {
                continue;
            }
            by_expiry
                .entry(contract.expiration)
                .or_default()
                .push(contract.strike);
        }
        for strikes in by_expiry.values_mut() {
            strikes.sort();
            strikes.dedup();
        }
        Self { by_expiry }
    }

    pub fn expiries(&self) -> impl Iterator<Item = &NaiveDate> {
        self.by_expiry.keys()
    }

    pub fn strikes(&self, expiry: NaiveDate) -> &[Decimal] {
        self.by_expiry
            .get(&expiry)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_expiry.is_empty()
    }

    pub fn stats(&self) -> LadderStats {
        LadderStats {
            expiries: self.by_expiry.len(),
            strikes: self.by_expiry.values().map(Vec::len).sum(),
        }
    }

    /// Nearest strike beyond `reference` in `direction`, falling back to an equal
    /// strike and then to the extreme strike of the expiry.
    pub fn select_adjacent(
        &self,
        expiry: NaiveDate,
        reference: Decimal,
        direction: Direction,
    ) -> Option<Decimal> {
        let strikes = self.strikes(expiry);
        let strict = match direction {
            Direction::Higher => strikes.iter().find(|s| **s > reference),
            Direction::Lower => strikes.iter().rev().find(|s| **s < reference),
        };
        strict
            .or_else(|| strikes.iter().find(|s| **s == reference))
            .or_else(|| match direction {
                Direction::Higher => strikes.last(),
                Direction::Lower => strikes.first(),
            })
            .copied()
    }

    /// Two comparison contracts on one side of `expiry`, nearest first. Slots that
    /// cannot be filled are sentinel entries.
    pub fn comparison_ladder(
        &self,
        ticker: &Ticker,
        expiry: NaiveDate,
        strike: Decimal,
        side: LadderSide,
    ) -> Vec<OptionEntry> {
        let walk: Vec<NaiveDate> = match side {
            LadderSide::Future => self.by_expiry.range(expiry..).map(|(d, _)| *d).collect(),
            LadderSide::Earlier => self
                .by_expiry
                .range(..expiry)
                .rev()
                .map(|(d, _)| *d)
                .collect(),
        };

        let mut entries = Vec::with_capacity(LADDER_DEPTH);
        let mut reference = strike;
        let mut candidates = walk.into_iter().filter(|d| *d != expiry);
        while entries.len() < LADDER_DEPTH {
            let found = candidates.by_ref().find_map(|date| {
                self.select_adjacent(date, reference, side.direction())
                    .map(|s| (date, s))
            });
            let Some((date, selected)) = found else {
                break;
            };
            entries.push(OptionEntry::contract(ticker, date, selected));
            reference = selected;
        }
        entries.resize_with(LADDER_DEPTH, OptionEntry::sentinel);
        entries
    }
}
