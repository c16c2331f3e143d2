use crate::alert::{evaluate_alerts, AlertEvent, AlertInput};
use crate::chain::{ChainLadder, Direction, LadderSide};
use crate::client::MarketData;
use crate::expiry::{default_expiry, parse_expiry};
use crate::model::{AlertLevel, OptionData, OptionEntry, OwnerId, QuoteBook, Ticker};
use crate::notify::Notifier;
use crate::store::{PositionStore, StoreError};
use crate::symbol::is_encodable_strike;
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, error, info, warn};

pub use crate::roll::{evaluate_roll, RollDecision};

/// Spot multiplier used to pick a strike when a ticker is added without one.
pub const DEFAULT_STRIKE_CUSHION: Decimal = dec!(1.10);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Chat or channel every alert is delivered to.
    pub destination: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub positions_updated: usize,
    pub alerts_fired: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    pub position: OptionData,
    pub alerts_enabled: bool,
    pub delta: Option<Decimal>,
    pub sent_levels: BTreeSet<AlertLevel>,
}

type PositionKey = (OwnerId, Ticker);

pub struct RollEngine<'a, S: ?Sized, M: ?Sized, N: ?Sized> {
    store: &'a S,
    market: &'a M,
    notifier: &'a N,
    settings: EngineSettings,
}

impl<'a, S, M, N> RollEngine<'a, S, M, N>
where
    S: PositionStore + ?Sized,
    M: MarketData + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(store: &'a S, market: &'a M, notifier: &'a N, settings: EngineSettings) -> Self {
        Self {
            store,
            market,
            notifier,
            settings,
        }
    }

    /// One scheduled pass over every tracked position of every owner.
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        let positions = self
            .store
            .positions(None)
            .await
            .context("failed to load positions")?;
        let enabled: HashSet<PositionKey> = self
            .store
            .alert_enablement(None)
            .await
            .context("failed to load alert enablement")?
            .into_iter()
            .filter(|e| e.enabled)
            .map(|e| (e.owner, e.ticker))
            .collect();
        let mut sent: HashMap<PositionKey, HashSet<AlertLevel>> = HashMap::new();
        for marker in self
            .store
            .sent_markers(None)
            .await
            .context("failed to load alert markers")?
        {
            sent.entry((marker.owner, marker.ticker))
                .or_default()
                .insert(marker.level);
        }

        let mut book = self.collect_quotes(&positions).await?;
        info!(
            target: "refresh",
            positions = positions.len(),
            quotes = book.contract_count(),
            "quotes collected"
        );

        let none_sent = HashSet::new();
        let mut report = RefreshReport::default();
        let mut events: Vec<AlertEvent> = Vec::new();
        for position in positions {
            let key = (position.owner.clone(), position.ticker.clone());
            let updated = match self.refresh_position(position, &mut book).await {
                Ok(updated) => updated,
                Err(err) => {
                    error!(target: "refresh", ticker = %key.1, error = %err, "position skipped");
                    continue;
                }
            };
            events.extend(evaluate_alerts(AlertInput {
                position: &updated,
                quotes: &book,
                enabled: enabled.contains(&key),
                already_sent: sent.get(&key).unwrap_or(&none_sent),
            }));
            match self.store.upsert_position(&updated).await {
                Ok(()) => report.positions_updated += 1,
                Err(err) => {
                    error!(target: "store", ticker = %key.1, error = %err, "failed to persist position")
                }
            }
        }

        report.alerts_fired = self.dispatch(events).await;
        info!(
            target: "refresh",
            updated = report.positions_updated,
            alerts = report.alerts_fired,
            "refresh complete"
        );
        Ok(report)
    }

    async fn refresh_position(
        &self,
        mut position: OptionData,
        book: &mut QuoteBook,
    ) -> Result<OptionData> {
        apply_spot(&mut position, book);

        if let RollDecision::Shifted(shifted) = evaluate_roll(&position, book)? {
            info!(
                target: "roll",
                ticker = %position.ticker,
                owner = %position.owner,
                from = %position.expiry,
                to = %shifted.expiry,
                "tracked call shifted"
            );
            self.fetch_quotes_into(book, shifted.referenced_symbols())
                .await;
            position = shifted;
        }
        Ok(apply_quotes(position, book))
    }

    /// Spots for every ticker plus quotes for every referenced contract. Individual
    /// misses are tolerated; a batch where every request failed is not.
    async fn collect_quotes(&self, positions: &[OptionData]) -> Result<QuoteBook> {
        let tickers: BTreeSet<Ticker> = positions.iter().map(|p| p.ticker.clone()).collect();
        let symbols: BTreeSet<String> = positions
            .iter()
            .flat_map(OptionData::referenced_symbols)
            .collect();

        let spot_results = join_all(tickers.iter().map(|t| self.market.fetch_spot(t))).await;
        let quote_results = join_all(symbols.iter().map(|s| self.market.fetch_quote(s))).await;

        let requests = spot_results.len() + quote_results.len();
        let mut failures = 0;
        let mut book = QuoteBook::new();
        for (ticker, result) in tickers.iter().zip(spot_results) {
            match result {
                Ok(spot) => book.insert_spot(ticker, spot),
                Err(err) => {
                    failures += 1;
                    warn!(target: "provider", ticker = %ticker, error = %err, "spot unavailable");
                }
            }
        }
        for (symbol, result) in symbols.iter().zip(quote_results) {
            match result {
                Ok(Some(quote)) => book.insert_quote(symbol.clone(), quote),
                Ok(None) => debug!(target: "provider", symbol = %symbol, "no quote"),
                Err(err) => {
                    failures += 1;
                    warn!(target: "provider", symbol = %symbol, error = %err, "quote unavailable");
                }
            }
        }
        if requests > 0 && failures == requests {
            bail!("market data unreachable: all {requests} requests failed");
        }
        Ok(book)
    }

    async fn fetch_quotes_into(&self, book: &mut QuoteBook, symbols: Vec<String>) {
        let results = join_all(symbols.iter().map(|s| self.market.fetch_quote(s))).await;
        for (symbol, result) in symbols.into_iter().zip(results) {
            match result {
                Ok(Some(quote)) => book.insert_quote(symbol, quote),
                Ok(None) => debug!(target: "provider", symbol = %symbol, "no quote"),
                Err(err) => {
                    warn!(target: "provider", symbol = %symbol, error = %err, "quote unavailable")
                }
            }
        }
    }

    /// Marker first, message second: a marker that is already present means the
    /// alert went out on an earlier pass.
    async fn dispatch(&self, events: Vec<AlertEvent>) -> usize {
        let mut fired = 0;
        for event in events {
            match self.store.insert_sent_marker(&event.marker).await {
                Ok(()) => {
                    self.notifier
                        .send(&event.message, &self.settings.destination)
                        .await;
                    fired += 1;
                    info!(
                        target: "alert",
                        ticker = %event.marker.ticker,
                        owner = %event.marker.owner,
                        level = %event.marker.level,
                        "alert fired"
                    );
                }
                Err(StoreError::AlreadyExists { ticker, level }) => {
                    debug!(target: "alert", ticker = %ticker, level = %level, "alert already sent")
                }
                Err(err) => {
                    error!(target: "alert", ticker = %event.marker.ticker, error = %err, "failed to record alert marker")
                }
            }
        }
        fired
    }

    /// Full two-deep earlier/future recompute from the provider's chain, with fresh
    /// quotes. The result is not persisted.
    pub async fn rebuild_ladder(&self, position: &OptionData) -> Result<OptionData> {
        let contracts = self
            .market
            .fetch_contracts(&position.ticker)
            .await
            .with_context(|| format!("failed to load option chain for {}", position.ticker))?;
        let ladder = ChainLadder::build(&contracts);
        self.populate(position.clone(), &ladder).await
    }

    async fn populate(&self, mut position: OptionData, ladder: &ChainLadder) -> Result<OptionData> {
        let stats = ladder.stats();
        debug!(
            target: "chain",
            ticker = %position.ticker,
            expiries = stats.expiries,
            strikes = stats.strikes,
            "ladder built"
        );
        position.earlier = ladder.comparison_ladder(
            &position.ticker,
            position.expiry,
            position.strike,
            LadderSide::Earlier,
        );
        position.future = ladder.comparison_ladder(
            &position.ticker,
            position.expiry,
            position.strike,
            LadderSide::Future,
        );

        let mut book = QuoteBook::new();
        match self.market.fetch_spot(&position.ticker).await {
            Ok(spot) => book.insert_spot(&position.ticker, spot),
            Err(err) => {
                warn!(target: "provider", ticker = %position.ticker, error = %err, "spot unavailable")
            }
        }
        self.fetch_quotes_into(&mut book, position.referenced_symbols())
            .await;
        apply_spot(&mut position, &book);
        Ok(apply_quotes(position, &book))
    }

    pub async fn find_position(&self, owner: &OwnerId, ticker: &Ticker) -> Result<OptionData> {
        self.store
            .positions(Some(owner))
            .await?
            .into_iter()
            .find(|p| &p.ticker == ticker)
            .ok_or_else(|| StoreError::NotFound(ticker.clone()).into())
    }

    /// Starts tracking `ticker`. Without an explicit strike the first listed strike at
    /// least 10% above spot is used; the expiry defaults to two months out.
    pub async fn add_ticker(
        &self,
        owner: &OwnerId,
        ticker: &Ticker,
        strike: Option<Decimal>,
        expiry: Option<NaiveDate>,
    ) -> Result<OptionData> {
        let existing = self.store.positions(Some(owner)).await?;
        if existing.iter().any(|p| &p.ticker == ticker) {
            bail!("{ticker} is already tracked");
        }
        let expiry = match expiry {
            Some(expiry) => expiry,
            None => default_expiry(Utc::now().date_naive())?,
        };
        let contracts = self
            .market
            .fetch_contracts(ticker)
            .await
            .with_context(|| format!("failed to load option chain for {ticker}"))?;
        let ladder = ChainLadder::build(&contracts);
        let strike = match strike {
            Some(strike) => strike,
            None => {
                let spot = self.market.fetch_spot(ticker).await?;
                let target = spot.price * DEFAULT_STRIKE_CUSHION;
                ladder
                    .select_adjacent(expiry, target, Direction::Higher)
                    .unwrap_or_else(|| target.round())
            }
        };
        ensure_listable(strike)?;
        let position = OptionData::new(owner.clone(), ticker.clone(), strike, expiry);
        let position = self.populate(position, &ladder).await?;
        self.store.upsert_position(&position).await?;
        info!(target: "positions", owner = %owner, ticker = %ticker, strike = %strike, expiry = %expiry, "ticker added");
        Ok(position)
    }

    /// Deletes the position along with its enablement and markers.
    pub async fn remove_ticker(&self, owner: &OwnerId, ticker: &Ticker) -> Result<()> {
        self.store.delete_position(owner, ticker).await?;
        self.store.delete_sent_markers(owner, ticker).await?;
        info!(target: "positions", owner = %owner, ticker = %ticker, "ticker removed");
        Ok(())
    }

    /// Disabling resets the ticker's markers so re-enabling starts from a clean slate.
    pub async fn set_alerts_enabled(
        &self,
        owner: &OwnerId,
        ticker: &Ticker,
        enabled: bool,
    ) -> Result<()> {
        self.store.set_alert_enabled(owner, ticker, enabled).await?;
        if !enabled {
            self.store.delete_sent_markers(owner, ticker).await?;
        }
        info!(target: "alert", owner = %owner, ticker = %ticker, enabled, "alerts toggled");
        Ok(())
    }

    /// Replaces the tracked call, clears its alert markers and rebuilds the ladder.
    pub async fn update_tracked_call(
        &self,
        owner: &OwnerId,
        ticker: &Ticker,
        strike: Decimal,
        expiry: &str,
    ) -> Result<OptionData> {
        let expiry = parse_expiry(expiry)?;
        ensure_listable(strike)?;
        let mut position = self.find_position(owner, ticker).await?;
        position.strike = strike;
        position.expiry = expiry;
        self.store.delete_sent_markers(owner, ticker).await?;
        let position = self.rebuild_ladder(&position).await?;
        self.store.upsert_position(&position).await?;
        info!(target: "positions", owner = %owner, ticker = %ticker, strike = %strike, expiry = %expiry, "tracked call updated");
        Ok(position)
    }

    pub async fn dashboard(&self, owner: &OwnerId) -> Result<Vec<DashboardRow>> {
        let positions = self.store.positions(Some(owner)).await?;
        let enabled: HashSet<Ticker> = self
            .store
            .alert_enablement(Some(owner))
            .await?
            .into_iter()
            .filter(|e| e.enabled)
            .map(|e| e.ticker)
            .collect();
        let mut sent: HashMap<Ticker, BTreeSet<AlertLevel>> = HashMap::new();
        for marker in self.store.sent_markers(Some(owner)).await? {
            sent.entry(marker.ticker).or_default().insert(marker.level);
        }
        let mut rows: Vec<DashboardRow> = positions
            .into_iter()
            .map(|position| DashboardRow {
                alerts_enabled: enabled.contains(&position.ticker),
                delta: position.delta(),
                sent_levels: sent.remove(&position.ticker).unwrap_or_default(),
                position,
            })
            .collect();
        rows.sort_by(|a, b| a.position.ticker.cmp(&b.position.ticker));
        Ok(rows)
    }
}

fn ensure_listable(strike: Decimal) -> Result<()> {
    if !is_encodable_strike(strike) {
        bail!("strike {strike} cannot be encoded in a contract symbol");
    }
    Ok(())
}

/// A spot miss keeps the last known spot and change.
fn apply_spot(position: &mut OptionData, book: &QuoteBook) {
    match book.spot(&position.ticker) {
        Some(spot) => {
            position.spot = spot.price;
            position.change_percent = spot.change_percent;
        }
        None => debug!(
            target: "refresh",
            ticker = %position.ticker,
            spot = %position.spot,
            "spot missing, keeping stored value"
        ),
    }
}

/// Overwrites every quote field from the book; anything missing becomes zero.
pub fn apply_quotes(mut position: OptionData, book: &QuoteBook) -> OptionData {
    let current = book
        .quote(&position.current_symbol())
        .copied()
        .unwrap_or_default();
    position.current_bid = current.bid;
    position.current_ask = current.ask;
    position.current_last_trade_price = current.last_trade_price;
    position.earlier = refresh_entries(&position.earlier, book);
    position.future = refresh_entries(&position.future, book);
    position.updated_at = Some(Utc::now());
    position
}

fn refresh_entries(entries: &[OptionEntry], book: &QuoteBook) -> Vec<OptionEntry> {
    entries
        .iter()
        .map(|entry| match entry.symbol.as_deref() {
            Some(symbol) => entry.with_quote(book.quote(symbol).copied().unwrap_or_default()),
            None => entry.clone(),
        })
        .collect()
}
