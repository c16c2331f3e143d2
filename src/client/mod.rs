use crate::cache::{CachedValue, QuoteCache};
use crate::model::{ContractQuote, OptionContract, OptionKind, SpotQuote, Ticker};
use crate::symbol::decode_underlying;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use reqwest::{Client as HttpClient, StatusCode};
use rust_decimal::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
const PAGE_LIMIT: &str = "1000";
const MAX_PAGES: usize = 50;

/// Fetch-and-parse boundary to the market-data provider. Everything returned is
/// already typed and defaulted; pagination stays behind this trait.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn fetch_contracts(&self, ticker: &Ticker) -> Result<Vec<OptionContract>>;
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<ContractQuote>>;
    async fn fetch_spot(&self, ticker: &Ticker) -> Result<SpotQuote>;
}

#[derive(Debug)]
pub struct PolygonHttpClient {
    http: HttpClient,
    base: Url,
    api_key: String,
}

impl PolygonHttpClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        let http = HttpClient::builder()
            .user_agent("roll_tracker/0.1")
            .build()
            .context("failed to build http client")?;
        let base = Url::parse(base_url).with_context(|| format!("invalid base url {base_url}"))?;
        Ok(Self {
            http,
            base,
            api_key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("base url cannot carry a path: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<R: DeserializeOwned>(&self, mut url: Url) -> Result<Option<R>> {
        url.query_pairs_mut().append_pair("apiKey", &self.api_key);
        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to call {}", url.path()))?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = res.text().await?;
        if !status.is_success() {
            return Err(anyhow!("HTTP {status} for {}: {text}", url.path()));
        }
        let parsed = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse response for {}: {text}", url.path()))?;
        Ok(Some(parsed))
    }
}

#[derive(Deserialize)]
struct ContractsPage {
    #[serde(default)]
    results: Vec<ContractDto>,
    next_url: Option<String>,
}

#[derive(Deserialize)]
struct ContractDto {
    ticker: String,
    underlying_ticker: String,
    contract_type: String,
    expiration_date: String,
    strike_price: f64,
}

#[derive(Deserialize)]
struct OptionSnapshotEnvelope {
    results: Option<OptionSnapshotDto>,
}

#[derive(Deserialize, Default)]
struct OptionSnapshotDto {
    #[serde(default)]
    last_quote: Option<LastQuoteDto>,
    #[serde(default)]
    last_trade: Option<LastTradeDto>,
}

#[derive(Deserialize)]
struct LastQuoteDto {
    #[serde(default)]
    bid: f64,
    #[serde(default)]
    ask: f64,
}

#[derive(Deserialize)]
struct LastTradeDto {
    #[serde(default)]
    price: f64,
}

#[derive(Deserialize)]
struct StockSnapshotEnvelope {
    ticker: Option<StockSnapshotDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockSnapshotDto {
    #[serde(default)]
    todays_change_perc: f64,
    last_trade: Option<StockTradeDto>,
    day: Option<StockBarDto>,
    prev_day: Option<StockBarDto>,
}

#[derive(Deserialize)]
struct StockTradeDto {
    #[serde(default)]
    p: f64,
}

#[derive(Deserialize)]
struct StockBarDto {
    #[serde(default)]
    c: f64,
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

impl ContractDto {
    fn into_contract(self) -> Result<OptionContract> {
        let expiration = NaiveDate::parse_from_str(&self.expiration_date, "%Y-%m-%d")
            .with_context(|| format!("invalid expiration {}", self.expiration_date))?;
        Ok(OptionContract {
            underlying: self.underlying_ticker.parse()?,
            kind: self.contract_type.parse()?,
            symbol: self.ticker,
            expiration,
            strike: decimal(self.strike_price),
        })
    }
}

#[async_trait]
impl MarketData for PolygonHttpClient {
    async fn fetch_contracts(&self, ticker: &Ticker) -> Result<Vec<OptionContract>> {
        let mut url = self.endpoint(&["v3", "reference", "options", "contracts"])?;
        url.query_pairs_mut()
            .append_pair("underlying_ticker", ticker.as_str())
            .append_pair("contract_type", "call")
            .append_pair("expired", "false")
            .append_pair("limit", PAGE_LIMIT);

        let mut contracts = Vec::new();
        let mut next = Some(url);
        let mut pages = 0;
        while let Some(page_url) = next.take() {
            let Some(page) = self.get::<ContractsPage>(page_url).await? else {
                break;
            };
            pages += 1;
            for dto in page.results {
                match dto.into_contract() {
                    Ok(contract) => contracts.push(contract),
                    Err(err) => warn!(target: "provider", ticker = %ticker, error = %err, "skipping malformed contract"),
                }
            }
            if pages >= MAX_PAGES {
                warn!(target: "provider", ticker = %ticker, pages, "contract pagination truncated");
                break;
            }
            next = page
                .next_url
                .map(|raw| Url::parse(&raw))
                .transpose()
                .context("invalid next_url")?;
        }
        debug!(target: "provider", ticker = %ticker, pages, contracts = contracts.len(), "contracts loaded");
        Ok(contracts)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Option<ContractQuote>> {
        let underlying = decode_underlying(symbol)
            .ok_or_else(|| anyhow!("not an option contract symbol: {symbol}"))?;
        let url = self.endpoint(&["v3", "snapshot", "options", underlying.as_str(), symbol])?;
        let envelope: Option<OptionSnapshotEnvelope> = self.get(url).await?;
        Ok(envelope.and_then(|e| e.results).map(|dto| ContractQuote {
            bid: dto.last_quote.as_ref().map(|q| decimal(q.bid)).unwrap_or_default(),
            ask: dto.last_quote.as_ref().map(|q| decimal(q.ask)).unwrap_or_default(),
            last_trade_price: dto
                .last_trade
                .as_ref()
                .map(|t| decimal(t.price))
                .unwrap_or_default(),
        }))
    }

    async fn fetch_spot(&self, ticker: &Ticker) -> Result<SpotQuote> {
        let url = self.endpoint(&[
            "v2", "snapshot", "locale", "us", "markets", "stocks", "tickers", ticker.as_str(),
        ])?;
        let dto = self
            .get::<StockSnapshotEnvelope>(url)
            .await?
            .and_then(|e| e.ticker)
            .ok_or_else(|| anyhow!("no snapshot for {ticker}"))?;
        let price = [
            dto.last_trade.map(|t| t.p),
            dto.day.map(|d| d.c),
            dto.prev_day.map(|d| d.c),
        ]
        .into_iter()
        .flatten()
        .find(|p| *p > 0.0)
        .unwrap_or_default();
        Ok(SpotQuote {
            price: decimal(price),
            change_percent: decimal(dto.todays_change_perc),
        })
    }
}

/// Serves quotes and spots from a [`QuoteCache`] before asking the wrapped provider.
pub struct CachedMarketData<P> {
    inner: P,
    cache: QuoteCache,
}

impl<P: MarketData> CachedMarketData<P> {
    pub fn new(inner: P, cache: QuoteCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: MarketData> MarketData for CachedMarketData<P> {
    async fn fetch_contracts(&self, ticker: &Ticker) -> Result<Vec<OptionContract>> {
        self.inner.fetch_contracts(ticker).await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Option<ContractQuote>> {
        if let Some(CachedValue::Contract(quote)) = self.cache.get(symbol) {
            return Ok(Some(quote));
        }
        let quote = self.inner.fetch_quote(symbol).await?;
        if let Some(quote) = quote {
            self.cache.put(symbol, CachedValue::Contract(quote));
        }
        Ok(quote)
    }

    async fn fetch_spot(&self, ticker: &Ticker) -> Result<SpotQuote> {
        if let Some(CachedValue::Spot(spot)) = self.cache.get(ticker.as_str()) {
            return Ok(spot);
        }
        let spot = self.inner.fetch_spot(ticker).await?;
        self.cache.put(ticker.as_str(), CachedValue::Spot(spot));
        Ok(spot)
    }
}

/// In-memory provider for tests and offline runs.
#[derive(Default)]
pub struct MockMarketData {
    contracts: Mutex<HashMap<String, Vec<OptionContract>>>,
    quotes: Mutex<HashMap<String, ContractQuote>>,
    spots: Mutex<HashMap<String, SpotQuote>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_contracts(&self, ticker: &Ticker, contracts: Vec<OptionContract>) {
        self.contracts.lock().insert(ticker.to_string(), contracts);
    }

    pub fn add_call(&self, ticker: &Ticker, expiration: NaiveDate, strike: Decimal) {
        let contract = OptionContract {
            symbol: crate::symbol::encode_symbol(ticker, expiration, strike),
            underlying: ticker.clone(),
            kind: OptionKind::Call,
            expiration,
            strike,
        };
        self.contracts
            .lock()
            .entry(ticker.to_string())
            .or_default()
            .push(contract);
    }

    pub fn set_quote(&self, symbol: impl Into<String>, quote: ContractQuote) {
        self.quotes.lock().insert(symbol.into(), quote);
    }

    pub fn set_spot(&self, ticker: &Ticker, spot: SpotQuote) {
        self.spots.lock().insert(ticker.to_string(), spot);
    }

    /// Every request for `key` (symbol or ticker) fails until cleared.
    pub fn fail(&self, key: impl Into<String>) {
        self.failing.lock().insert(key.into());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, key: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(key) {
            return Err(anyhow!("provider unavailable for {key}"));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketData for MockMarketData {
    async fn fetch_contracts(&self, ticker: &Ticker) -> Result<Vec<OptionContract>> {
        self.record(ticker.as_str())?;
        Ok(self
            .contracts
            .lock()
            .get(ticker.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Option<ContractQuote>> {
        self.record(symbol)?;
        Ok(self.quotes.lock().get(symbol).copied())
    }

    async fn fetch_spot(&self, ticker: &Ticker) -> Result<SpotQuote> {
        self.record(ticker.as_str())?;
        self.spots
            .lock()
            .get(ticker.as_str())
            .copied()
            .ok_or_else(|| anyhow!("no spot for {ticker}"))
    }
}
