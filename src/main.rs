use anyhow::{Context, Result};
use clap::Parser;
use roll_tracker::cache::QuoteCache;
use roll_tracker::client::{CachedMarketData, PolygonHttpClient};
use roll_tracker::config::{parse_interval, AppConfig, Cli, Command, Toggle};
use roll_tracker::engine::{EngineSettings, RollEngine};
use roll_tracker::expiry::parse_expiry;
use roll_tracker::model::Ticker;
use roll_tracker::notify::TelegramNotifier;
use roll_tracker::render;
use roll_tracker::store::{JsonFileStore, PositionStore};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli)?;

    let store = JsonFileStore::open(&config.store_path)
        .with_context(|| format!("failed to open store {:?}", config.store_path))?;
    let cache_ttl = chrono::Duration::from_std(config.cache_ttl)
        .context("cache ttl out of range")?;
    let market = CachedMarketData::new(
        PolygonHttpClient::new(
            &config.provider_url,
            config.provider_api_key.clone().unwrap_or_default(),
        )?,
        QuoteCache::new(cache_ttl, config.cache_capacity),
    );
    let notifier = TelegramNotifier::new(config.telegram_bot_token.clone())?;
    let destination = config.telegram_chat_id.clone().unwrap_or_else(|| {
        warn!(target: "notify", "TELEGRAM_CHAT_ID not set, alerts have no destination");
        String::new()
    });
    let engine = RollEngine::new(&store, &market, &notifier, EngineSettings { destination });
    let owner = &config.owner;

    match cli.command {
        Command::Refresh => {
            config.require_api_key()?;
            let report = engine.refresh_all().await?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Command::Watch { interval } => {
            config.require_api_key()?;
            let period = parse_interval(&interval)?;
            let mut schedule = tokio::time::interval(period);
            schedule.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(target: "refresh", interval = %humantime::format_duration(period), "watching");
            loop {
                tokio::select! {
                    _ = schedule.tick() => {
                        if let Err(err) = engine.refresh_all().await {
                            error!(target: "refresh", error = %err, "refresh pass failed");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!(target: "refresh", "interrupted, stopping");
                        break;
                    }
                }
            }
        }
        Command::Add {
            ticker,
            strike,
            expiry,
        } => {
            config.require_api_key()?;
            let ticker = Ticker::from_str(&ticker)?;
            let strike = strike.as_deref().map(parse_strike).transpose()?;
            let expiry = expiry.as_deref().map(parse_expiry).transpose()?;
            let position = engine.add_ticker(owner, &ticker, strike, expiry).await?;
            println!("{}", serde_json::to_string_pretty(&position)?);
        }
        Command::Remove { ticker } => {
            let ticker = Ticker::from_str(&ticker)?;
            engine.remove_ticker(owner, &ticker).await?;
        }
        Command::Alerts { ticker, state } => {
            let ticker = Ticker::from_str(&ticker)?;
            engine
                .set_alerts_enabled(owner, &ticker, state == Toggle::On)
                .await?;
        }
        Command::SetCall {
            ticker,
            strike,
            expiry,
        } => {
            config.require_api_key()?;
            let ticker = Ticker::from_str(&ticker)?;
            let strike = parse_strike(&strike)?;
            let position = engine
                .update_tracked_call(owner, &ticker, strike, &expiry)
                .await?;
            println!("{}", serde_json::to_string_pretty(&position)?);
        }
        Command::Rebuild { ticker } => {
            config.require_api_key()?;
            let ticker = Ticker::from_str(&ticker)?;
            let position = engine.find_position(owner, &ticker).await?;
            let position = engine.rebuild_ladder(&position).await?;
            store.upsert_position(&position).await?;
            println!("{}", serde_json::to_string_pretty(&position)?);
        }
        Command::Show => {
            let rows = engine.dashboard(owner).await?;
            render::print_dashboard(&rows)?;
        }
        Command::Export { out } => {
            let rows = engine.dashboard(owner).await?;
            render::export_csv(&rows, &out)?;
        }
    }

    Ok(())
}

fn parse_strike(raw: &str) -> Result<Decimal> {
    let strike = Decimal::from_str(raw.trim()).with_context(|| format!("invalid strike: {raw}"))?;
    anyhow::ensure!(strike > Decimal::ZERO, "strike must be positive: {raw}");
    Ok(strike)
}
