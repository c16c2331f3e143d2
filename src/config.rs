use crate::client::DEFAULT_BASE_URL;
use crate::model::OwnerId;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser, Clone)]
#[command(name = "roll_tracker", author, version, about = "Covered-call roll tracker and alerting", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, env = "POLYGON_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub provider_url: String,

    #[arg(long, global = true, env = "STORE_PATH", default_value = "positions.json")]
    pub store: PathBuf,

    #[arg(long, global = true, env = "OWNER_ID", default_value = "local")]
    pub owner: String,

    #[arg(long, global = true, env = "TELEGRAM_CHAT_ID")]
    pub chat_id: Option<String>,

    #[arg(long, global = true, env = "QUOTE_CACHE_TTL", default_value = "5s")]
    pub cache_ttl: String,

    #[arg(long, global = true, env = "QUOTE_CACHE_CAPACITY", default_value_t = 512usize)]
    pub cache_capacity: usize,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a single refresh pass over every tracked position
    Refresh,
    /// Run refresh passes on a fixed schedule until interrupted
    Watch {
        #[arg(long, env = "REFRESH_INTERVAL", default_value = "5m")]
        interval: String,
    },
    /// Start tracking a ticker
    Add {
        ticker: String,
        #[arg(long)]
        strike: Option<String>,
        /// YYYY-MM or YYYY-MM-DD
        #[arg(long)]
        expiry: Option<String>,
    },
    /// Stop tracking a ticker
    Remove { ticker: String },
    /// Turn alerts on or off for a ticker
    Alerts {
        ticker: String,
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Replace the tracked call
    SetCall {
        ticker: String,
        strike: String,
        /// YYYY-MM or YYYY-MM-DD
        expiry: String,
    },
    /// Recompute the earlier/future ladder from the full option chain
    Rebuild { ticker: String },
    /// Print the dashboard
    Show,
    /// Write the dashboard as CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub provider_url: String,
    #[serde(skip)]
    pub provider_api_key: Option<String>,
    #[serde(skip)]
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub store_path: PathBuf,
    pub owner: OwnerId,
    #[serde(with = "duration_text")]
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let provider_api_key = std::env::var("POLYGON_API_KEY").ok();
        let telegram_bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok();

        let cache_ttl = humantime::parse_duration(&cli.cache_ttl)
            .with_context(|| format!("invalid cache ttl: {}", cli.cache_ttl))?;

        let owner = cli.owner.trim();
        if owner.is_empty() {
            return Err(anyhow!("owner id must not be empty"));
        }

        let config = AppConfig {
            provider_url: cli.provider_url.clone(),
            provider_api_key,
            telegram_bot_token,
            telegram_chat_id: cli.chat_id.clone(),
            store_path: cli.store.clone(),
            owner: OwnerId::new(owner),
            cache_ttl,
            cache_capacity: cli.cache_capacity,
        };

        info!(
            target: "config",
            config = %serde_json::to_string(&config).unwrap_or_default(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn require_api_key(&self) -> Result<String> {
        self.provider_api_key
            .clone()
            .ok_or_else(|| anyhow!("POLYGON_API_KEY is required for market data"))
    }
}

pub fn parse_interval(raw: &str) -> Result<Duration> {
    let interval =
        humantime::parse_duration(raw).with_context(|| format!("invalid interval: {raw}"))?;
    if interval.is_zero() {
        return Err(anyhow!("refresh interval must be positive"));
    }
    Ok(interval)
}

mod duration_text {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }
}
