use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client as HttpClient;
use serde_json::json;
use tracing::{info, warn};

/// Outbound channel. Delivery is fire-and-forget: failures are logged by the
/// implementation and never surface to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str, destination: &str);
}

#[derive(Debug)]
pub struct TelegramNotifier {
    http: HttpClient,
    bot_token: Option<String>,
}

impl TelegramNotifier {
    pub fn new(bot_token: Option<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .user_agent("roll_tracker/0.1")
            .build()
            .context("failed to build http client")?;
        if bot_token.is_none() {
            warn!(target: "notify", "telegram disabled: TELEGRAM_BOT_TOKEN not set");
        }
        Ok(Self { http, bot_token })
    }

    async fn deliver(&self, token: &str, message: &str, destination: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let payload = json!({
            "chat_id": destination,
            "text": message,
            "disable_web_page_preview": true,
        });
        let res = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .context("telegram request failed")?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("telegram HTTP {status}: {text}"));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str, destination: &str) {
        let Some(token) = self.bot_token.as_deref() else {
            info!(target: "notify", destination, message, "telegram disabled, message dropped");
            return;
        };
        match self.deliver(token, message, destination).await {
            Ok(()) => info!(target: "notify", destination, "notification sent"),
            Err(err) => warn!(target: "notify", destination, error = %err, "notification failed"),
        }
    }
}

/// Records every message instead of delivering it.
#[derive(Debug, Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, message: &str, destination: &str) {
        self.sent
            .lock()
            .push((message.to_string(), destination.to_string()));
    }
}
