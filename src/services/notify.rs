//! Telegram notification transport
//!
//! At-least-once with bounded retry: up to three attempts, then the
//! failure is logged and the caller moves on. Sending never panics and
//! never propagates an error into the signal flow.

use crate::models::Signal;
use backon::{ExponentialBuilder, Retryable};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: usize = 2; // 3 attempts total

pub struct TelegramNotifier {
    bot_token: Option<String>,
    chat_id: Option<String>,
    api_url: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: Option<String>, chat_id: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            bot_token,
            chat_id,
            api_url: DEFAULT_API_URL.to_string(),
            client,
        }
    }

    /// Point at a different API host (tests)
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    /// Send a formatted alert for an actionable signal
    pub async fn send_signal_alert(&self, signal: &Signal) -> bool {
        self.send(&format_signal_message(signal)).await
    }

    /// Send a raw message. Returns false after retries are exhausted.
    pub async fn send(&self, message: &str) -> bool {
        let (Some(token), Some(chat_id)) = (&self.bot_token, &self.chat_id) else {
            debug!("Telegram notifier disabled, dropping message");
            return false;
        };

        let url = format!("{}/bot{}/sendMessage", self.api_url, token);
        let body = json!({
            "chat_id": chat_id,
            "text": message,
        });

        let attempt = || async {
            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    Box::new(std::io::Error::other(format!(
                        "Telegram request failed: {}",
                        e
                    ))) as Box<dyn std::error::Error + Send + Sync>
                })?;

            if !response.status().is_success() {
                return Err(Box::new(std::io::Error::other(format!(
                    "Telegram returned status {}",
                    response.status()
                ))) as Box<dyn std::error::Error + Send + Sync>);
            }
            Ok(())
        };

        match attempt
            .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Telegram notification permanently failed");
                false
            }
        }
    }
}

fn format_signal_message(signal: &Signal) -> String {
    format!(
        "{} {} [{}]\nConfidence: {:.0}/100\nEntry: {:.4}\nTake profit: {:.4}\nStop loss: {:.4}\n{}",
        signal.action,
        signal.symbol,
        signal.timeframe,
        signal.confidence,
        signal.entry_price,
        signal.take_profit,
        signal.stop_loss,
        signal.reasoning()
    )
}
