//! Best-effort LLM narration of a composed signal
//!
//! Narration never blocks or fails the signal flow: any error downgrades
//! to a warning and the signal ships without a narrative.

use crate::indicators::IndicatorSnapshot;
use crate::models::Signal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 256;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageContent,
}

#[derive(Debug, Deserialize)]
struct ChatMessageContent {
    content: String,
}

pub struct NarrativeClient {
    api_key: Option<String>,
    api_url: String,
    model: String,
    client: reqwest::Client,
}

impl NarrativeClient {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    /// Point at a different endpoint (tests, self-hosted gateways)
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a short narration for the signal. Returns None when
    /// disabled or on any upstream failure.
    pub async fn generate(
        &self,
        signal: &Signal,
        indicators: Option<&IndicatorSnapshot>,
    ) -> Option<String> {
        let api_key = self.api_key.as_ref()?;

        let prompt = build_prompt(signal, indicators);
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: 0.3,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = match self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Narrative request failed, omitting narrative");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                status = %response.status(),
                "Narrative provider returned error status, omitting narrative"
            );
            return None;
        }

        match response.json::<ChatResponse>().await {
            Ok(body) => body
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content.trim().to_string())
                .filter(|s| !s.is_empty()),
            Err(e) => {
                warn!(error = %e, "Narrative response malformed, omitting narrative");
                None
            }
        }
    }
}

fn build_prompt(signal: &Signal, indicators: Option<&IndicatorSnapshot>) -> String {
    let mut prompt = format!(
        "Summarize this trading signal in two sentences for a trader.\n\
         Symbol: {} ({})\n\
         Action: {} with confidence {:.0}/100\n\
         Entry: {:.4}, take profit: {:.4}, stop loss: {:.4}\n\
         Factors: {}\n",
        signal.symbol,
        signal.timeframe,
        signal.action,
        signal.confidence,
        signal.entry_price,
        signal.take_profit,
        signal.stop_loss,
        signal.reasoning()
    );

    if let Some(snapshot) = indicators {
        if let Some(rsi) = snapshot.rsi {
            prompt.push_str(&format!("RSI: {:.1}\n", rsi));
        }
        if let Some(macd) = snapshot.macd {
            prompt.push_str(&format!("MACD histogram: {:.4}\n", macd.histogram));
        }
    }

    prompt
}
