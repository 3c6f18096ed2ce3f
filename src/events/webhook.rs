use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use super::{BotEvent, EventSink};
use crate::state_machine::constants::EVENT_EMIT_TIMEOUT;

const API_KEY_HEADER: &str = "x-api-key";

/// Posts `bot.status_change` events to an HTTP endpoint.
pub struct WebhookEventSink {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    bot_id: String,
    sent: Mutex<HashSet<&'static str>>,
}

impl WebhookEventSink {
    pub fn new(url: String, api_key: Option<String>, bot_id: String) -> Result<Self> {
        Self::with_timeout(url, api_key, bot_id, EVENT_EMIT_TIMEOUT)
    }

    pub fn with_timeout(
        url: String,
        api_key: Option<String>,
        bot_id: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("meetbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build webhook client")?;

        info!("Initialized webhook event sink for bot {}: {}", bot_id, url);

        Ok(Self {
            client,
            url,
            api_key,
            bot_id,
            sent: Mutex::new(HashSet::new()),
        })
    }

    fn payload(&self, event: &BotEvent) -> Value {
        let mut status = event.details();
        status.insert("code".to_string(), json!(event.code()));
        status.insert(
            "created_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );

        json!({
            "event": "bot.status_change",
            "data": {
                "bot_id": self.bot_id,
                "status": status,
            }
        })
    }

    fn already_sent(&self, event: &BotEvent) -> bool {
        !event.is_repeatable()
            && self
                .sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(event.code())
    }

    /// One-shot codes count as sent only once the endpoint accepted them.
    fn mark_sent(&self, event: &BotEvent) {
        if !event.is_repeatable() {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(event.code());
        }
    }
}

#[async_trait]
impl EventSink for WebhookEventSink {
    async fn emit(&self, event: BotEvent) -> Result<()> {
        if self.already_sent(&event) {
            debug!("Event {} already sent, skipping", event.code());
            return Ok(());
        }

        let mut request = self.client.post(&self.url).json(&self.payload(&event));
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send event {}", event.code()))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Webhook rejected event {} with status {}", event.code(), status);
        }
        self.mark_sent(&event);

        info!("Event sent: {} (bot {})", event.code(), self.bot_id);
        Ok(())
    }
}
