//! Telegram bot notifications
//!
//! Sends alert messages to a chat through the Bot API `sendMessage` call.

use crate::alerting::AlertTransport;
use crate::config::TelegramConfig;
use crate::error::{ForkwatchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Telegram notification client
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: i64,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .map_err(|e| ForkwatchError::Notification(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_api_key.clone(),
            chat_id: config.chat_id,
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl AlertTransport for TelegramNotifier {
    async fn send_message(&self, text: &str) -> Result<()> {
        let message = SendMessage {
            chat_id: self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        // reqwest errors carry the URL, which contains the bot token
        let resp = self
            .client
            .post(self.send_message_url())
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                ForkwatchError::Notification(format!(
                    "failed to send message to telegram: {}",
                    e.without_url()
                ))
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            error!("Telegram notification failed: {} - {}", status, body);
            return Err(ForkwatchError::Notification(format!("HTTP {}: {}", status, body)));
        }

        match serde_json::from_str::<BotResponse>(&body) {
            Ok(reply) if !reply.ok => Err(ForkwatchError::Notification(
                reply
                    .description
                    .unwrap_or_else(|| "telegram rejected the message".to_string()),
            )),
            _ => {
                debug!("Telegram notification sent successfully");
                Ok(())
            }
        }
    }
}
