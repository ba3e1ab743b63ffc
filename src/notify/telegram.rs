use crate::core::error::DispatchError;
use crate::notify::alert::{Alert, AlertChannel};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;

pub struct TelegramBot {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramBot {
    pub fn new(
        client: Client,
        api_url: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }
}

/// Backslash-escapes the characters that open an entity in legacy Markdown.
fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn message(alert: &Alert) -> String {
    format!(
        "🚀 *POLYEDGE ALERT*\n\n\
         📝 *Market*: {}\n\
         🎯 *Action*: {}\n\
         💰 *Edge*: {} | *Conf*: {}%\n\n\
         🧠 *Reasoning*: {}\n\n\
         🔗 [Analyze on Dashboard]({})",
        escape_markdown(&alert.question),
        escape_markdown(alert.action.as_str()),
        alert.edge_pct(),
        alert.confidence,
        escape_markdown(&alert.reasoning),
        alert.market_url,
    )
}

#[async_trait]
impl AlertChannel for TelegramBot {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, alert: &Alert) -> Result<(), DispatchError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let resp = self
            .client
            .post(url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": message(alert),
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .map_err(|source| DispatchError::Http {
                channel: "telegram",
                // the bot token is part of the URL
                source: source.without_url(),
            })?;

        if !resp.status().is_success() {
            return Err(DispatchError::Status {
                channel: "telegram",
                status: resp.status().as_u16(),
            });
        }
        info!(market_id = %alert.market_id, "Telegram alert sent");
        Ok(())
    }
}
