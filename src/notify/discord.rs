use crate::core::error::DispatchError;
use crate::notify::alert::{Alert, AlertChannel, FOOTER};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

pub struct DiscordWebhook {
    client: Client,
    url: String,
}

impl DiscordWebhook {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

pub fn embed(alert: &Alert) -> Value {
    json!({
        "title": alert.title(),
        "description": format!("**Market**: {}", alert.question),
        "url": alert.market_url,
        "color": alert.color(),
        "fields": [
            {"name": "Market Prob", "value": alert.market_pct(), "inline": true},
            {"name": "Fair Prob", "value": alert.fair_pct(), "inline": true},
            {"name": "Edge", "value": alert.edge_pct(), "inline": true},
            {"name": "Confidence", "value": format!("{}%", alert.confidence), "inline": true},
            {"name": "Reasoning", "value": alert.reasoning}
        ],
        "footer": {"text": FOOTER}
    })
}

#[async_trait]
impl AlertChannel for DiscordWebhook {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, alert: &Alert) -> Result<(), DispatchError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "embeds": [embed(alert)] }))
            .send()
            .await
            .map_err(|source| DispatchError::Http {
                channel: "discord",
                source,
            })?;

        if !resp.status().is_success() {
            return Err(DispatchError::Status {
                channel: "discord",
                status: resp.status().as_u16(),
            });
        }
        info!(market_id = %alert.market_id, "Discord alert sent");
        Ok(())
    }
}
