use crate::core::error::DispatchError;
use crate::core::types::{Action, PredictionRecord};
use async_trait::async_trait;

pub const FOOTER: &str = "PolyEdge AI | High-Accuracy Signal Engine";
const NO_REASONING: &str = "No reasoning provided.";

pub const GREEN: u32 = 0x00ff00;
pub const RED: u32 = 0xff0000;
pub const GREY: u32 = 0x808080;

/// Channel-neutral view of one prediction, ready to be rendered by a channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub market_id: String,
    pub question: String,
    pub action: Action,
    pub market_probability: f64,
    pub fair_probability: f64,
    pub edge_percentage: f64,
    pub confidence: u8,
    /// Already truncated to the channel limit.
    pub reasoning: String,
    pub market_url: String,
}

impl Alert {
    pub fn from_record(record: &PredictionRecord, market_url: String, reasoning_limit: usize) -> Self {
        let p = &record.prediction;
        let reasoning = if p.reasoning().trim().is_empty() {
            NO_REASONING.to_string()
        } else {
            p.reasoning().chars().take(reasoning_limit).collect()
        };
        Self {
            market_id: record.market_id.clone(),
            question: record.question.clone(),
            action: p.action(),
            market_probability: p.market_probability(),
            fair_probability: p.fair_probability(),
            edge_percentage: p.edge_percentage(),
            confidence: p.confidence(),
            reasoning,
            market_url,
        }
    }

    pub fn title(&self) -> String {
        format!("🔥 EDGE DETECTED: {}", self.action)
    }

    pub fn color(&self) -> u32 {
        match self.action {
            Action::BuyYes => GREEN,
            Action::BuyNo => RED,
            Action::Hold => GREY,
        }
    }

    pub fn market_pct(&self) -> String {
        format!("{:.1}%", self.market_probability * 100.0)
    }

    pub fn fair_pct(&self) -> String {
        format!("{:.1}%", self.fair_probability * 100.0)
    }

    pub fn edge_pct(&self) -> String {
        format!("{:+.1}%", self.edge_percentage)
    }
}

/// One delivery target configured on a risk profile.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &Alert) -> Result<(), DispatchError>;
}
