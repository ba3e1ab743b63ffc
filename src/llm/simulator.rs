use crate::core::error::InferenceError;
use crate::core::types::{Action, Prediction, PredictionDraft};
use crate::llm::client::DecisionModel;
use crate::prompt::builder::PromptText;
use async_trait::async_trait;

pub const SIMULATED_MODEL_VERSION: &str = "simulated";

/// Stand-in decision model used when no live endpoint is configured.
/// Always answers with the same prediction, marked as simulated.
pub struct SimulatedModel;

impl SimulatedModel {
    pub fn new() -> Self {
        Self
    }

    pub fn prediction() -> PredictionDraft {
        PredictionDraft {
            market_probability: 0.58,
            fair_probability: 0.72,
            edge_percentage: 14.0,
            action: Some(Action::BuyYes),
            confidence: 88.0,
            edge_quality: "High-Signal".to_string(),
            signal_agreement: "Confirmed (Reuters + X Fusion)".to_string(),
            reasoning: "Verified sources and high-engagement posts point the same way; \
                        the market has not yet priced the latest reporting."
                .to_string(),
            key_signals: vec!["Whale Bid (Tier 1)".to_string(), "GDELT Flash".to_string()],
            risk_factors: vec!["Liquidity Depth".to_string()],
            simulated: true,
        }
    }
}

impl Default for SimulatedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionModel for SimulatedModel {
    async fn infer(&self, _prompt: &PromptText) -> Result<Prediction, InferenceError> {
        Ok(Prediction::try_from(Self::prediction())?)
    }

    fn model_version(&self) -> &str {
        SIMULATED_MODEL_VERSION
    }
}
