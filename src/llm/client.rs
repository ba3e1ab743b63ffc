use crate::config::config::LlmCfg;
use crate::core::error::InferenceError;
use crate::core::types::Prediction;
use crate::llm::parse::parse_prediction;
use crate::prompt::builder::PromptText;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are a prediction-market analyst. Weigh sources by their tier \
and answer with a single JSON object only.";

/// Appended to every prompt; lists the keys the parser requires.
pub const RESPONSE_FORMAT: &str = "\n\nRESPONSE FORMAT (JSON ONLY):\n\
- \"market_probability\", \"fair_probability\", \"edge_percentage\"\n\
- \"action\", \"confidence\", \"edge_quality\", \"signal_agreement\"\n\
- \"reasoning\", \"key_signals\", \"risk_factors\"\n";

/// Anything that turns a rendered prompt into a validated prediction.
#[async_trait]
pub trait DecisionModel: Send + Sync + 'static {
    async fn infer(&self, prompt: &PromptText) -> Result<Prediction, InferenceError>;

    /// Recorded with every prediction.
    fn model_version(&self) -> &str;
}

/// OpenAI-compatible chat endpoint (vLLM, TGI, OpenAI itself).
#[derive(Clone)]
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    cfg: LlmCfg,
    limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
}

impl LlmClient {
    pub fn new(cfg: LlmCfg) -> Self {
        let limiter = NonZeroU32::new(cfg.rate_limit_rpm)
            .map(|rpm| Arc::new(RateLimiter::direct(Quota::per_minute(rpm))));

        let openai_config = OpenAIConfig::new()
            .with_api_key(&cfg.api_key)
            .with_api_base(&cfg.base_url);
        let client = Client::with_config(openai_config);

        Self {
            client,
            cfg,
            limiter,
        }
    }

    fn build_request(&self, prompt: &PromptText) -> Result<CreateChatCompletionRequest, InferenceError> {
        let user = format!("{}{}", prompt.as_str(), RESPONSE_FORMAT);
        CreateChatCompletionRequestArgs::default()
            .model(&self.cfg.model)
            .max_tokens(self.cfg.max_tokens)
            .temperature(self.cfg.temperature)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| InferenceError::Transport(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(|e| InferenceError::Transport(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| InferenceError::Transport(e.to_string()))
    }
}

#[async_trait]
impl DecisionModel for LlmClient {
    async fn infer(&self, prompt: &PromptText) -> Result<Prediction, InferenceError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let request = self.build_request(prompt)?;
        info!(
            "Calling LLM at {} with model {}",
            self.cfg.base_url, self.cfg.model
        );

        let response = tokio::time::timeout(self.cfg.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| InferenceError::Timeout(self.cfg.timeout))?
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|c| !c.trim().is_empty())
            .ok_or(InferenceError::EmptyResponse)?;
        debug!(chars = content.len(), "LLM answered");

        parse_prediction(content, false)
    }

    fn model_version(&self) -> &str {
        &self.cfg.model
    }
}
