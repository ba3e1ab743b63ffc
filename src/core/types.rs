use crate::core::error::ValidationError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait Actor: Send + Sync + 'static {
    async fn run(self) -> Result<()>;
}

// ----------- Question -----------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTokens {
    pub yes: String,
    pub no: String,
}

/// A market question as handed to the analysis pipeline. Validated on construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Question {
    text: String,
    market_id: String,
    price: f64,
    volume: f64,
    category: Option<String>,
    tokens: Option<OutcomeTokens>,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        market_id: impl Into<String>,
        price: f64,
        volume: f64,
    ) -> Result<Self, ValidationError> {
        let text = text.into();
        let market_id = market_id.into();
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        if market_id.trim().is_empty() {
            return Err(ValidationError::EmptyMarketId);
        }
        if !(0.0..=1.0).contains(&price) {
            return Err(ValidationError::PriceOutOfRange(price));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(ValidationError::InvalidVolume(volume));
        }
        Ok(Self {
            text,
            market_id,
            price,
            volume,
            category: None,
            tokens: None,
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tokens(mut self, yes: impl Into<String>, no: impl Into<String>) -> Self {
        self.tokens = Some(OutcomeTokens {
            yes: yes.into(),
            no: no.into(),
        });
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn tokens(&self) -> Option<&OutcomeTokens> {
        self.tokens.as_ref()
    }
}

// ----------- Context signals -----------------

/// Trust bucket of a context signal. Lower rank = more trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Verified = 1,
    HighEngagement = 2,
    Professional = 3,
    Regular = 4,
    Suspicious = 5,
}

impl Tier {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalOrigin {
    News { domain: String },
    Social { handle: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub reposts: u64,
    pub likes: u64,
}

/// One external mention, tiered at collection time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub origin: SignalOrigin,
    pub text: String,
    pub tier: Tier,
    /// Platform-verified identity of the author.
    pub authentic: bool,
    pub engagement: Engagement,
}

impl Signal {
    /// Author handle or outlet domain.
    pub fn source_label(&self) -> &str {
        match &self.origin {
            SignalOrigin::News { domain } => domain,
            SignalOrigin::Social { handle } => handle,
        }
    }
}

// ----------- Prediction -----------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    BuyYes,
    BuyNo,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::BuyYes => "BUY_YES",
            Action::BuyNo => "BUY_NO",
            Action::Hold => "HOLD",
        }
    }

    /// Accepts the canonical names plus the BUY / SELL shorthand some model outputs use.
    pub fn parse(raw: &str) -> Option<Self> {
        let norm = raw
            .trim()
            .to_ascii_uppercase()
            .replace([' ', '-'], "_");
        match norm.as_str() {
            "BUY_YES" | "BUY" | "YES" => Some(Action::BuyYes),
            "BUY_NO" | "SELL" | "NO" => Some(Action::BuyNo),
            "HOLD" | "NONE" | "PASS" => Some(Action::Hold),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated prediction fields, as produced by a decision model.
#[derive(Clone, Debug, Default)]
pub struct PredictionDraft {
    pub market_probability: f64,
    pub fair_probability: f64,
    pub edge_percentage: f64,
    pub action: Option<Action>,
    pub confidence: f64,
    pub edge_quality: String,
    pub signal_agreement: String,
    pub reasoning: String,
    pub key_signals: Vec<String>,
    pub risk_factors: Vec<String>,
    pub simulated: bool,
}

/// Structured judgment of the decision model.
///
/// Probabilities are held in `[0, 1]`; values above 1 in a draft are read as
/// percentages. Confidence is an integer in `[0, 100]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    market_probability: f64,
    fair_probability: f64,
    edge_percentage: f64,
    action: Action,
    confidence: u8,
    edge_quality: String,
    signal_agreement: String,
    reasoning: String,
    key_signals: Vec<String>,
    risk_factors: Vec<String>,
    simulated: bool,
}

fn normalize_probability(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite(field));
    }
    let p = if value > 1.0 { value / 100.0 } else { value };
    if !(0.0..=1.0).contains(&p) {
        return Err(ValidationError::ProbabilityOutOfRange { field, value });
    }
    Ok(p)
}

impl TryFrom<PredictionDraft> for Prediction {
    type Error = ValidationError;

    fn try_from(d: PredictionDraft) -> Result<Self, Self::Error> {
        let market_probability = normalize_probability("market_probability", d.market_probability)?;
        let fair_probability = normalize_probability("fair_probability", d.fair_probability)?;
        if !d.edge_percentage.is_finite() {
            return Err(ValidationError::NotFinite("edge_percentage"));
        }
        if !d.confidence.is_finite() || !(0.0..=100.0).contains(&d.confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(d.confidence));
        }
        Ok(Self {
            market_probability,
            fair_probability,
            edge_percentage: d.edge_percentage,
            action: d.action.unwrap_or(Action::Hold),
            confidence: d.confidence.round() as u8,
            edge_quality: d.edge_quality,
            signal_agreement: d.signal_agreement,
            reasoning: d.reasoning,
            key_signals: d.key_signals,
            risk_factors: d.risk_factors,
            simulated: d.simulated,
        })
    }
}

impl Prediction {
    pub fn market_probability(&self) -> f64 {
        self.market_probability
    }
    pub fn fair_probability(&self) -> f64 {
        self.fair_probability
    }
    pub fn edge_percentage(&self) -> f64 {
        self.edge_percentage
    }
    pub fn action(&self) -> Action {
        self.action
    }
    pub fn confidence(&self) -> u8 {
        self.confidence
    }
    pub fn edge_quality(&self) -> &str {
        &self.edge_quality
    }
    pub fn signal_agreement(&self) -> &str {
        &self.signal_agreement
    }
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }
    pub fn key_signals(&self) -> &[String] {
        &self.key_signals
    }
    pub fn risk_factors(&self) -> &[String] {
        &self.risk_factors
    }
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub source: String,
    pub title: String,
    pub tier: u8,
}

/// Durable output of one analysis run. Never mutated after it is built;
/// a re-analysis produces a new record with a new id.
#[derive(Clone, Debug, Serialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub market_id: String,
    pub question: String,
    pub category: Option<String>,
    pub prediction: Prediction,
    pub top_headlines: Vec<Headline>,
    pub sentiment_score: f64,
    pub raw_context: String,
    pub model_version: String,
    pub prompt_version: String,
    pub created_at: DateTime<Utc>,
}

// ----------- Risk profiles -----------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelegramTarget {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl ExecutionCredentials {
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for ExecutionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCredentials")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Per-subscriber thresholds and delivery targets. Owned by the subscriber.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskProfile {
    id: String,
    min_edge_threshold: f64,
    min_confidence_threshold: f64,
    pub discord_webhook: Option<String>,
    pub telegram: Option<TelegramTarget>,
    pub execution: Option<ExecutionCredentials>,
    /// Empty means every category.
    pub categories: Vec<String>,
    pub auto_trade: bool,
    pub max_bet_usd: f64,
}

impl RiskProfile {
    pub fn new(
        id: impl Into<String>,
        min_edge_threshold: f64,
        min_confidence_threshold: f64,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyProfileId);
        }
        if !min_edge_threshold.is_finite() {
            return Err(ValidationError::InvalidThreshold {
                field: "min_edge_threshold",
                value: min_edge_threshold,
            });
        }
        if !min_confidence_threshold.is_finite()
            || !(0.0..=100.0).contains(&min_confidence_threshold)
        {
            return Err(ValidationError::InvalidThreshold {
                field: "min_confidence_threshold",
                value: min_confidence_threshold,
            });
        }
        Ok(Self {
            id,
            min_edge_threshold,
            min_confidence_threshold,
            discord_webhook: None,
            telegram: None,
            execution: None,
            categories: Vec::new(),
            auto_trade: false,
            max_bet_usd: 0.0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn min_edge_threshold(&self) -> f64 {
        self.min_edge_threshold
    }

    pub fn min_confidence_threshold(&self) -> f64 {
        self.min_confidence_threshold
    }

    pub fn subscribes_to(&self, category: Option<&str>) -> bool {
        if self.categories.is_empty() {
            return true;
        }
        match category {
            Some(c) => self.categories.iter().any(|s| s.eq_ignore_ascii_case(c)),
            None => false,
        }
    }
}

// ----------- Orders -----------------

#[derive(Clone, Debug, PartialEq, Eq, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    #[allow(dead_code)]
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
}

/// Order payload built after a profile passes the risk gate. Never signed here.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulatedOrder {
    pub client_order_id: String,
    pub market_id: String,
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    /// Unix seconds.
    pub expiration: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderReceipt {
    pub client_order_id: String,
    pub status: String,
    pub simulated: bool,
    pub ts_ms: i64,
}

// ----------- Market catalogue -----------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActiveMarket {
    pub id: String,
    pub question: String,
    pub slug: String,
    pub category: String,
    pub volume: f64,
    pub clob_token_ids: Vec<String>,
    pub outcome_prices: Vec<f64>,
}

impl ActiveMarket {
    pub fn url(&self) -> String {
        format!("https://polymarket.com/event/{}", self.slug)
    }

    /// Builds the pipeline input at `price`. Outcome tokens are attached when the
    /// market lists exactly one YES and one NO token.
    pub fn to_question(&self, price: f64) -> Result<Question, ValidationError> {
        let mut q = Question::new(&self.question, &self.id, price, self.volume)?
            .with_category(&self.category);
        if let [yes, no] = self.clob_token_ids.as_slice() {
            q = q.with_tokens(yes, no);
        }
        Ok(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_rejects_out_of_range_inputs() {
        assert_eq!(
            Question::new("Q?", "m1", 1.2, 10.0),
            Err(ValidationError::PriceOutOfRange(1.2))
        );
        assert_eq!(
            Question::new("Q?", "m1", 0.5, -1.0),
            Err(ValidationError::InvalidVolume(-1.0))
        );
        assert_eq!(
            Question::new("  ", "m1", 0.5, 1.0),
            Err(ValidationError::EmptyQuestion)
        );
        assert!(Question::new("Q?", "m1", 0.0, 0.0).is_ok());
        assert!(Question::new("Q?", "m1", 1.0, 0.0).is_ok());
    }

    #[test]
    fn test_action_parses_aliases() {
        assert_eq!(Action::parse("BUY_YES"), Some(Action::BuyYes));
        assert_eq!(Action::parse("buy yes"), Some(Action::BuyYes));
        assert_eq!(Action::parse("BUY"), Some(Action::BuyYes));
        assert_eq!(Action::parse("sell"), Some(Action::BuyNo));
        assert_eq!(Action::parse("Buy-No"), Some(Action::BuyNo));
        assert_eq!(Action::parse("hold"), Some(Action::Hold));
        assert_eq!(Action::parse("moon"), None);
    }

    #[test]
    fn test_prediction_normalizes_percent_probabilities() {
        let p = Prediction::try_from(PredictionDraft {
            market_probability: 58.0,
            fair_probability: 0.72,
            edge_percentage: 14.0,
            action: Some(Action::BuyYes),
            confidence: 88.0,
            ..Default::default()
        })
        .unwrap();
        assert!((p.market_probability() - 0.58).abs() < 1e-9);
        assert!((p.fair_probability() - 0.72).abs() < 1e-9);
        assert_eq!(p.confidence(), 88);
    }

    #[test]
    fn test_prediction_rejects_bad_confidence() {
        let err = Prediction::try_from(PredictionDraft {
            market_probability: 0.5,
            fair_probability: 0.5,
            confidence: 140.0,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::ConfidenceOutOfRange(140.0));
    }

    #[test]
    fn test_profile_category_subscription() {
        let mut p = RiskProfile::new("u1", 5.0, 70.0).unwrap();
        assert!(p.subscribes_to(Some("Crypto")));
        assert!(p.subscribes_to(None));
        p.categories = vec!["crypto".into()];
        assert!(p.subscribes_to(Some("Crypto")));
        assert!(!p.subscribes_to(Some("Politics")));
        assert!(!p.subscribes_to(None));
    }

    #[test]
    fn test_profile_rejects_confidence_threshold_above_100() {
        assert!(RiskProfile::new("u1", 5.0, 101.0).is_err());
        assert!(RiskProfile::new("", 5.0, 70.0).is_err());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let c = ExecutionCredentials {
            api_key: "k".into(),
            secret: "s3cr3t".into(),
            passphrase: "p".into(),
        };
        assert!(!format!("{:?}", c).contains("s3cr3t"));
    }
}
