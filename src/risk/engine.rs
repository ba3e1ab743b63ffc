use crate::core::error::DispatchError;
use crate::core::types::{
    Action, OrderReceipt, OrderType, PredictionRecord, Question, RiskProfile, Side, SimulatedOrder,
};
use crate::execution::client::ExecutionClient;
use crate::notify::Notifier;
use crate::notify::alert::Alert;
use crate::risk::gate::{RiskDecision, calculate_bet_size, evaluate};
use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel: &'static str,
    pub result: Result<(), DispatchError>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Gated,
    AutoTradeOff,
    NoCredentials,
    HoldAction,
    ZeroSize,
    NoOutcomeToken,
}

#[derive(Debug)]
pub enum OrderOutcome {
    NotAttempted(SkipReason),
    Submitted(OrderReceipt),
    Failed(DispatchError),
}

/// What happened for one profile. Failures are recorded here, never raised.
#[derive(Debug)]
pub struct FanoutReport {
    pub profile_id: String,
    pub decision: RiskDecision,
    pub alerts: Vec<ChannelOutcome>,
    pub order: OrderOutcome,
}

impl FanoutReport {
    fn gated(profile_id: &str, decision: RiskDecision) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            decision,
            alerts: Vec::new(),
            order: OrderOutcome::NotAttempted(SkipReason::Gated),
        }
    }

    pub fn alerts_delivered(&self) -> usize {
        self.alerts.iter().filter(|a| a.result.is_ok()).count()
    }
}

/// Limit buy of the outcome token the action points at. `None` when no order makes sense.
pub fn build_order(
    question: &Question,
    action: Action,
    size_usd: f64,
    expiry: Duration,
) -> Option<SimulatedOrder> {
    let tokens = question.tokens()?;
    let (token_id, price) = match action {
        Action::BuyYes => (&tokens.yes, question.price()),
        Action::BuyNo => (&tokens.no, 1.0 - question.price()),
        Action::Hold => return None,
    };

    let price = Decimal::from_f64(price)?.round_dp(2);
    if price <= Decimal::ZERO {
        return None;
    }
    let size = (Decimal::from_f64(size_usd)? / price).round_dp(2);
    if size <= Decimal::ZERO {
        return None;
    }

    Some(SimulatedOrder {
        client_order_id: Uuid::new_v4().to_string(),
        market_id: question.market_id().to_string(),
        token_id: token_id.clone(),
        side: Side::Buy,
        price,
        size,
        order_type: OrderType::Limit,
        expiration: Utc::now().timestamp() + expiry.as_secs() as i64,
    })
}

/// Per-profile gating, alert delivery and optional order placement.
pub struct FanoutEngine {
    notifier: Notifier,
    execution: Arc<dyn ExecutionClient>,
    market_url_base: String,
    order_expiry: Duration,
}

impl FanoutEngine {
    pub fn new(
        notifier: Notifier,
        execution: Arc<dyn ExecutionClient>,
        market_url_base: impl Into<String>,
        order_expiry: Duration,
    ) -> Self {
        Self {
            notifier,
            execution,
            market_url_base: market_url_base.into().trim_end_matches('/').to_string(),
            order_expiry,
        }
    }

    fn market_url(&self, market_id: &str) -> String {
        format!("{}/{}", self.market_url_base, market_id)
    }

    #[tracing::instrument(skip_all, fields(profile_id = %profile.id(), market_id = %record.market_id))]
    pub async fn process(
        &self,
        profile: &RiskProfile,
        question: &Question,
        record: &PredictionRecord,
    ) -> FanoutReport {
        let decision = evaluate(profile, &record.prediction);
        if !decision.passed() {
            info!(%decision, "profile gated out");
            metrics::counter!("fanout_dispatch_total", "result" => "gated").increment(1);
            return FanoutReport::gated(profile.id(), decision);
        }
        self.dispatch(profile, question, record).await
    }

    /// Sends every configured alert, then tries the order path. Callers gate first.
    pub async fn dispatch(
        &self,
        profile: &RiskProfile,
        question: &Question,
        record: &PredictionRecord,
    ) -> FanoutReport {
        let alert = Alert::from_record(
            record,
            self.market_url(&record.market_id),
            self.notifier.reasoning_limit(),
        );

        let channels = self.notifier.channels_for(profile);
        let results = join_all(channels.iter().map(|c| c.send(&alert))).await;

        let alerts: Vec<ChannelOutcome> = channels
            .iter()
            .zip(results)
            .map(|(channel, result)| {
                match &result {
                    Ok(()) => {
                        metrics::counter!("fanout_dispatch_total", "channel" => channel.name(), "result" => "sent")
                            .increment(1);
                    }
                    Err(e) => {
                        warn!(?e, channel = channel.name(), "alert delivery failed");
                        metrics::counter!("fanout_dispatch_total", "channel" => channel.name(), "result" => "error")
                            .increment(1);
                    }
                }
                ChannelOutcome {
                    channel: channel.name(),
                    result,
                }
            })
            .collect();

        let order = self.submit_order(profile, question, record).await;
        if let OrderOutcome::Failed(e) = &order {
            warn!(?e, "order path failed");
        }

        FanoutReport {
            profile_id: profile.id().to_string(),
            decision: RiskDecision::Pass,
            alerts,
            order,
        }
    }

    /// Re-runs the risk gate before anything reaches the execution client.
    pub async fn submit_order(
        &self,
        profile: &RiskProfile,
        question: &Question,
        record: &PredictionRecord,
    ) -> OrderOutcome {
        if !profile.auto_trade {
            return OrderOutcome::NotAttempted(SkipReason::AutoTradeOff);
        }
        let Some(credentials) = profile.execution.as_ref().filter(|c| c.is_complete()) else {
            return OrderOutcome::NotAttempted(SkipReason::NoCredentials);
        };
        let prediction = &record.prediction;
        if prediction.action() == Action::Hold {
            return OrderOutcome::NotAttempted(SkipReason::HoldAction);
        }

        let decision = evaluate(profile, prediction);
        if !decision.passed() {
            return OrderOutcome::Failed(DispatchError::RiskRejected(decision.to_string()));
        }

        let size_usd = calculate_bet_size(profile.max_bet_usd, prediction.confidence());
        if size_usd <= 0.0 {
            return OrderOutcome::NotAttempted(SkipReason::ZeroSize);
        }
        let Some(order) = build_order(question, prediction.action(), size_usd, self.order_expiry)
        else {
            return OrderOutcome::NotAttempted(SkipReason::NoOutcomeToken);
        };

        info!(
            profile_id = %profile.id(),
            market_id = %order.market_id,
            size_usd,
            "auto-trade triggered"
        );
        match self.execution.submit_order(&order, credentials).await {
            Ok(receipt) => OrderOutcome::Submitted(receipt),
            Err(e) => OrderOutcome::Failed(DispatchError::Execution(format!("{e:#}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::NotifyCfg;
    use crate::core::types::ExecutionCredentials;
    use crate::execution::simulator::SimExecutionClient;
    use crate::notify::alert::tests::record;
    use reqwest::Client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn question() -> Question {
        Question::new("Will BTC reach $100k by March?", "m-1", 0.58, 1000.0)
            .unwrap()
            .with_category("Crypto")
            .with_tokens("yes-token", "no-token")
    }

    fn trader(server: &MockServer) -> RiskProfile {
        trader_with(server, 5.0, 70.0)
    }

    fn trader_with(server: &MockServer, min_edge: f64, min_confidence: f64) -> RiskProfile {
        let mut p = RiskProfile::new("trader", min_edge, min_confidence).unwrap();
        p.discord_webhook = Some(format!("{}/hook", server.uri()));
        p.auto_trade = true;
        p.max_bet_usd = 100.0;
        p.execution = Some(ExecutionCredentials {
            api_key: "k".into(),
            secret: "s".into(),
            passphrase: "p".into(),
        });
        p
    }

    fn engine(sim: Arc<SimExecutionClient>) -> FanoutEngine {
        FanoutEngine::new(
            Notifier::new(Client::new(), NotifyCfg::default()),
            sim,
            "https://polymarket.com/market",
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_build_order_prices_the_chosen_outcome() {
        let q = question();
        let yes = build_order(&q, Action::BuyYes, 58.0, Duration::from_secs(3600)).unwrap();
        assert_eq!(yes.token_id, "yes-token");
        assert_eq!(yes.price, Decimal::new(58, 2));
        assert_eq!(yes.size, Decimal::new(100, 0));
        assert!(yes.expiration > Utc::now().timestamp() + 3500);

        let no = build_order(&q, Action::BuyNo, 42.0, Duration::from_secs(3600)).unwrap();
        assert_eq!(no.token_id, "no-token");
        assert_eq!(no.price, Decimal::new(42, 2));

        assert!(build_order(&q, Action::Hold, 10.0, Duration::from_secs(1)).is_none());
        let untokened = Question::new("Q?", "m-2", 0.5, 0.0).unwrap();
        assert!(build_order(&untokened, Action::BuyYes, 10.0, Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn test_passing_profile_gets_alert_and_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sim = Arc::new(SimExecutionClient::new());
        let report = engine(sim.clone())
            .process(&trader(&server), &question(), &record(Action::BuyYes, "r"))
            .await;

        assert!(report.decision.passed());
        assert_eq!(report.alerts_delivered(), 1);
        assert!(matches!(report.order, OrderOutcome::Submitted(ref r) if r.simulated));

        let orders = sim.submitted().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].token_id, "yes-token");
        // 100 USD * 88% confidence at 0.58
        assert_eq!(orders[0].size, Decimal::new(15172, 2));
    }

    #[tokio::test]
    async fn test_gated_profile_gets_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let profile = trader_with(&server, 20.0, 70.0);
        let sim = Arc::new(SimExecutionClient::new());
        let report = engine(sim.clone())
            .process(&profile, &question(), &record(Action::BuyYes, "r"))
            .await;

        assert_eq!(report.decision, RiskDecision::EdgeBelow { edge: 14.0, min: 20.0 });
        assert!(report.alerts.is_empty());
        assert!(matches!(report.order, OrderOutcome::NotAttempted(SkipReason::Gated)));
        assert!(sim.submitted().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sim = Arc::new(SimExecutionClient::new());
        let report = engine(sim.clone())
            .process(&trader(&server), &question(), &record(Action::BuyYes, "r"))
            .await;

        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts_delivered(), 0);
        assert!(matches!(report.order, OrderOutcome::Submitted(_)));
    }

    #[tokio::test]
    async fn test_order_path_regates() {
        let server = MockServer::start().await;
        let profile = trader_with(&server, 5.0, 95.0);

        let sim = Arc::new(SimExecutionClient::new());
        let outcome = engine(sim.clone())
            .submit_order(&profile, &question(), &record(Action::BuyYes, "r"))
            .await;

        assert!(matches!(outcome, OrderOutcome::Failed(DispatchError::RiskRejected(_))));
        assert!(sim.submitted().await.is_empty());
    }

    #[tokio::test]
    async fn test_order_skips() {
        let server = MockServer::start().await;
        let sim = Arc::new(SimExecutionClient::new());
        let engine = engine(sim.clone());

        let mut manual = trader(&server);
        manual.auto_trade = false;
        assert!(matches!(
            engine.submit_order(&manual, &question(), &record(Action::BuyYes, "r")).await,
            OrderOutcome::NotAttempted(SkipReason::AutoTradeOff)
        ));

        assert!(matches!(
            engine
                .submit_order(&trader(&server), &question(), &record(Action::Hold, "r"))
                .await,
            OrderOutcome::NotAttempted(SkipReason::HoldAction)
        ));

        let mut broke = trader(&server);
        broke.max_bet_usd = 0.0;
        assert!(matches!(
            engine.submit_order(&broke, &question(), &record(Action::BuyYes, "r")).await,
            OrderOutcome::NotAttempted(SkipReason::ZeroSize)
        ));

        let mut keyless = trader(&server);
        keyless.execution = None;
        assert!(matches!(
            engine.submit_order(&keyless, &question(), &record(Action::BuyYes, "r")).await,
            OrderOutcome::NotAttempted(SkipReason::NoCredentials)
        ));
        assert!(sim.submitted().await.is_empty());
    }
}
