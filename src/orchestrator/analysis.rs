use crate::config::config::{CacheCfg, OrchestratorCfg};
use crate::context::aggregator::ContextAggregator;
use crate::core::error::{InferenceError, PersistenceError};
use crate::core::types::{Prediction, PredictionRecord, Question};
use crate::llm::client::DecisionModel;
use crate::orchestrator::cache::{AnalysisCache, fingerprint};
use crate::orchestrator::display::{sentiment_score, top_headlines};
use crate::persistence::store::Store;
use crate::prompt::builder::{PROMPT_CONTRACT_VERSION, PromptText, render_question};
use crate::risk::engine::{FanoutEngine, FanoutReport};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of one `analyze` call.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub record: PredictionRecord,
    /// Served from the cache: nothing was persisted or dispatched this time.
    pub from_cache: bool,
    pub persist_error: Option<PersistenceError>,
    pub fanout: Vec<FanoutReport>,
}

/// End-to-end pipeline for one market question.
pub struct SignalOrchestrator {
    aggregator: ContextAggregator,
    model: Arc<dyn DecisionModel>,
    store: Arc<dyn Store>,
    engine: FanoutEngine,
    cache: AnalysisCache,
    cfg: OrchestratorCfg,
}

impl SignalOrchestrator {
    pub fn new(
        aggregator: ContextAggregator,
        model: Arc<dyn DecisionModel>,
        store: Arc<dyn Store>,
        engine: FanoutEngine,
        cache_cfg: &CacheCfg,
        cfg: OrchestratorCfg,
    ) -> Self {
        Self {
            aggregator,
            model,
            store,
            engine,
            cache: AnalysisCache::new(cache_cfg),
            cfg,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// `None` when the inputs are invalid or no usable prediction could be obtained.
    pub async fn analyze(
        &self,
        question: &str,
        market_id: &str,
        price: f64,
        volume: f64,
    ) -> Option<AnalysisOutcome> {
        match Question::new(question, market_id, price, volume) {
            Ok(q) => self.analyze_question(&q).await,
            Err(e) => {
                warn!(?e, market_id, stage = "validate", "rejecting analysis input");
                None
            }
        }
    }

    #[tracing::instrument(skip_all, fields(market_id = %question.market_id()))]
    pub async fn analyze_question(&self, question: &Question) -> Option<AnalysisOutcome> {
        let key = fingerprint(
            question.market_id(),
            question.text(),
            question.price(),
            question.volume(),
        );
        if let Some(record) = self.cache.get(&key).await {
            info!("analysis served from cache");
            metrics::counter!("analysis_runs_total", "result" => "cached").increment(1);
            return Some(AnalysisOutcome {
                record,
                from_cache: true,
                persist_error: None,
                fanout: Vec::new(),
            });
        }

        let bundle = self
            .aggregator
            .gather(question.text(), self.aggregator.lookback())
            .await;
        let prompt = render_question(question, &bundle);

        let prediction = match self.infer_with_retry(&prompt).await {
            Ok(p) => p,
            Err(e) => {
                error!(?e, market_id = %question.market_id(), stage = "inference", "analysis aborted");
                metrics::counter!("analysis_runs_total", "result" => "inference_failed").increment(1);
                return None;
            }
        };

        let record = PredictionRecord {
            id: Uuid::new_v4(),
            market_id: question.market_id().to_string(),
            question: question.text().to_string(),
            category: question.category().map(str::to_string),
            top_headlines: top_headlines(&bundle),
            sentiment_score: sentiment_score(&bundle),
            raw_context: bundle.render(),
            model_version: self.model.model_version().to_string(),
            prompt_version: PROMPT_CONTRACT_VERSION.to_string(),
            created_at: Utc::now(),
            prediction,
        };
        info!(
            action = %record.prediction.action(),
            confidence = record.prediction.confidence(),
            edge = record.prediction.edge_percentage(),
            simulated = record.prediction.is_simulated(),
            "prediction ready"
        );

        let persist_error = match self.store.insert_prediction(&record).await {
            Ok(()) => None,
            Err(e) => {
                error!(?e, market_id = %record.market_id, stage = "persist", "prediction not stored");
                metrics::counter!("analysis_persist_failures_total").increment(1);
                Some(e)
            }
        };

        let fanout = if record.prediction.confidence() >= self.cfg.alert_confidence {
            self.fan_out(question, &record).await
        } else {
            Vec::new()
        };

        self.cache.put(key, record.clone()).await;
        metrics::counter!("analysis_runs_total", "result" => "completed").increment(1);

        Some(AnalysisOutcome {
            record,
            from_cache: false,
            persist_error,
            fanout,
        })
    }

    async fn infer_with_retry(&self, prompt: &PromptText) -> Result<Prediction, InferenceError> {
        let attempts = self.cfg.inference_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.model.infer(prompt).await {
                Ok(p) => return Ok(p),
                Err(e) if attempt < attempts => {
                    warn!(?e, attempt, "inference failed; retrying");
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fan_out(&self, question: &Question, record: &PredictionRecord) -> Vec<FanoutReport> {
        let profiles = match self.store.load_active_profiles().await {
            Ok(p) => p,
            Err(e) => {
                error!(?e, market_id = %record.market_id, stage = "load_profiles", "skipping fan-out");
                return Vec::new();
            }
        };

        let subscribed: Vec<_> = profiles
            .iter()
            .filter(|p| p.subscribes_to(record.category.as_deref()))
            .collect();
        info!(
            active = profiles.len(),
            subscribed = subscribed.len(),
            "fanning out prediction"
        );

        join_all(
            subscribed
                .into_iter()
                .map(|p| self.engine.process(p, question, record)),
        )
        .await
    }
}
