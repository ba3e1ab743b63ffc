use crate::core::error::PersistenceError;
use crate::core::types::{ActiveMarket, PredictionRecord, RiskProfile};
use crate::persistence::store::Store;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local store, used when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    markets: Mutex<HashMap<String, ActiveMarket>>,
    predictions: Mutex<Vec<PredictionRecord>>,
    profiles: Vec<RiskProfile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: Vec<RiskProfile>) -> Self {
        Self {
            profiles,
            ..Default::default()
        }
    }

    pub async fn predictions(&self) -> Vec<PredictionRecord> {
        self.predictions.lock().await.clone()
    }

    pub async fn market(&self, id: &str) -> Option<ActiveMarket> {
        self.markets.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_market(&self, market: &ActiveMarket) -> Result<(), PersistenceError> {
        self.markets
            .lock()
            .await
            .insert(market.id.clone(), market.clone());
        Ok(())
    }

    async fn insert_prediction(&self, record: &PredictionRecord) -> Result<(), PersistenceError> {
        self.predictions.lock().await.push(record.clone());
        Ok(())
    }

    async fn load_active_profiles(&self) -> Result<Vec<RiskProfile>, PersistenceError> {
        Ok(self.profiles.clone())
    }

    async fn recent_predictions(
        &self,
        market_id: &str,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>, PersistenceError> {
        let predictions = self.predictions.lock().await;
        Ok(predictions
            .iter()
            .rev()
            .filter(|r| r.market_id == market_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
