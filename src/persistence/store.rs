use crate::core::error::PersistenceError;
use crate::core::types::{ActiveMarket, PredictionRecord, RiskProfile};
use async_trait::async_trait;

/// Key-indexed table API the pipeline persists through.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Insert or refresh a market row by id.
    async fn upsert_market(&self, market: &ActiveMarket) -> Result<(), PersistenceError>;

    /// Append-only; records are never updated.
    async fn insert_prediction(&self, record: &PredictionRecord) -> Result<(), PersistenceError>;

    /// Profiles with the active (`is_pro`) flag set.
    async fn load_active_profiles(&self) -> Result<Vec<RiskProfile>, PersistenceError>;

    /// Newest first.
    async fn recent_predictions(
        &self,
        market_id: &str,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>, PersistenceError>;
}
