use crate::core::types::ActiveMarket;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MarketCatalogue: Send + Sync + 'static {
    /// Open markets, highest volume first.
    async fn fetch_active_markets(&self, limit: u32) -> Result<Vec<ActiveMarket>>;

    /// Latest YES price in `[0, 1]`.
    async fn fetch_yes_price(&self, market: &ActiveMarket) -> Result<f64>;
}
