use crate::core::types::ActiveMarket;
use crate::marketdata::client::MarketCatalogue;
use anyhow::Result;
use async_trait::async_trait;

/// Fixed catalogue for offline runs and tests.
pub struct SimMarketCatalogue {
    markets: Vec<ActiveMarket>,
}

impl SimMarketCatalogue {
    pub fn new(markets: Vec<ActiveMarket>) -> Self {
        Self { markets }
    }

    pub fn sample() -> Self {
        Self::new(vec![
            ActiveMarket {
                id: "sim-btc-100k".into(),
                question: "Will BTC reach $100k by March?".into(),
                slug: "will-btc-reach-100k-by-march".into(),
                category: "Crypto".into(),
                volume: 2_500_000.0,
                clob_token_ids: vec!["sim-btc-yes".into(), "sim-btc-no".into()],
                outcome_prices: vec![0.58, 0.42],
            },
            ActiveMarket {
                id: "sim-fed-cut".into(),
                question: "Will the Fed cut rates in June?".into(),
                slug: "will-the-fed-cut-rates-in-june".into(),
                category: "Economics".into(),
                volume: 880_000.0,
                clob_token_ids: vec!["sim-fed-yes".into(), "sim-fed-no".into()],
                outcome_prices: vec![0.31, 0.69],
            },
        ])
    }
}

#[async_trait]
impl MarketCatalogue for SimMarketCatalogue {
    async fn fetch_active_markets(&self, limit: u32) -> Result<Vec<ActiveMarket>> {
        Ok(self.markets.iter().take(limit as usize).cloned().collect())
    }

    async fn fetch_yes_price(&self, market: &ActiveMarket) -> Result<f64> {
        market
            .outcome_prices
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no simulated price for {}", market.id))
    }
}
