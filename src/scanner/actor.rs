use crate::config::config::ScannerCfg;
use crate::core::types::{ActiveMarket, Actor};
use crate::marketdata::client::MarketCatalogue;
use crate::orchestrator::analysis::SignalOrchestrator;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Tally of one scan pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub markets: usize,
    pub analyzed: usize,
    pub skipped: usize,
    pub alerted: usize,
}

/// Periodically walks the most active markets and runs the analysis pipeline on each.
pub struct ScannerActor {
    catalogue: Arc<dyn MarketCatalogue>,
    orchestrator: Arc<SignalOrchestrator>,
    cfg: ScannerCfg,
    shutdown: CancellationToken,
}

impl ScannerActor {
    pub fn new(
        catalogue: Arc<dyn MarketCatalogue>,
        orchestrator: Arc<SignalOrchestrator>,
        cfg: ScannerCfg,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            catalogue,
            orchestrator,
            cfg,
            shutdown,
        }
    }

    pub async fn run_scan_once(&self) -> Result<ScanSummary> {
        let markets = self
            .catalogue
            .fetch_active_markets(self.cfg.market_limit)
            .await
            .context("fetching active markets")?;
        if markets.is_empty() {
            warn!("ScannerActor: catalogue returned 0 markets");
        }

        let mut summary = ScanSummary {
            markets: markets.len(),
            ..Default::default()
        };

        let tasks: Vec<BoxFuture<'_, Option<usize>>> = markets
            .into_iter()
            .map(|m| async move { self.scan_market(&m).await }.boxed())
            .collect();
        let results = stream::iter(tasks)
            .buffer_unordered(self.cfg.concurrency)
            .collect::<Vec<_>>()
            .await;

        for alerted in results {
            match alerted {
                Some(n) => {
                    summary.analyzed += 1;
                    summary.alerted += n;
                }
                None => summary.skipped += 1,
            }
        }
        info!(?summary, "scan pass finished");
        Ok(summary)
    }

    /// Profiles reached for this market, or `None` when it was not analysed.
    async fn scan_market(&self, market: &ActiveMarket) -> Option<usize> {
        if let Err(e) = self.orchestrator.store().upsert_market(market).await {
            warn!(?e, market_id = %market.id, stage = "upsert_market", "market row not refreshed");
        }

        let price = match self.catalogue.fetch_yes_price(market).await {
            Ok(p) => p,
            Err(e) => {
                warn!(?e, market_id = %market.id, stage = "price", "skipping market without price");
                return None;
            }
        };
        let question = match market.to_question(price) {
            Ok(q) => q,
            Err(e) => {
                warn!(?e, market_id = %market.id, stage = "validate", "skipping market");
                return None;
            }
        };

        let outcome = self.orchestrator.analyze_question(&question).await?;
        Some(
            outcome
                .fanout
                .iter()
                .filter(|r| r.decision.passed())
                .count(),
        )
    }
}

#[async_trait::async_trait]
impl Actor for ScannerActor {
    async fn run(self) -> Result<()> {
        info!(interval = ?self.cfg.interval, "ScannerActor started");
        let mut tick = tokio::time::interval(self.cfg.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("ScannerActor: shutdown requested");
                    break;
                }

                _ = tick.tick() => {
                    if let Err(e) = self.run_scan_once().await {
                        error!("ScannerActor: scan failed: {:#}", e);
                        // backoff to avoid hot loop on repeated failures
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        info!("ScannerActor stopped cleanly");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::{CacheCfg, ContextCfg, NotifyCfg, OrchestratorCfg};
    use crate::context::aggregator::ContextAggregator;
    use crate::context::aggregator::tests::{StaticNews, StaticSocial};
    use crate::core::types::RiskProfile;
    use crate::execution::simulator::SimExecutionClient;
    use crate::llm::simulator::SimulatedModel;
    use crate::marketdata::simulator::SimMarketCatalogue;
    use crate::notify::Notifier;
    use crate::persistence::memory::MemoryStore;
    use crate::risk::engine::FanoutEngine;
    use async_trait::async_trait;
    use reqwest::Client;

    fn orchestrator(store: Arc<MemoryStore>) -> Arc<SignalOrchestrator> {
        let aggregator = ContextAggregator::new(
            Arc::new(StaticNews(vec![])),
            Arc::new(StaticSocial(vec![])),
            ContextCfg::default(),
        );
        let engine = FanoutEngine::new(
            Notifier::new(Client::new(), NotifyCfg::default()),
            Arc::new(SimExecutionClient::new()),
            "https://polymarket.com/market",
            Duration::from_secs(3600),
        );
        Arc::new(SignalOrchestrator::new(
            aggregator,
            Arc::new(SimulatedModel::new()),
            store,
            engine,
            &CacheCfg::default(),
            OrchestratorCfg::default(),
        ))
    }

    fn scanner(catalogue: Arc<dyn MarketCatalogue>, store: Arc<MemoryStore>) -> ScannerActor {
        ScannerActor::new(
            catalogue,
            orchestrator(store),
            ScannerCfg::default(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_scan_once_analyzes_every_market() {
        let crypto_fan = RiskProfile::new("crypto-fan", 5.0, 70.0).unwrap();
        let store = Arc::new(MemoryStore::with_profiles(vec![crypto_fan]));
        let actor = scanner(Arc::new(SimMarketCatalogue::sample()), store.clone());

        let summary = actor.run_scan_once().await.unwrap();
        assert_eq!(summary.markets, 2);
        assert_eq!(summary.analyzed, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.alerted, 2);

        assert!(store.market("sim-btc-100k").await.is_some());
        assert!(store.market("sim-fed-cut").await.is_some());
        assert_eq!(store.predictions().await.len(), 2);
    }

    struct NoPrices;

    #[async_trait]
    impl MarketCatalogue for NoPrices {
        async fn fetch_active_markets(&self, limit: u32) -> Result<Vec<ActiveMarket>> {
            SimMarketCatalogue::sample().fetch_active_markets(limit).await
        }
        async fn fetch_yes_price(&self, market: &ActiveMarket) -> Result<f64> {
            anyhow::bail!("no price for {}", market.id)
        }
    }

    #[tokio::test]
    async fn test_unpriced_markets_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let actor = scanner(Arc::new(NoPrices), store.clone());

        let summary = actor.run_scan_once().await.unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.analyzed, 0);
        // the catalogue row is still refreshed
        assert!(store.market("sim-btc-100k").await.is_some());
        assert!(store.predictions().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let shutdown = CancellationToken::new();
        let actor = ScannerActor::new(
            Arc::new(SimMarketCatalogue::sample()),
            orchestrator(store.clone()),
            ScannerCfg::default(),
            shutdown.clone(),
        );

        let handle = tokio::spawn(actor.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        // the first tick fires immediately
        assert_eq!(store.predictions().await.len(), 2);
    }
}
