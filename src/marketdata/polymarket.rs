use crate::config::config::PolyCfg;
use crate::core::types::ActiveMarket;
use crate::marketdata::client::MarketCatalogue;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    #[serde(default)]
    id: String,
    #[serde(default)]
    condition_id: Option<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    volume_num: Option<f64>,
    #[serde(default)]
    volume: Option<Value>,
    // Gamma ships these two as JSON-encoded strings
    #[serde(default)]
    clob_token_ids: Option<String>,
    #[serde(default)]
    outcome_prices: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LastTradePrice {
    price: Value,
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl GammaMarket {
    fn into_active(self) -> Option<ActiveMarket> {
        let question = self.question.filter(|q| !q.trim().is_empty())?;
        let id = self
            .condition_id
            .filter(|c| !c.is_empty())
            .unwrap_or(self.id);
        if id.is_empty() {
            return None;
        }

        let volume = self
            .volume_num
            .or_else(|| self.volume.as_ref().and_then(number))
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(0.0);

        let clob_token_ids: Vec<String> = self
            .clob_token_ids
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        let outcome_prices: Vec<f64> = self
            .outcome_prices
            .as_deref()
            .and_then(|s| serde_json::from_str::<Vec<Value>>(s).ok())
            .map(|v| v.iter().filter_map(number).collect())
            .unwrap_or_default();

        Some(ActiveMarket {
            id,
            question,
            slug: self.slug,
            category: self.category.unwrap_or_else(|| "General".to_string()),
            volume,
            clob_token_ids,
            outcome_prices,
        })
    }
}

/// Gamma for the catalogue, CLOB for prices.
pub struct PolyMarketCatalogue {
    client: Client,
    cfg: PolyCfg,
}

impl PolyMarketCatalogue {
    pub fn new(cfg: PolyCfg, client: Client) -> Self {
        Self { client, cfg }
    }

    async fn last_trade_price(&self, token_id: &str) -> Result<f64> {
        let resp = self
            .client
            .get(format!("{}/last-trade-price", self.cfg.clob_url))
            .query(&[("token_id", token_id)])
            .send()
            .await
            .context("requesting last trade price")?;

        if !resp.status().is_success() {
            anyhow::bail!("CLOB API error: {}", resp.status());
        }

        let body: LastTradePrice = resp.json().await.context("parsing last trade price")?;
        number(&body.price)
            .filter(|p| (0.0..=1.0).contains(p))
            .context("last trade price missing or out of range")
    }
}

#[async_trait]
impl MarketCatalogue for PolyMarketCatalogue {
    async fn fetch_active_markets(&self, limit: u32) -> Result<Vec<ActiveMarket>> {
        let limit = limit.to_string();
        let resp = self
            .client
            .get(format!("{}/markets", self.cfg.gamma_url))
            .query(&[
                ("closed", "false"),
                ("active", "true"),
                ("limit", limit.as_str()),
                ("order", "volume"),
                ("ascending", "false"),
            ])
            .send()
            .await
            .context("requesting active markets")?;

        if !resp.status().is_success() {
            anyhow::bail!("Gamma API error: {}", resp.status());
        }

        let raw: Vec<GammaMarket> = resp.json().await.context("parsing active markets")?;
        let total = raw.len();
        let markets: Vec<ActiveMarket> = raw.into_iter().filter_map(GammaMarket::into_active).collect();
        debug!(total, kept = markets.len(), "Gamma markets fetched");
        Ok(markets)
    }

    async fn fetch_yes_price(&self, market: &ActiveMarket) -> Result<f64> {
        if let Some(yes_token) = market.clob_token_ids.first() {
            match self.last_trade_price(yes_token).await {
                Ok(p) => return Ok(p),
                Err(e) => {
                    warn!(?e, market_id = %market.id, "last trade price unavailable; using outcome prices")
                }
            }
        }
        market
            .outcome_prices
            .first()
            .copied()
            .filter(|p| (0.0..=1.0).contains(p))
            .with_context(|| format!("no YES price for market {}", market.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalogue(server: &MockServer) -> PolyMarketCatalogue {
        let cfg = PolyCfg {
            gamma_url: server.uri(),
            clob_url: server.uri(),
            ..Default::default()
        };
        PolyMarketCatalogue::new(cfg, Client::new())
    }

    fn gamma_markets() -> serde_json::Value {
        serde_json::json!([
            {
                "id": "501",
                "conditionId": "0xabc",
                "question": "Will BTC reach $100k by March?",
                "slug": "btc-100k-march",
                "category": "Crypto",
                "volume": "2500000.5",
                "clobTokenIds": "[\"yes-1\", \"no-1\"]",
                "outcomePrices": "[\"0.58\", \"0.42\"]"
            },
            {
                "id": "502",
                "question": "Will the Fed cut in June?",
                "slug": "fed-june",
                "volumeNum": 880000.0
            },
            {"id": "503", "question": ""}
        ])
    }

    #[tokio::test]
    async fn test_fetch_active_markets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .and(query_param("active", "true"))
            .and(query_param("closed", "false"))
            .and(query_param("order", "volume"))
            .and(query_param("ascending", "false"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gamma_markets()))
            .expect(1)
            .mount(&server)
            .await;

        let markets = catalogue(&server).fetch_active_markets(20).await.unwrap();
        assert_eq!(markets.len(), 2);

        assert_eq!(markets[0].id, "0xabc");
        assert_eq!(markets[0].clob_token_ids, vec!["yes-1", "no-1"]);
        assert_eq!(markets[0].outcome_prices, vec![0.58, 0.42]);
        assert!((markets[0].volume - 2_500_000.5).abs() < 1e-6);

        assert_eq!(markets[1].id, "502");
        assert_eq!(markets[1].category, "General");
        assert!(markets[1].clob_token_ids.is_empty());
    }

    #[tokio::test]
    async fn test_yes_price_from_clob() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/last-trade-price"))
            .and(query_param("token_id", "yes-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"price": "0.61", "side": "BUY"})),
            )
            .mount(&server)
            .await;

        let market = ActiveMarket {
            id: "0xabc".into(),
            question: "Q?".into(),
            slug: String::new(),
            category: "Crypto".into(),
            volume: 0.0,
            clob_token_ids: vec!["yes-1".into(), "no-1".into()],
            outcome_prices: vec![0.58, 0.42],
        };
        let p = catalogue(&server).fetch_yes_price(&market).await.unwrap();
        assert!((p - 0.61).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_yes_price_falls_back_to_outcome_prices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/last-trade-price"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let market = ActiveMarket {
            id: "0xabc".into(),
            question: "Q?".into(),
            slug: String::new(),
            category: "Crypto".into(),
            volume: 0.0,
            clob_token_ids: vec!["yes-1".into()],
            outcome_prices: vec![0.58, 0.42],
        };
        let p = catalogue(&server).fetch_yes_price(&market).await.unwrap();
        assert!((p - 0.58).abs() < 1e-9);

        let bare = ActiveMarket {
            outcome_prices: vec![],
            ..market
        };
        assert!(catalogue(&server).fetch_yes_price(&bare).await.is_err());
    }
}
