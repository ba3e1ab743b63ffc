use crate::config::config::ContextCfg;
use crate::context::keywords::social_query;
use crate::context::source::{DirectLimiter, FetchWindow, SocialPost, SocialSource, pacing_limiter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tweets: Vec<SocialPost>,
}

/// Advanced search against twitterapi.io.
pub struct TwitterClient {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: Option<Arc<DirectLimiter>>,
}

impl TwitterClient {
    pub fn new(cfg: &ContextCfg, client: Client) -> Self {
        Self {
            client,
            base_url: cfg.twitter_url.trim_end_matches('/').to_string(),
            api_key: cfg.twitter_api_key.clone(),
            limiter: pacing_limiter(cfg.twitter_min_interval),
        }
    }

    fn search_query(keywords: &[String], window: &FetchWindow) -> String {
        format!(
            "{} since:{}_00:00:00_UTC until:{}_23:59:59_UTC",
            social_query(keywords),
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
impl SocialSource for TwitterClient {
    async fn fetch_posts(
        &self,
        keywords: &[String],
        window: &FetchWindow,
    ) -> Result<Vec<SocialPost>> {
        if self.api_key.is_empty() {
            debug!("twitter api key not configured; skipping social search");
            return Ok(Vec::new());
        }

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let query = Self::search_query(keywords, window);
        let resp = self
            .client
            .get(format!("{}/tweet/advanced_search", self.base_url))
            .header("X-API-Key", &self.api_key)
            .query(&[("query", query.as_str()), ("queryType", "Latest")])
            .send()
            .await
            .context("requesting tweets")?;

        if !resp.status().is_success() {
            anyhow::bail!("twitter API error: {}", resp.status());
        }

        let parsed: SearchResponse = resp.json().await.context("parsing tweets")?;
        debug!(query = %query, count = parsed.tweets.len(), "tweets fetched");
        Ok(parsed.tweets)
    }
}
