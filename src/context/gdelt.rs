use crate::config::config::ContextCfg;
use crate::context::keywords::news_query;
use crate::context::source::{DirectLimiter, FetchWindow, NewsArticle, NewsSource, pacing_limiter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const GDELT_TS: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Default, Deserialize)]
struct GdeltResponse {
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

/// GDELT DOC 2.0 article search.
pub struct GdeltClient {
    client: Client,
    base_url: String,
    max_records: u32,
    limiter: Option<Arc<DirectLimiter>>,
}

impl GdeltClient {
    pub fn new(cfg: &ContextCfg, client: Client) -> Self {
        Self {
            client,
            base_url: cfg.gdelt_url.clone(),
            max_records: cfg.gdelt_max_records,
            limiter: pacing_limiter(cfg.gdelt_min_interval),
        }
    }
}

#[async_trait]
impl NewsSource for GdeltClient {
    async fn fetch_news(
        &self,
        keywords: &[String],
        window: &FetchWindow,
    ) -> Result<Vec<NewsArticle>> {
        let Some(query) = news_query(keywords) else {
            return Ok(Vec::new());
        };

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let max_records = self.max_records.to_string();
        let start = window.start.format(GDELT_TS).to_string();
        let end = window.end.format(GDELT_TS).to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("query", query.as_str()),
                ("mode", "artlist"),
                ("maxrecords", max_records.as_str()),
                ("format", "json"),
                ("startdatetime", start.as_str()),
                ("enddatetime", end.as_str()),
                ("sourcelang", "eng"),
            ])
            .send()
            .await
            .context("requesting GDELT articles")?;

        if !resp.status().is_success() {
            anyhow::bail!("GDELT API error: {}", resp.status());
        }

        // GDELT answers an empty body when nothing matched.
        let body = resp.text().await.context("reading GDELT body")?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: GdeltResponse =
            serde_json::from_str(&body).context("parsing GDELT articles")?;

        debug!(query = %query, count = parsed.articles.len(), "GDELT articles fetched");
        Ok(parsed.articles)
    }
}
