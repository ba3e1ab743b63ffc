use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One request per `period`. A zero period disables pacing.
pub fn pacing_limiter(period: Duration) -> Option<Arc<DirectLimiter>> {
    Quota::with_period(period).map(|q| Arc::new(RateLimiter::direct(q)))
}

/// Time range searched by both sources.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    pub fn ending_now(lookback: Duration) -> Self {
        let end = Utc::now();
        let span = chrono::Duration::from_std(lookback).unwrap_or(chrono::Duration::days(3));
        Self {
            start: end - span,
            end,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NewsArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialAuthor {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub is_blue_verified: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub author: SocialAuthor,
}

#[async_trait]
pub trait NewsSource: Send + Sync + 'static {
    async fn fetch_news(&self, keywords: &[String], window: &FetchWindow)
    -> Result<Vec<NewsArticle>>;
}

#[async_trait]
pub trait SocialSource: Send + Sync + 'static {
    async fn fetch_posts(&self, keywords: &[String], window: &FetchWindow)
    -> Result<Vec<SocialPost>>;
}
