use crate::config::config::ContextCfg;
use crate::context::bundle::ContextBundle;
use crate::context::keywords::extract_keywords;
use crate::context::source::{FetchWindow, NewsArticle, NewsSource, SocialPost, SocialSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Collects news and social mentions for a question and folds them into a [`ContextBundle`].
///
/// Every upstream failure degrades to "no items from that source"; `gather` never fails.
pub struct ContextAggregator {
    news: Arc<dyn NewsSource>,
    social: Arc<dyn SocialSource>,
    cfg: ContextCfg,
}

impl ContextAggregator {
    pub fn new(news: Arc<dyn NewsSource>, social: Arc<dyn SocialSource>, cfg: ContextCfg) -> Self {
        Self { news, social, cfg }
    }

    pub fn lookback(&self) -> Duration {
        self.cfg.lookback
    }

    #[tracing::instrument(skip(self), fields(keywords = tracing::field::Empty))]
    pub async fn gather(&self, question: &str, lookback: Duration) -> ContextBundle {
        let keywords = extract_keywords(question, self.cfg.max_keywords);
        tracing::Span::current().record("keywords", keywords.join(",").as_str());
        let window = FetchWindow::ending_now(lookback);

        let (news, posts) = tokio::join!(
            self.fetch_news(&keywords, &window),
            self.fetch_posts(&keywords, &window)
        );
        debug!(news = news.len(), posts = posts.len(), "context fetched");

        ContextBundle::from_sources(
            news,
            posts,
            &self.cfg.engagement_policy,
            self.cfg.per_tier_cap,
        )
    }

    async fn fetch_news(&self, keywords: &[String], window: &FetchWindow) -> Vec<NewsArticle> {
        match tokio::time::timeout(self.cfg.fetch_timeout, self.news.fetch_news(keywords, window))
            .await
        {
            Ok(Ok(articles)) => articles,
            Ok(Err(e)) => {
                warn!(?e, stage = "news", "news fetch failed; continuing without news");
                metrics::counter!("context_fetch_failures_total", "source" => "news").increment(1);
                Vec::new()
            }
            Err(_) => {
                warn!(timeout = ?self.cfg.fetch_timeout, stage = "news", "news fetch timed out");
                metrics::counter!("context_fetch_failures_total", "source" => "news").increment(1);
                Vec::new()
            }
        }
    }

    async fn fetch_posts(&self, keywords: &[String], window: &FetchWindow) -> Vec<SocialPost> {
        match tokio::time::timeout(
            self.cfg.fetch_timeout,
            self.social.fetch_posts(keywords, window),
        )
        .await
        {
            Ok(Ok(posts)) => posts,
            Ok(Err(e)) => {
                warn!(?e, stage = "social", "social fetch failed; continuing without posts");
                metrics::counter!("context_fetch_failures_total", "source" => "social").increment(1);
                Vec::new()
            }
            Err(_) => {
                warn!(timeout = ?self.cfg.fetch_timeout, stage = "social", "social fetch timed out");
                metrics::counter!("context_fetch_failures_total", "source" => "social").increment(1);
                Vec::new()
            }
        }
    }
}
