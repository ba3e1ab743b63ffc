use crate::config::config::CacheCfg;
use crate::core::types::PredictionRecord;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Fingerprint of one analysis input. Price is kept to the basis point and
/// volume to the dollar, so feed jitter below that resolution still hits.
pub fn fingerprint(market_id: &str, question: &str, price: f64, volume: f64) -> String {
    format!(
        "{}|{}|{:.4}|{:.0}",
        market_id,
        question.trim().to_lowercase(),
        price,
        volume
    )
}

/// Recent analysis results, shared by concurrent callers.
pub struct AnalysisCache {
    // None when capacity is 0: caching disabled
    inner: Option<Mutex<LruCache<String, (Instant, PredictionRecord)>>>,
    ttl: Duration,
}

impl AnalysisCache {
    pub fn new(cfg: &CacheCfg) -> Self {
        Self {
            inner: NonZeroUsize::new(cfg.capacity).map(|c| Mutex::new(LruCache::new(c))),
            ttl: cfg.ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<PredictionRecord> {
        let mut cache = self.inner.as_ref()?.lock().await;
        match cache.get(key) {
            Some((stored, record)) if stored.elapsed() <= self.ttl => Some(record.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: String, record: PredictionRecord) {
        if let Some(inner) = &self.inner {
            inner.lock().await.put(key, (Instant::now(), record));
        }
    }
}
