use crate::core::types::{ExecutionCredentials, RiskProfile, TelegramTarget};
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub polymarket: PolyCfg,
    #[serde(default)]
    pub context: ContextCfg,
    #[serde(default)]
    pub llm: LlmCfg,
    #[serde(default)]
    pub database: DatabaseCfg,
    #[serde(default)]
    pub orchestrator: OrchestratorCfg,
    #[serde(default)]
    pub notify: NotifyCfg,
    #[serde(default)]
    pub scanner: ScannerCfg,
    #[serde(default)]
    pub cache: CacheCfg,
    /// Seed profiles for the in-memory store.
    #[serde(default)]
    pub profiles: Vec<ProfileCfg>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpCfg {
    #[serde(default = "default_ua")]
    pub user_agent: String,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_pool_idle")]
    pub pool_idle_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_keep_alive")]
    pub tcp_keep_alive: Duration,
    #[serde(default = "default_pool")]
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            user_agent: default_ua(),
            timeout: default_timeout(),
            pool_idle_timeout: default_pool_idle(),
            tcp_keep_alive: default_keep_alive(),
            pool_max_idle_per_host: default_pool(),
        }
    }
}
fn default_ua() -> String {
    "polyedge/0.1".into()
}
fn default_timeout() -> Duration {
    Duration::from_secs(20)
}
fn default_pool_idle() -> Duration {
    Duration::from_secs(90)
}
fn default_keep_alive() -> Duration {
    Duration::from_secs(60)
}
fn default_pool() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolyCfg {
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    #[serde(default = "default_clob_url")]
    pub clob_url: String,
    #[serde(default = "default_market_url_base")]
    pub market_url_base: String,
}

impl Default for PolyCfg {
    fn default() -> Self {
        Self {
            gamma_url: default_gamma_url(),
            clob_url: default_clob_url(),
            market_url_base: default_market_url_base(),
        }
    }
}
fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".into()
}
fn default_clob_url() -> String {
    "https://clob.polymarket.com".into()
}
fn default_market_url_base() -> String {
    "https://polymarket.com/market".into()
}

/// How unverified social posts are tiered.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EngagementPolicy {
    /// Every unverified post lands in tier 4.
    Flat,
    /// High-engagement posts are promoted to tier 2, zero-engagement posts demoted to tier 5.
    Engagement {
        #[serde(default = "default_min_reposts")]
        min_reposts: u64,
        #[serde(default = "default_min_likes")]
        min_likes: u64,
    },
}

impl Default for EngagementPolicy {
    fn default() -> Self {
        EngagementPolicy::Engagement {
            min_reposts: default_min_reposts(),
            min_likes: default_min_likes(),
        }
    }
}
fn default_min_reposts() -> u64 {
    100
}
fn default_min_likes() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextCfg {
    #[serde(default = "default_gdelt_url")]
    pub gdelt_url: String,
    #[serde(default = "default_gdelt_max_records")]
    pub gdelt_max_records: u32,
    #[serde(with = "humantime_serde", default = "default_gdelt_interval")]
    pub gdelt_min_interval: Duration,
    #[serde(default = "default_twitter_url")]
    pub twitter_url: String,
    #[serde(default)]
    pub twitter_api_key: String,
    #[serde(with = "humantime_serde", default = "default_twitter_interval")]
    pub twitter_min_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_lookback")]
    pub lookback: Duration,
    #[serde(with = "humantime_serde", default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_per_tier_cap")]
    pub per_tier_cap: usize,
    #[serde(default)]
    pub engagement_policy: EngagementPolicy,
}

impl Default for ContextCfg {
    fn default() -> Self {
        Self {
            gdelt_url: default_gdelt_url(),
            gdelt_max_records: default_gdelt_max_records(),
            gdelt_min_interval: default_gdelt_interval(),
            twitter_url: default_twitter_url(),
            twitter_api_key: "".to_string(),
            twitter_min_interval: default_twitter_interval(),
            lookback: default_lookback(),
            fetch_timeout: default_fetch_timeout(),
            max_keywords: default_max_keywords(),
            per_tier_cap: default_per_tier_cap(),
            engagement_policy: EngagementPolicy::default(),
        }
    }
}
fn default_gdelt_url() -> String {
    "https://api.gdeltproject.org/api/v2/doc/doc".into()
}
fn default_gdelt_max_records() -> u32 {
    20
}
fn default_gdelt_interval() -> Duration {
    Duration::from_secs(5)
}
fn default_twitter_url() -> String {
    "https://api.twitterapi.io/twitter".into()
}
fn default_twitter_interval() -> Duration {
    Duration::from_millis(200)
}
fn default_lookback() -> Duration {
    Duration::from_secs(3 * 24 * 3600)
}
fn default_fetch_timeout() -> Duration {
    Duration::from_secs(20)
}
fn default_max_keywords() -> usize {
    3
}
fn default_per_tier_cap() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmCfg {
    /// Without a live model the pipeline answers with the simulated prediction.
    #[serde(default = "default_simulated")]
    pub simulated: bool,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_rpm")]
    pub rate_limit_rpm: u32,
    #[serde(with = "humantime_serde", default = "default_llm_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmCfg {
    fn default() -> Self {
        Self {
            simulated: default_simulated(),
            base_url: default_llm_base_url(),
            api_key: "".to_string(),
            model: default_model(),
            rate_limit_rpm: default_rpm(),
            timeout: default_llm_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}
fn default_simulated() -> bool {
    true
}
fn default_llm_base_url() -> String {
    "http://localhost:8000/v1".into()
}
fn default_model() -> String {
    "polyedge-llama-3.1-8b".into()
}
fn default_rpm() -> u32 {
    30
}
fn default_llm_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseCfg {
    /// Postgres connection string. Empty selects the in-memory store.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}
impl Default for DatabaseCfg {
    fn default() -> Self {
        Self {
            url: "".to_string(),
            max_connections: default_max_connections(),
        }
    }
}
fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorCfg {
    #[serde(default = "default_alert_confidence")]
    pub alert_confidence: u8,
    #[serde(default = "default_attempts")]
    pub inference_attempts: u32,
}

impl Default for OrchestratorCfg {
    fn default() -> Self {
        Self {
            alert_confidence: default_alert_confidence(),
            inference_attempts: default_attempts(),
        }
    }
}
fn default_alert_confidence() -> u8 {
    70
}
fn default_attempts() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyCfg {
    #[serde(default = "default_telegram_url")]
    pub telegram_api_url: String,
    #[serde(default = "default_reasoning_limit")]
    pub reasoning_limit: usize,
    #[serde(with = "humantime_serde", default = "default_order_expiry")]
    pub order_expiry: Duration,
}

impl Default for NotifyCfg {
    fn default() -> Self {
        Self {
            telegram_api_url: default_telegram_url(),
            reasoning_limit: default_reasoning_limit(),
            order_expiry: default_order_expiry(),
        }
    }
}
fn default_telegram_url() -> String {
    "https://api.telegram.org".into()
}
fn default_reasoning_limit() -> usize {
    1024
}
fn default_order_expiry() -> Duration {
    Duration::from_secs(3600)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerCfg {
    #[serde(with = "humantime_serde", default = "default_scan_interval")]
    pub interval: Duration,
    #[serde(default = "default_market_limit")]
    pub market_limit: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ScannerCfg {
    fn default() -> Self {
        Self {
            interval: default_scan_interval(),
            market_limit: default_market_limit(),
            concurrency: default_concurrency(),
        }
    }
}
fn default_scan_interval() -> Duration {
    Duration::from_secs(900)
}
fn default_market_limit() -> u32 {
    20
}
fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheCfg {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub ttl: Duration,
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl: default_cache_ttl(),
        }
    }
}
fn default_cache_capacity() -> usize {
    256
}
fn default_cache_ttl() -> Duration {
    Duration::from_secs(600)
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProfileCfg {
    pub id: String,
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default)]
    pub discord_webhook: Option<String>,
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub auto_trade: bool,
    #[serde(default)]
    pub max_bet_usd: f64,
    #[serde(default)]
    pub exec_api_key: Option<String>,
    #[serde(default)]
    pub exec_secret: Option<String>,
    #[serde(default)]
    pub exec_passphrase: Option<String>,
}
fn default_min_edge() -> f64 {
    10.0
}
fn default_min_confidence() -> f64 {
    70.0
}

impl ProfileCfg {
    pub fn to_profile(&self) -> Result<RiskProfile> {
        let mut profile = RiskProfile::new(&self.id, self.min_edge, self.min_confidence)
            .with_context(|| format!("profile {:?}", self.id))?;
        profile.discord_webhook = self.discord_webhook.clone().filter(|u| !u.is_empty());
        profile.telegram = match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramTarget {
                bot_token: bot_token.clone(),
                chat_id: chat_id.clone(),
            }),
            _ => None,
        };
        profile.execution = match (&self.exec_api_key, &self.exec_secret) {
            (Some(api_key), Some(secret)) => Some(ExecutionCredentials {
                api_key: api_key.clone(),
                secret: secret.clone(),
                passphrase: self.exec_passphrase.clone().unwrap_or_default(),
            }),
            _ => None,
        };
        profile.categories = self.categories.clone();
        profile.auto_trade = self.auto_trade;
        profile.max_bet_usd = self.max_bet_usd;
        Ok(profile)
    }
}

impl AppCfg {
    pub fn load(path: &str) -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(config::Environment::default().separator("__"))
            .build()
            .context("building config")?;

        let app: AppCfg = cfg.try_deserialize().context("deserializing config")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.polymarket.gamma_url.is_empty(),
            "polymarket.gamma_url missing"
        );
        anyhow::ensure!(
            !self.polymarket.clob_url.is_empty(),
            "polymarket.clob_url missing"
        );
        anyhow::ensure!(!self.context.gdelt_url.is_empty(), "context.gdelt_url missing");
        anyhow::ensure!(
            self.context.per_tier_cap > 0,
            "context.per_tier_cap must be > 0"
        );
        anyhow::ensure!(
            self.context.max_keywords > 0,
            "context.max_keywords must be > 0"
        );
        anyhow::ensure!(
            self.llm.simulated || !self.llm.base_url.is_empty(),
            "llm.base_url required unless llm.simulated is set"
        );
        anyhow::ensure!(
            self.orchestrator.alert_confidence <= 100,
            "orchestrator.alert_confidence must be within 0..=100"
        );
        anyhow::ensure!(
            self.orchestrator.inference_attempts > 0,
            "orchestrator.inference_attempts must be > 0"
        );
        anyhow::ensure!(self.scanner.concurrency > 0, "scanner.concurrency must be > 0");
        anyhow::ensure!(!self.scanner.interval.is_zero(), "scanner.interval must be > 0");
        for p in &self.profiles {
            p.to_profile()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_defaults_validate() {
        let cfg = AppCfg::default();
        cfg.validate().expect("defaults must be valid");
        assert_eq!(cfg.context.per_tier_cap, 10);
        assert_eq!(cfg.context.lookback, Duration::from_secs(3 * 24 * 3600));
        assert_eq!(cfg.orchestrator.alert_confidence, 70);
        assert!(cfg.llm.simulated);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut cfg = AppCfg::default();
        cfg.scanner.concurrency = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
context:
  lookback: 1day
  per_tier_cap: 5
  twitter_api_key: yaml-key
  engagement_policy:
    mode: flat
llm:
  simulated: false
  base_url: http://gpu-box:8000/v1
orchestrator:
  alert_confidence: 80
  inference_attempts: 3
"#;
        let cfg: AppCfg = Config::builder()
            .add_source(File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.context.lookback, Duration::from_secs(86400));
        assert_eq!(cfg.context.per_tier_cap, 5);
        assert_eq!(cfg.context.twitter_api_key, "yaml-key");
        assert_eq!(cfg.context.engagement_policy, EngagementPolicy::Flat);
        assert!(!cfg.llm.simulated);
        assert_eq!(cfg.llm.base_url, "http://gpu-box:8000/v1");
        assert_eq!(cfg.orchestrator.alert_confidence, 80);
        assert_eq!(cfg.orchestrator.inference_attempts, 3);
        // untouched sections keep their defaults
        assert_eq!(cfg.scanner.concurrency, 4);
    }

    #[test]
    fn test_profiles_section() {
        let yaml = r#"
profiles:
  - id: alice
    min_edge: 5
    discord_webhook: https://discord.com/api/webhooks/1/x
    categories: [Crypto]
  - id: bob
    min_confidence: 150
"#;
        let cfg: AppCfg = Config::builder()
            .add_source(File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let alice = cfg.profiles[0].to_profile().unwrap();
        assert_eq!(alice.min_confidence_threshold(), 70.0);
        assert_eq!(alice.categories, vec!["Crypto"]);
        assert!(alice.telegram.is_none());
        // bob's threshold is out of range
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_sample_file() {
        let cfg = AppCfg::load("config.yml").unwrap();
        assert_eq!(cfg.http.pool_max_idle_per_host, 16);
        assert_eq!(cfg.polymarket.market_url_base, "https://polymarket.com/market");
        assert_eq!(cfg.context.gdelt_min_interval, Duration::from_secs(5));
        assert_eq!(cfg.context.fetch_timeout, Duration::from_secs(20));
        assert_eq!(
            cfg.context.engagement_policy,
            EngagementPolicy::Engagement {
                min_reposts: 100,
                min_likes: 500
            }
        );
        assert_eq!(cfg.orchestrator.inference_attempts, 2);
        assert_eq!(cfg.notify.order_expiry, Duration::from_secs(3600));
        assert_eq!(cfg.scanner.interval, Duration::from_secs(900));

        let trader = cfg.profiles[0].to_profile().unwrap();
        assert_eq!(trader.id(), "local-paper-trader");
        assert!(trader.auto_trade);
        assert_eq!(trader.max_bet_usd, 100.0);
        assert!(trader.execution.is_some());
    }

    #[test]
    fn test_env_var_override() {
        unsafe {
            env::set_var("CONTEXT__TWITTER_API_KEY", "env-key-123");
        }

        let cfg = AppCfg::load("does-not-exist.yml");

        unsafe {
            env::remove_var("CONTEXT__TWITTER_API_KEY");
        }

        assert_eq!(cfg.unwrap().context.twitter_api_key, "env-key-123");
    }
}
