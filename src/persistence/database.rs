use crate::core::error::PersistenceError;
use crate::core::types::{
    Action, ActiveMarket, ExecutionCredentials, Headline, Prediction, PredictionDraft,
    PredictionRecord, RiskProfile, TelegramTarget,
};
use crate::persistence::store::Store;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

fn observe<T>(
    table: &'static str,
    op: &'static str,
    start: Instant,
    res: &std::result::Result<T, sqlx::Error>,
) {
    let status = if res.is_ok() { "success" } else { "error" };
    metrics::counter!("database_queries_total", "table" => table, "op" => op, "status" => status)
        .increment(1);
    metrics::histogram!("database_query_duration_seconds", "table" => table, "op" => op)
        .record(start.elapsed().as_secs_f64());
}

impl Database {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS markets (
                id TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                slug TEXT,
                category TEXT,
                volume DOUBLE PRECISION NOT NULL DEFAULT 0,
                clob_token_ids JSONB,
                last_scanned_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id UUID PRIMARY KEY,
                market_id TEXT NOT NULL,
                question TEXT NOT NULL,
                category TEXT,
                market_probability DOUBLE PRECISION NOT NULL,
                fair_probability DOUBLE PRECISION NOT NULL,
                edge_percentage DOUBLE PRECISION NOT NULL,
                action TEXT NOT NULL,
                confidence SMALLINT NOT NULL,
                edge_quality TEXT NOT NULL,
                signal_agreement TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                key_signals JSONB NOT NULL,
                risk_factors JSONB NOT NULL,
                top_headlines JSONB NOT NULL,
                sentiment_score DOUBLE PRECISION NOT NULL,
                raw_context TEXT NOT NULL,
                model_version TEXT NOT NULL,
                prompt_version TEXT NOT NULL,
                simulated BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS predictions_market_created ON predictions (market_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                is_pro BOOLEAN NOT NULL DEFAULT FALSE,
                min_edge_threshold DOUBLE PRECISION NOT NULL DEFAULT 10,
                min_confidence_threshold DOUBLE PRECISION NOT NULL DEFAULT 70,
                discord_webhook TEXT,
                telegram_bot_token TEXT,
                telegram_chat_id TEXT,
                exec_api_key TEXT,
                exec_secret TEXT,
                exec_passphrase TEXT,
                categories JSONB,
                auto_trade BOOLEAN NOT NULL DEFAULT FALSE,
                max_bet_usd DOUBLE PRECISION NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database tables initialized (Postgres)");
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: String,
    min_edge_threshold: f64,
    min_confidence_threshold: f64,
    discord_webhook: Option<String>,
    telegram_bot_token: Option<String>,
    telegram_chat_id: Option<String>,
    exec_api_key: Option<String>,
    exec_secret: Option<String>,
    exec_passphrase: Option<String>,
    categories: Option<Json<Vec<String>>>,
    auto_trade: bool,
    max_bet_usd: f64,
}

impl TryFrom<ProfileRow> for RiskProfile {
    type Error = PersistenceError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let mut profile = RiskProfile::new(
            row.id,
            row.min_edge_threshold,
            row.min_confidence_threshold,
        )
        .map_err(|e| PersistenceError::InvalidRow {
            table: "profiles",
            reason: e.to_string(),
        })?;

        profile.discord_webhook = row.discord_webhook.filter(|u| !u.is_empty());
        profile.telegram = match (row.telegram_bot_token, row.telegram_chat_id) {
            (Some(bot_token), Some(chat_id)) if !bot_token.is_empty() && !chat_id.is_empty() => {
                Some(TelegramTarget { bot_token, chat_id })
            }
            _ => None,
        };
        profile.execution = match (row.exec_api_key, row.exec_secret) {
            (Some(api_key), Some(secret)) => Some(ExecutionCredentials {
                api_key,
                secret,
                passphrase: row.exec_passphrase.unwrap_or_default(),
            }),
            _ => None,
        };
        profile.categories = row.categories.map(|c| c.0).unwrap_or_default();
        profile.auto_trade = row.auto_trade;
        profile.max_bet_usd = row.max_bet_usd;
        Ok(profile)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PredictionRow {
    id: Uuid,
    market_id: String,
    question: String,
    category: Option<String>,
    market_probability: f64,
    fair_probability: f64,
    edge_percentage: f64,
    action: String,
    confidence: i16,
    edge_quality: String,
    signal_agreement: String,
    reasoning: String,
    key_signals: Json<Vec<String>>,
    risk_factors: Json<Vec<String>>,
    top_headlines: Json<Vec<Headline>>,
    sentiment_score: f64,
    raw_context: String,
    model_version: String,
    prompt_version: String,
    simulated: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PredictionRow> for PredictionRecord {
    type Error = PersistenceError;

    fn try_from(row: PredictionRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| PersistenceError::InvalidRow {
            table: "predictions",
            reason,
        };
        let action =
            Action::parse(&row.action).ok_or_else(|| invalid(format!("unknown action {:?}", row.action)))?;
        let prediction = Prediction::try_from(PredictionDraft {
            market_probability: row.market_probability,
            fair_probability: row.fair_probability,
            edge_percentage: row.edge_percentage,
            action: Some(action),
            confidence: f64::from(row.confidence),
            edge_quality: row.edge_quality,
            signal_agreement: row.signal_agreement,
            reasoning: row.reasoning,
            key_signals: row.key_signals.0,
            risk_factors: row.risk_factors.0,
            simulated: row.simulated,
        })
        .map_err(|e| invalid(e.to_string()))?;

        Ok(PredictionRecord {
            id: row.id,
            market_id: row.market_id,
            question: row.question,
            category: row.category,
            prediction,
            top_headlines: row.top_headlines.0,
            sentiment_score: row.sentiment_score,
            raw_context: row.raw_context,
            model_version: row.model_version,
            prompt_version: row.prompt_version,
            created_at: row.created_at,
        })
    }
}

fn encode<T: serde::Serialize + ?Sized>(
    table: &'static str,
    value: &T,
) -> Result<serde_json::Value, PersistenceError> {
    serde_json::to_value(value).map_err(|source| PersistenceError::Encode { table, source })
}

#[async_trait]
impl Store for Database {
    async fn upsert_market(&self, market: &ActiveMarket) -> Result<(), PersistenceError> {
        let start = Instant::now();
        let tokens = encode("markets", &market.clob_token_ids)?;

        let res = sqlx::query(
            r#"
            INSERT INTO markets (id, question, slug, category, volume, clob_token_ids, last_scanned_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO UPDATE SET
                question = EXCLUDED.question,
                slug = EXCLUDED.slug,
                category = EXCLUDED.category,
                volume = EXCLUDED.volume,
                clob_token_ids = EXCLUDED.clob_token_ids,
                last_scanned_at = NOW()
            "#,
        )
        .bind(&market.id)
        .bind(&market.question)
        .bind(&market.slug)
        .bind(&market.category)
        .bind(market.volume)
        .bind(tokens)
        .execute(&self.pool)
        .await;

        observe("markets", "upsert", start, &res);
        res.map_err(|source| PersistenceError::Query {
            table: "markets",
            source,
        })?;
        Ok(())
    }

    async fn insert_prediction(&self, record: &PredictionRecord) -> Result<(), PersistenceError> {
        let start = Instant::now();
        let p = &record.prediction;
        let key_signals = encode("predictions", p.key_signals())?;
        let risk_factors = encode("predictions", p.risk_factors())?;
        let headlines = encode("predictions", &record.top_headlines)?;

        let res = sqlx::query(
            r#"
            INSERT INTO predictions (
                id, market_id, question, category, market_probability, fair_probability,
                edge_percentage, action, confidence, edge_quality, signal_agreement, reasoning,
                key_signals, risk_factors, top_headlines, sentiment_score, raw_context,
                model_version, prompt_version, simulated, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(record.id)
        .bind(&record.market_id)
        .bind(&record.question)
        .bind(&record.category)
        .bind(p.market_probability())
        .bind(p.fair_probability())
        .bind(p.edge_percentage())
        .bind(p.action().as_str())
        .bind(i16::from(p.confidence()))
        .bind(p.edge_quality())
        .bind(p.signal_agreement())
        .bind(p.reasoning())
        .bind(key_signals)
        .bind(risk_factors)
        .bind(headlines)
        .bind(record.sentiment_score)
        .bind(&record.raw_context)
        .bind(&record.model_version)
        .bind(&record.prompt_version)
        .bind(p.is_simulated())
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        observe("predictions", "insert", start, &res);
        res.map_err(|source| PersistenceError::Query {
            table: "predictions",
            source,
        })?;
        Ok(())
    }

    async fn load_active_profiles(&self) -> Result<Vec<RiskProfile>, PersistenceError> {
        let start = Instant::now();
        let res: std::result::Result<Vec<ProfileRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, min_edge_threshold, min_confidence_threshold, discord_webhook,
                   telegram_bot_token, telegram_chat_id, exec_api_key, exec_secret,
                   exec_passphrase, categories, auto_trade, max_bet_usd
            FROM profiles
            WHERE is_pro = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await;

        observe("profiles", "select", start, &res);
        let rows = res.map_err(|source| PersistenceError::Query {
            table: "profiles",
            source,
        })?;

        // one malformed profile must not silence everyone else's alerts
        let mut profiles = Vec::with_capacity(rows.len());
        for row in rows {
            match RiskProfile::try_from(row) {
                Ok(p) => profiles.push(p),
                Err(e) => warn!(?e, "skipping invalid profile row"),
            }
        }
        Ok(profiles)
    }

    async fn recent_predictions(
        &self,
        market_id: &str,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>, PersistenceError> {
        let start = Instant::now();
        let res: std::result::Result<Vec<PredictionRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT * FROM predictions
            WHERE market_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(market_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await;

        observe("predictions", "select", start, &res);
        let rows = res.map_err(|source| PersistenceError::Query {
            table: "predictions",
            source,
        })?;
        rows.into_iter().map(PredictionRecord::try_from).collect()
    }
}
