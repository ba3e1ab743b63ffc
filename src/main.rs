mod config;
mod context;
mod core;
mod execution;
mod llm;
mod marketdata;
mod notify;
mod orchestrator;
mod persistence;
mod prompt;
mod risk;
mod scanner;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crate::config::config::AppCfg;
use crate::context::aggregator::ContextAggregator;
use crate::context::gdelt::GdeltClient;
use crate::context::twitter::TwitterClient;
use crate::core::types::{Actor, Question};
use crate::execution::simulator::SimExecutionClient;
use crate::llm::client::{DecisionModel, LlmClient};
use crate::llm::simulator::SimulatedModel;
use crate::marketdata::polymarket::PolyMarketCatalogue;
use crate::notify::Notifier;
use crate::orchestrator::analysis::SignalOrchestrator;
use crate::persistence::database::Database;
use crate::persistence::memory::MemoryStore;
use crate::persistence::store::Store;
use crate::risk::engine::{FanoutEngine, OrderOutcome};
use crate::scanner::actor::ScannerActor;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "polyedge")]
#[command(about = "News- and social-driven edge detection for prediction markets")]
struct Args {
    /// Config file (YAML); environment variables override it
    #[arg(long, env = "POLYEDGE_CONFIG", default_value = "config.yml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the most active markets on an interval until Ctrl-C
    Scan,
    /// Analyse a single market question once
    Analyze {
        #[arg(long)]
        question: String,
        #[arg(long)]
        market_id: String,
        /// Current YES price in [0, 1]
        #[arg(long)]
        price: f64,
        #[arg(long, default_value_t = 0.0)]
        volume: f64,
        #[arg(long)]
        category: Option<String>,
        /// YES and NO outcome token ids, needed for order placement
        #[arg(long, num_args = 2, value_names = ["YES", "NO"])]
        tokens: Option<Vec<String>>,
    },
    /// Print the latest stored predictions of a market
    History {
        #[arg(long)]
        market_id: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

async fn build_store(cfg: &AppCfg) -> Result<Arc<dyn Store>> {
    if cfg.database.url.is_empty() {
        let profiles = cfg
            .profiles
            .iter()
            .map(|p| p.to_profile())
            .collect::<Result<Vec<_>>>()?;
        info!(profiles = profiles.len(), "Using in-memory store");
        return Ok(Arc::new(MemoryStore::with_profiles(profiles)));
    }
    if !cfg.profiles.is_empty() {
        warn!("config profiles are ignored when a database is configured");
    }
    let db = Database::new(&cfg.database.url, cfg.database.max_connections)
        .await
        .context("connecting to Postgres")?;
    Ok(Arc::new(db))
}

fn build_model(cfg: &AppCfg) -> Arc<dyn DecisionModel> {
    if cfg.llm.simulated {
        info!("Using simulated decision model");
        Arc::new(SimulatedModel::new())
    } else {
        info!(model = %cfg.llm.model, base_url = %cfg.llm.base_url, "Using live decision model");
        Arc::new(LlmClient::new(cfg.llm.clone()))
    }
}

async fn build_orchestrator(cfg: &AppCfg, client: &Client) -> Result<Arc<SignalOrchestrator>> {
    let aggregator = ContextAggregator::new(
        Arc::new(GdeltClient::new(&cfg.context, client.clone())),
        Arc::new(TwitterClient::new(&cfg.context, client.clone())),
        cfg.context.clone(),
    );
    let engine = FanoutEngine::new(
        Notifier::new(client.clone(), cfg.notify.clone()),
        Arc::new(SimExecutionClient::new()),
        cfg.polymarket.market_url_base.clone(),
        cfg.notify.order_expiry,
    );
    Ok(Arc::new(SignalOrchestrator::new(
        aggregator,
        build_model(cfg),
        build_store(cfg).await?,
        engine,
        &cfg.cache,
        cfg.orchestrator.clone(),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = AppCfg::load(&args.config)?;

    // Root span for the supervisor/main thread
    let span = info_span!(
        "Supervisor",
        pid = %std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
    );
    let _enter = span.enter();

    info!("Initializing Client");
    let client = Client::builder()
        .user_agent(cfg.http.user_agent.clone())
        .pool_idle_timeout(cfg.http.pool_idle_timeout)
        .pool_max_idle_per_host(cfg.http.pool_max_idle_per_host)
        .tcp_keepalive(cfg.http.tcp_keep_alive)
        .timeout(cfg.http.timeout)
        .build()
        .context("building HTTP client")?;

    let orchestrator = build_orchestrator(&cfg, &client).await?;

    match args.command {
        Command::Scan => run_scanner(&cfg, client, orchestrator).await,
        Command::Analyze {
            question,
            market_id,
            price,
            volume,
            category,
            tokens,
        } => {
            let mut q = Question::new(question, market_id, price, volume)?;
            if let Some(c) = category {
                q = q.with_category(c);
            }
            if let Some([yes, no]) = tokens.as_deref() {
                q = q.with_tokens(yes, no);
            }
            let Some(outcome) = orchestrator.analyze_question(&q).await else {
                anyhow::bail!("analysis produced no prediction for {}", q.market_id());
            };
            println!("{}", serde_json::to_string_pretty(&outcome.record)?);
            if let Some(e) = &outcome.persist_error {
                warn!(?e, "prediction was not stored");
            }
            for report in &outcome.fanout {
                let order = match &report.order {
                    OrderOutcome::Submitted(r) => format!("submitted {}", r.client_order_id),
                    OrderOutcome::NotAttempted(reason) => format!("not attempted ({reason:?})"),
                    OrderOutcome::Failed(e) => format!("failed: {e}"),
                };
                info!(
                    profile_id = %report.profile_id,
                    decision = %report.decision,
                    alerts = report.alerts_delivered(),
                    %order,
                    "fan-out"
                );
            }
            Ok(())
        }
        Command::History { market_id, limit } => {
            let records = orchestrator
                .store()
                .recent_predictions(&market_id, limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
    }
}

async fn run_scanner(
    cfg: &AppCfg,
    client: Client,
    orchestrator: Arc<SignalOrchestrator>,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    let catalogue = Arc::new(PolyMarketCatalogue::new(cfg.polymarket.clone(), client));
    let scanner = ScannerActor::new(
        catalogue,
        orchestrator,
        cfg.scanner.clone(),
        shutdown.clone(),
    );

    let mut actors = tokio::task::JoinSet::new();
    actors.spawn(scanner.run().instrument(info_span!("Scanner")));

    tokio::select! {
        _ = async {
            while let Some(res) = actors.join_next().await {
                match res {
                    Ok(Ok(()))  => info!("Actor exited cleanly"),
                    Ok(Err(e))  => error!(?e, "Actor returned error"),
                    Err(panic)  => error!(?panic, "Actor panicked/cancelled"),
                }
            }
        } => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down supervisor loop");
            shutdown.cancel();
        }
    }

    info!("Waiting for graceful shutdown of actors");
    while let Some(res) = actors.join_next().await {
        match res {
            Ok(Ok(())) => info!("Actor exited cleanly"),
            Ok(Err(e)) => error!(?e, "Actor returned error"),
            Err(panic) => error!(?panic, "Actor panicked/cancelled"),
        }
    }

    info!("Supervisor exit");
    Ok(())
}
