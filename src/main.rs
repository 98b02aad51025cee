//! Confluence Engine - Main Entry Point
//!
//! Replays newline-delimited webhook payloads through the decision pipeline
//! (paper mode) and prints one JSON outcome per line.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use confluence_engine::config::load_config;
use confluence_engine::storage;
use confluence_engine::{
    AppConfig, Clock, CompositeMarketProvider, ContextRepository, ContextStore, DecisionPipeline,
    HttpMarketSource, InMemoryContextRepository, InMemoryLedgerStore, LedgerStore,
    MarketDataSource, PgContextRepository, PgLedgerStore, Source, StaticMarketSource, SystemClock,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// NDJSON file of webhook payloads to replay (stdin when omitted)
    #[arg(short, long)]
    input: Option<String>,

    /// Treat every payload as coming from this source instead of detecting it
    #[arg(long)]
    source: Option<String>,

    /// Print the context status for a symbol and exit
    #[arg(long, value_name = "SYMBOL")]
    status: Option<String>,
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the outcomes; logs go to stderr
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.with_thread_ids(true).finish())?;
    }
    Ok(())
}

async fn build_pipeline(config: AppConfig) -> Result<DecisionPipeline> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (repository, ledger_store): (Arc<dyn ContextRepository>, Arc<dyn LedgerStore>) =
        match &config.database {
            Some(db) => {
                let pool = storage::connect(db).await?;
                storage::ensure_schema(&pool).await?;
                (
                    Arc::new(PgContextRepository::new(pool.clone())),
                    Arc::new(PgLedgerStore::new(pool)),
                )
            }
            None => {
                warn!("No database configured; contexts and ledger are process-local");
                (
                    Arc::new(InMemoryContextRepository::new()),
                    Arc::new(InMemoryLedgerStore::new()),
                )
            }
        };

    let source: Arc<dyn MarketDataSource> = match &config.market.base_url {
        Some(url) => Arc::new(HttpMarketSource::new(url, config.market.sub_fetch_timeout())?),
        None => {
            warn!("No market data URL configured; every snapshot will be degraded");
            Arc::new(StaticMarketSource::new())
        }
    };
    let provider = Arc::new(CompositeMarketProvider::new(
        source,
        config.market.sub_fetch_timeout(),
        clock.clone(),
    ));

    let store = ContextStore::new(
        repository,
        Arc::new(config.completeness.clone()),
        config.settings.context_update_attempts,
    );

    Ok(DecisionPipeline::new(config, store, provider, ledger_store, clock)?)
}

async fn read_input(path: Option<&str>) -> Result<String> {
    let mut raw = String::new();
    match path {
        Some(path) => {
            raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path))?;
        }
        None => {
            tokio::io::stdin().read_to_string(&mut raw).await?;
        }
    }
    Ok(raw)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(&args.config))?;
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_logging(&level, args.json_logs)?;

    info!("Starting Confluence Engine");
    info!("Configuration file: {}", args.config);

    let declared = match args.source.as_deref() {
        Some(tag) => match Source::from_tag(tag) {
            Some(source) => Some(source),
            None => bail!("unknown source {:?} (expected signal, regime or alignment)", tag),
        },
        None => None,
    };

    let pipeline = build_pipeline(config).await?;

    if let Some(symbol) = args.status.as_deref() {
        let status = pipeline.get_context_status(symbol).await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let raw = read_input(args.input.as_deref()).await?;
    let (mut decided, mut waiting, mut rejected) = (0usize, 0usize, 0usize);

    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;

        let payload: serde_json::Value = match serde_json::from_str(line) {
            Ok(payload) => payload,
            Err(e) => {
                rejected += 1;
                error!("Line {}: not JSON: {}", line_no, e);
                continue;
            }
        };

        match pipeline.handle_webhook(&payload, declared).await {
            Ok(outcome) => {
                if outcome.complete {
                    decided += 1;
                } else {
                    waiting += 1;
                }
                info!("Line {}: {}", line_no, outcome.summary());
                println!("{}", serde_json::to_string(&outcome)?);
            }
            Err(e) => {
                rejected += 1;
                warn!("Line {}: rejected: {}", line_no, e);
                println!(
                    "{}",
                    serde_json::json!({ "line": line_no, "error": e.to_string() })
                );
            }
        }
    }

    info!(
        "Replay finished: {} decided, {} waiting, {} rejected",
        decided, waiting, rejected
    );
    Ok(())
}
