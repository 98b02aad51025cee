//! Postgres pool and schema bootstrap shared by the durable backends

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::common::errors::Result;
use crate::config::DatabaseConfig;

/// Open a connection pool
#[instrument(skip(config), fields(max_connections = config.max_connections))]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .connect(&config.url)
        .await?;
    info!("Connected to Postgres ({} max connections)", config.max_connections);
    Ok(pool)
}

/// Create the context, ledger and outcome tables when missing
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decision_contexts (
            symbol TEXT PRIMARY KEY,
            version BIGINT NOT NULL,
            context JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decision_ledger (
            id UUID PRIMARY KEY,
            symbol TEXT NOT NULL,
            action TEXT NOT NULL CHECK (action IN ('EXECUTE', 'WAIT', 'SKIP')),
            direction TEXT,
            confidence DOUBLE PRECISION NOT NULL,
            size_multiplier DOUBLE PRECISION NOT NULL,
            price NUMERIC(18,6) NOT NULL CHECK (price > 0),
            stop_loss NUMERIC(18,6) CHECK (stop_loss > 0),
            targets JSONB NOT NULL DEFAULT '[]'::jsonb,
            context_fingerprint TEXT NOT NULL UNIQUE,
            engine_version TEXT NOT NULL,
            decided_at TIMESTAMPTZ NOT NULL,
            packet JSONB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_decision_ledger_symbol_time ON decision_ledger(symbol, decided_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decision_outcomes (
            decision_id UUID PRIMARY KEY REFERENCES decision_ledger(id),
            exit_price NUMERIC(18,6) NOT NULL,
            realized_pnl NUMERIC(18,6) NOT NULL,
            closed_at TIMESTAMPTZ NOT NULL,
            note TEXT,
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    debug!("Schema ensured");
    Ok(())
}
