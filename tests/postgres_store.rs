//! Integration tests for the Postgres context repository and ledger
//!
//! These tests need a reachable database named by `DATABASE_URL`; each run
//! uses fresh symbols, so they can share a database with other runs.
//!
//! To run these tests:
//! ```
//! DATABASE_URL=postgres://localhost/confluence cargo test --test postgres_store -- --ignored
//! ```

mod common;

use std::sync::Arc;
use uuid::Uuid;

use common::{healthy_market, webhooks, T0};
use confluence_engine::config::DatabaseConfig;
use confluence_engine::{
    storage, AppConfig, CompositeMarketProvider, ContextStore, DecisionPipeline, ManualClock,
    PgContextRepository, PgLedgerStore, Source,
};

async fn pool() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for Postgres tests");
    let pool = storage::connect(&DatabaseConfig {
        url,
        max_connections: 16,
        connection_timeout_seconds: 10,
    })
    .await
    .expect("Failed to connect to Postgres");
    storage::ensure_schema(&pool).await.expect("Failed to create schema");
    pool
}

/// Symbol no other run has written
fn fresh_symbol() -> String {
    format!("PG{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase()
}

#[tokio::test]
#[ignore] // Run with: cargo test --test postgres_store -- --ignored
async fn test_concurrent_updates_converge() {
    let pool = pool().await;
    let config = AppConfig::default();
    let store = ContextStore::new(
        Arc::new(PgContextRepository::new(pool)),
        Arc::new(config.completeness.clone()),
        16,
    );
    let symbol = fresh_symbol();

    let payloads = [
        (webhooks::regime(&symbol, "MARKUP", 90.0), Source::Regime),
        (webhooks::expert(&symbol, "LONG", 8.5, "HIGH"), Source::Signal),
        (webhooks::alignment(&symbol), Source::Alignment),
    ];
    let writers: Vec<_> = (0..12)
        .map(|i| {
            let store = store.clone();
            let (payload, source) = payloads[i % payloads.len()].clone();
            tokio::spawn(async move {
                let update = confluence_engine::normalize(&payload, source).unwrap();
                store
                    .update(&update.symbol, update.partial, update.source, *T0)
                    .await
            })
        })
        .collect();
    for writer in writers {
        tokio_test::assert_ok!(writer.await.unwrap());
    }

    let context = store.get(&symbol).await.unwrap().unwrap();
    assert_eq!(context.version, 12);
    assert!(context.regime.is_some());
    assert!(context.expert.is_some());
    assert!(context.alignment.is_some());
    assert!(store.is_complete(&symbol, *T0).await.unwrap());
}

#[tokio::test]
#[ignore] // Run with: cargo test --test postgres_store -- --ignored
async fn test_refired_context_returns_recorded_decision() {
    let pool = pool().await;
    let config = AppConfig::default();
    let clock = Arc::new(ManualClock::new(*T0));
    let store = ContextStore::new(
        Arc::new(PgContextRepository::new(pool.clone())),
        Arc::new(config.completeness.clone()),
        config.settings.context_update_attempts,
    );
    let provider = Arc::new(CompositeMarketProvider::new(
        Arc::new(healthy_market()),
        config.market.sub_fetch_timeout(),
        clock.clone(),
    ));
    let ledger = Arc::new(PgLedgerStore::new(pool));
    let pipeline = DecisionPipeline::new(config, store, provider, ledger, clock)
        .expect("default config is consistent");

    let symbol = fresh_symbol();
    let payload = webhooks::expert(&symbol, "LONG", 9.0, "HIGH");
    let first = pipeline.handle_webhook(&payload, None).await.unwrap();
    let second = pipeline.handle_webhook(&payload, None).await.unwrap();

    let first_decision = first.decision.unwrap();
    assert!(first.ledger.unwrap().stored);

    let second_ledger = second.ledger.unwrap();
    let second_decision = second.decision.unwrap();
    assert!(second_ledger.duplicate);
    assert_eq!(second_ledger.id, first_decision.id);
    assert_eq!(second_decision.id, first_decision.id);
    assert_eq!(second_decision.action, first_decision.action);

    let records = pipeline
        .query_ledger(&confluence_engine::LedgerFilter::for_symbol(&symbol))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].price > rust_decimal::Decimal::ZERO);
}
