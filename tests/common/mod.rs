//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

use confluence_engine::market::{LiquidityMetrics, OptionsMetrics, StatsMetrics};
use confluence_engine::{
    AppConfig, CompositeMarketProvider, ContextStore, DecisionPipeline, InMemoryContextRepository,
    InMemoryLedgerStore, ManualClock, MarketDataSource, StaticMarketSource, Timestamp,
};

/// Tuesday 2025-03-04 15:00 UTC, inside US regular hours
pub static T0: Lazy<Timestamp> = Lazy::new(|| Utc.with_ymd_and_hms(2025, 3, 4, 15, 0, 0).unwrap());

/// Tight spread, deep book, ATR in line with realized volatility
pub fn healthy_market() -> StaticMarketSource {
    StaticMarketSource::new()
        .with_options(OptionsMetrics {
            put_call_ratio: Some(0.85),
            ..OptionsMetrics::default()
        })
        .with_liquidity(LiquidityMetrics {
            spread_bps: Some(2.0),
            bid_size: Some(1500.0),
            ask_size: Some(1200.0),
            ..LiquidityMetrics::default()
        })
        .with_stats(StatsMetrics {
            atr14: Some(1.0),
            realized_vol: Some(1.1),
            volume_ratio: Some(1.3),
            ..StatsMetrics::default()
        })
}

/// Every section fails, so every snapshot is fully degraded
pub fn dead_market() -> StaticMarketSource {
    StaticMarketSource::new()
}

pub struct Harness {
    pub pipeline: DecisionPipeline,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InMemoryLedgerStore>,
}

pub fn harness(source: impl MarketDataSource + 'static) -> Harness {
    harness_with(AppConfig::default(), source)
}

pub fn harness_with(config: AppConfig, source: impl MarketDataSource + 'static) -> Harness {
    let clock = Arc::new(ManualClock::new(*T0));
    let ledger = Arc::new(InMemoryLedgerStore::new());
    let provider = Arc::new(CompositeMarketProvider::new(
        Arc::new(source),
        Duration::from_millis(config.market.sub_fetch_timeout_ms),
        clock.clone(),
    ));
    let store = ContextStore::new(
        Arc::new(InMemoryContextRepository::new()),
        Arc::new(config.completeness.clone()),
        config.settings.context_update_attempts,
    );
    let pipeline = DecisionPipeline::new(config, store, provider, ledger.clone(), clock.clone())
        .expect("default config is consistent");

    Harness {
        pipeline,
        clock,
        ledger,
    }
}

/// Sample webhook payloads, in the shapes indicator vendors actually send
pub mod webhooks {
    use serde_json::{json, Value};

    pub fn regime(symbol: &str, phase: &str, confidence: f64) -> Value {
        json!({
            "indicator": "regime",
            "symbol": symbol,
            "phase": { "name": phase },
            "confidence": confidence
        })
    }

    pub fn expert(symbol: &str, direction: &str, ai_score: f64, quality: &str) -> Value {
        json!({
            "source": "signal",
            "ticker": symbol,
            "price": 450.25,
            "signal": { "direction": direction, "ai_score": ai_score, "quality": quality },
            "risk": { "rr_ratio_t1": 2.5, "stop_loss": 447.0, "targets": [452.0, 455.0] }
        })
    }

    /// Expert payload with no risk block at all
    pub fn bare_expert(symbol: &str, direction: &str, ai_score: f64, quality: &str) -> Value {
        json!({
            "ticker": symbol,
            "direction": direction,
            "ai_score": ai_score,
            "quality": quality
        })
    }

    pub fn alignment(symbol: &str) -> Value {
        json!({
            "symbol": symbol,
            "timeframes": {
                "5m": "bullish",
                "15m": "bullish",
                "1h": { "bias": "bullish" },
                "4h": "bearish"
            }
        })
    }
}
