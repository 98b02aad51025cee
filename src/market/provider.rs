//! Market context provider
//!
//! The three sub-fetches run concurrently, each under its own timeout. A
//! failed or slow section falls back to empty metrics and is recorded in the
//! snapshot's error list; it never fails the snapshot as a whole.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::types::{
    LiquidityMetrics, MarketSection, MarketSnapshot, OptionsMetrics, ProviderError, StatsMetrics,
};
use crate::common::clock::Clock;
use crate::common::errors::{EngineError, Result};

/// Port for the raw options / liquidity / stats feeds
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn options(&self, symbol: &str) -> Result<OptionsMetrics>;

    async fn liquidity(&self, symbol: &str) -> Result<LiquidityMetrics>;

    async fn stats(&self, symbol: &str) -> Result<StatsMetrics>;

    /// Source name for logs
    fn name(&self) -> &'static str;
}

/// Port consumed by the pipeline: best-effort snapshot for a symbol
#[async_trait]
pub trait MarketContextProvider: Send + Sync {
    async fn fetch(&self, symbol: &str) -> MarketSnapshot;
}

/// Fans out to a [`MarketDataSource`] with per-section timeouts
pub struct CompositeMarketProvider {
    source: Arc<dyn MarketDataSource>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl CompositeMarketProvider {
    pub fn new(source: Arc<dyn MarketDataSource>, timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            timeout,
            clock,
        }
    }
}

async fn bounded<T, F>(section: MarketSection, timeout: Duration, fut: F) -> std::result::Result<T, ProviderError>
where
    F: Future<Output = Result<T>>,
{
    let outcome = match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout(format!(
            "{} fetch exceeded {}ms",
            section,
            timeout.as_millis()
        ))),
    };
    outcome.map_err(|e| ProviderError {
        section,
        message: e.to_string(),
    })
}

/// Unwrap a section result, substituting empty metrics on failure
fn settle<T: Default>(
    symbol: &str,
    result: std::result::Result<T, ProviderError>,
    errors: &mut Vec<ProviderError>,
) -> T {
    match result {
        Ok(metrics) => metrics,
        Err(err) => {
            warn!(
                "Market {} for {} degraded to fallback: {}",
                err.section, symbol, err.message
            );
            errors.push(err);
            T::default()
        }
    }
}

#[async_trait]
impl MarketContextProvider for CompositeMarketProvider {
    #[instrument(skip(self), fields(source = self.source.name()))]
    async fn fetch(&self, symbol: &str) -> MarketSnapshot {
        let (options, liquidity, stats) = tokio::join!(
            bounded(MarketSection::Options, self.timeout, self.source.options(symbol)),
            bounded(MarketSection::Liquidity, self.timeout, self.source.liquidity(symbol)),
            bounded(MarketSection::Stats, self.timeout, self.source.stats(symbol)),
        );

        let mut errors = Vec::new();
        let options = settle(symbol, options, &mut errors);
        let liquidity = settle(symbol, liquidity, &mut errors);
        let stats = settle(symbol, stats, &mut errors);
        let succeeded = MarketSection::ALL.len() - errors.len();

        let completeness = succeeded as f64 / MarketSection::ALL.len() as f64;
        debug!("Market snapshot for {}: completeness {:.2}", symbol, completeness);

        MarketSnapshot {
            symbol: symbol.to_string(),
            options,
            liquidity,
            stats,
            completeness,
            errors,
            fetched_at: self.clock.now(),
        }
    }
}

/// Fixed market data, for paper replays and tests
///
/// A section left unset fails its fetch, which exercises the fallback path.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketSource {
    options: Option<OptionsMetrics>,
    liquidity: Option<LiquidityMetrics>,
    stats: Option<StatsMetrics>,
    delay: Option<Duration>,
}

impl StaticMarketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: OptionsMetrics) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_liquidity(mut self, liquidity: LiquidityMetrics) -> Self {
        self.liquidity = Some(liquidity);
        self
    }

    pub fn with_stats(mut self, stats: StatsMetrics) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Delay every fetch, to simulate a slow provider
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn serve<T: Clone>(&self, section: MarketSection, value: &Option<T>) -> Result<T> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        value
            .clone()
            .ok_or_else(|| EngineError::InvalidResponse(format!("no static {} data", section)))
    }
}

#[async_trait]
impl MarketDataSource for StaticMarketSource {
    async fn options(&self, _symbol: &str) -> Result<OptionsMetrics> {
        self.serve(MarketSection::Options, &self.options).await
    }

    async fn liquidity(&self, _symbol: &str) -> Result<LiquidityMetrics> {
        self.serve(MarketSection::Liquidity, &self.liquidity).await
    }

    async fn stats(&self, _symbol: &str) -> Result<StatsMetrics> {
        self.serve(MarketSection::Stats, &self.stats).await
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
