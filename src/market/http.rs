//! HTTP market data source
//!
//! Expects a service exposing `GET {base}/options/{symbol}`,
//! `GET {base}/liquidity/{symbol}` and `GET {base}/stats/{symbol}`, each
//! returning a flat JSON object of metrics.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::provider::MarketDataSource;
use super::types::{LiquidityMetrics, MarketSection, OptionsMetrics, StatsMetrics};
use crate::common::errors::{EngineError, Result};

/// REST client for the market data service
#[derive(Debug, Clone)]
pub struct HttpMarketSource {
    client: Client,
    base_url: String,
}

impl HttpMarketSource {
    /// Create a client; `timeout` caps each request at the HTTP layer
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| EngineError::Configuration(format!("invalid market data URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn get_section<T: DeserializeOwned>(&self, section: MarketSection, symbol: &str) -> Result<T> {
        let url = format!("{}/{}/{}", self.base_url, section, symbol);
        debug!("Fetching market data from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::InvalidResponse(format!(
                "{} endpoint returned status: {}",
                section,
                response.status()
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketDataSource for HttpMarketSource {
    async fn options(&self, symbol: &str) -> Result<OptionsMetrics> {
        self.get_section(MarketSection::Options, symbol).await
    }

    async fn liquidity(&self, symbol: &str) -> Result<LiquidityMetrics> {
        self.get_section(MarketSection::Liquidity, symbol).await
    }

    async fn stats(&self, symbol: &str) -> Result<StatsMetrics> {
        self.get_section(MarketSection::Stats, symbol).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unparseable_url() {
        let err = HttpMarketSource::new("not a url", Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let source = HttpMarketSource::new("http://localhost:9000/", Duration::from_millis(100)).unwrap();
        assert_eq!(source.base_url, "http://localhost:9000");
    }
}
