//! Market snapshot data model
//!
//! Every metric is an `Option`: `None` means the provider did not report it,
//! while `Some(0.0)` is a real reading. Gates depend on that distinction.

use serde::{Deserialize, Serialize};

use crate::common::types::Timestamp;

/// Dealer gamma positioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GammaBias {
    #[serde(alias = "positive", alias = "long")]
    Positive,
    #[serde(alias = "negative", alias = "short")]
    Negative,
    #[serde(alias = "neutral")]
    Neutral,
}

/// Option-flow metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsMetrics {
    #[serde(default, alias = "putCallRatio", alias = "pcr")]
    pub put_call_ratio: Option<f64>,
    #[serde(default, alias = "ivPercentile", alias = "iv_rank")]
    pub iv_percentile: Option<f64>,
    #[serde(default, alias = "gammaBias", alias = "gex_bias")]
    pub gamma_bias: Option<GammaBias>,
    #[serde(default, alias = "optionVolume", alias = "volume")]
    pub option_volume: Option<f64>,
    #[serde(default, alias = "maxPain")]
    pub max_pain: Option<f64>,
}

/// Order book liquidity metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiquidityMetrics {
    /// Bid/ask spread in basis points
    #[serde(default, alias = "spreadBps", alias = "spread")]
    pub spread_bps: Option<f64>,
    /// Provider depth score, 0-100
    #[serde(default, alias = "depthScore")]
    pub depth_score: Option<f64>,
    #[serde(default, alias = "bidSize")]
    pub bid_size: Option<f64>,
    #[serde(default, alias = "askSize")]
    pub ask_size: Option<f64>,
    #[serde(default, alias = "tradeVelocity")]
    pub trade_velocity: Option<f64>,
}

/// Statistical price metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsMetrics {
    #[serde(default, alias = "atr", alias = "atr_14")]
    pub atr14: Option<f64>,
    #[serde(default, alias = "realizedVol", alias = "realized_volatility")]
    pub realized_vol: Option<f64>,
    #[serde(default, alias = "trendSlope")]
    pub trend_slope: Option<f64>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default, alias = "volumeRatio", alias = "relative_volume")]
    pub volume_ratio: Option<f64>,
}

/// The three independently fetched snapshot sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSection {
    Options,
    Liquidity,
    Stats,
}

impl MarketSection {
    pub const ALL: [MarketSection; 3] = [
        MarketSection::Options,
        MarketSection::Liquidity,
        MarketSection::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSection::Options => "options",
            MarketSection::Liquidity => "liquidity",
            MarketSection::Stats => "stats",
        }
    }
}

impl std::fmt::Display for MarketSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sub-fetch that failed or timed out and fell back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderError {
    pub section: MarketSection,
    pub message: String,
}

/// Market data used for one decision attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub options: OptionsMetrics,
    pub liquidity: LiquidityMetrics,
    pub stats: StatsMetrics,
    /// Fraction of sub-providers that returned real data, 0.0-1.0
    pub completeness: f64,
    #[serde(default)]
    pub errors: Vec<ProviderError>,
    pub fetched_at: Timestamp,
}

impl MarketSnapshot {
    /// Snapshot where every section is at its fallback
    pub fn unavailable(symbol: &str, reason: &str, fetched_at: Timestamp) -> Self {
        Self {
            symbol: symbol.to_string(),
            options: OptionsMetrics::default(),
            liquidity: LiquidityMetrics::default(),
            stats: StatsMetrics::default(),
            completeness: 0.0,
            errors: MarketSection::ALL
                .iter()
                .map(|section| ProviderError {
                    section: *section,
                    message: reason.to_string(),
                })
                .collect(),
            fetched_at,
        }
    }

    /// Whether any section is running on fallback values
    pub fn degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}
