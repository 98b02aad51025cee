//! Configuration types
//!
//! Every tunable the core consults lives here exactly once. Components receive
//! the relevant section (usually behind an `Arc`) instead of holding their own
//! copies of thresholds or completeness rules.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::types::Source;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which sources gate completeness and how long contributions stay fresh
    #[serde(default)]
    pub completeness: CompletenessConfig,
    /// Confidence cut-offs for EXECUTE / WAIT / SKIP
    #[serde(default)]
    pub thresholds: DecisionThresholds,
    /// Weights of the five confidence inputs
    #[serde(default)]
    pub weights: ConfidenceWeights,
    /// Gate thresholds and blocking policy
    #[serde(default)]
    pub gates: GateConfig,
    /// Position-size multiplier bounds
    #[serde(default)]
    pub sizing: SizingConfig,
    /// Market data provider settings
    #[serde(default)]
    pub market: MarketDataConfig,
    /// Decision ledger settings
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Database configuration (optional; in-memory backends are used without it)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Completeness rules for the context store
///
/// This is the single source of truth for "is this context ready to decide".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessConfig {
    /// Sources that must be present and fresh
    #[serde(default = "default_required_sources")]
    pub required_sources: Vec<Source>,
    /// Sources that only contribute to confidence
    #[serde(default = "default_optional_sources")]
    pub optional_sources: Vec<Source>,
    /// Age in seconds after which a source's contribution is stale
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl CompletenessConfig {
    pub fn max_age(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.max_age_secs as i64)
    }

    /// Required sources first, then optional ones, without duplicates
    pub fn tracked_sources(&self) -> Vec<Source> {
        let mut sources = self.required_sources.clone();
        for source in &self.optional_sources {
            if !sources.contains(source) {
                sources.push(*source);
            }
        }
        sources
    }
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            required_sources: default_required_sources(),
            optional_sources: default_optional_sources(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

fn default_required_sources() -> Vec<Source> {
    vec![Source::Signal]
}

fn default_optional_sources() -> Vec<Source> {
    vec![Source::Regime, Source::Alignment]
}

fn default_max_age_secs() -> u64 {
    15 * 60
}

/// Confidence thresholds (inclusive lower bounds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    /// confidence >= this value executes
    #[serde(default = "default_execute_threshold")]
    pub execute: f64,
    /// confidence >= this value (and below `execute`) waits
    #[serde(default = "default_wait_threshold")]
    pub wait: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            execute: default_execute_threshold(),
            wait: default_wait_threshold(),
        }
    }
}

fn default_execute_threshold() -> f64 {
    75.0
}

fn default_wait_threshold() -> f64 {
    60.0
}

/// Weights of the confidence inputs, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default = "default_regime_weight")]
    pub regime: f64,
    #[serde(default = "default_expert_weight")]
    pub expert: f64,
    #[serde(default = "default_alignment_weight")]
    pub alignment: f64,
    #[serde(default = "default_market_weight")]
    pub market: f64,
    #[serde(default = "default_risk_reward_weight")]
    pub risk_reward: f64,
}

impl ConfidenceWeights {
    pub fn total(&self) -> f64 {
        self.regime + self.expert + self.alignment + self.market + self.risk_reward
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            regime: default_regime_weight(),
            expert: default_expert_weight(),
            alignment: default_alignment_weight(),
            market: default_market_weight(),
            risk_reward: default_risk_reward_weight(),
        }
    }
}

fn default_regime_weight() -> f64 {
    30.0
}

fn default_expert_weight() -> f64 {
    25.0
}

fn default_alignment_weight() -> f64 {
    20.0
}

fn default_market_weight() -> f64 {
    15.0
}

fn default_risk_reward_weight() -> f64 {
    10.0
}

/// Gate thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Score given to a gate whose input section is absent
    #[serde(default = "default_neutral_score")]
    pub neutral_score: f64,
    /// Regime confidence below this fails the regime gate
    #[serde(default = "default_min_regime_confidence")]
    pub min_regime_confidence: f64,
    /// Points added when the higher-timeframe bias agrees with the local bias
    #[serde(default = "default_htf_boost")]
    pub htf_agreement_boost: f64,
    /// Spread above this many basis points fails the spread check
    #[serde(default = "default_max_spread_bps")]
    pub max_spread_bps: f64,
    /// ATR / realized-volatility ratio above this is treated as a spike
    #[serde(default = "default_max_volatility_ratio")]
    pub max_volatility_ratio: f64,
    /// Smaller of bid/ask size below this fails the depth check
    #[serde(default = "default_min_depth_size")]
    pub min_depth_size: f64,
    /// Smaller of bid/ask size at which the depth score saturates
    #[serde(default = "default_full_depth_size")]
    pub full_depth_size: f64,
    /// Risk/reward ratio that earns a full risk/reward score
    #[serde(default = "default_target_rr")]
    pub target_rr: f64,
    /// Confidence points removed when every market sub-provider fell back
    #[serde(default = "default_degraded_penalty")]
    pub degraded_penalty: f64,
    /// A phase that forbids the signal direction forces SKIP
    #[serde(default = "default_true")]
    pub block_on_regime_conflict: bool,
    /// An invalid structural setup forces SKIP
    #[serde(default = "default_true")]
    pub block_on_invalid_setup: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            neutral_score: default_neutral_score(),
            min_regime_confidence: default_min_regime_confidence(),
            htf_agreement_boost: default_htf_boost(),
            max_spread_bps: default_max_spread_bps(),
            max_volatility_ratio: default_max_volatility_ratio(),
            min_depth_size: default_min_depth_size(),
            full_depth_size: default_full_depth_size(),
            target_rr: default_target_rr(),
            degraded_penalty: default_degraded_penalty(),
            block_on_regime_conflict: true,
            block_on_invalid_setup: true,
        }
    }
}

fn default_neutral_score() -> f64 {
    50.0
}

fn default_min_regime_confidence() -> f64 {
    60.0
}

fn default_htf_boost() -> f64 {
    10.0
}

fn default_max_spread_bps() -> f64 {
    15.0
}

fn default_max_volatility_ratio() -> f64 {
    2.5
}

fn default_min_depth_size() -> f64 {
    100.0
}

fn default_full_depth_size() -> f64 {
    1000.0
}

fn default_target_rr() -> f64 {
    3.0
}

fn default_degraded_penalty() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

/// Position-size multiplier bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Lower bound of each individual factor
    #[serde(default = "default_factor_min")]
    pub factor_min: f64,
    /// Upper bound of each individual factor
    #[serde(default = "default_factor_max")]
    pub factor_max: f64,
    /// Lower bound of the final multiplier
    #[serde(default = "default_multiplier_min")]
    pub multiplier_min: f64,
    /// Upper bound of the final multiplier
    #[serde(default = "default_multiplier_max")]
    pub multiplier_max: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            factor_min: default_factor_min(),
            factor_max: default_factor_max(),
            multiplier_min: default_multiplier_min(),
            multiplier_max: default_multiplier_max(),
        }
    }
}

fn default_factor_min() -> f64 {
    0.8
}

fn default_factor_max() -> f64 {
    1.5
}

fn default_multiplier_min() -> f64 {
    0.5
}

fn default_multiplier_max() -> f64 {
    3.0
}

/// Market data provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Base URL of the market data service (options/liquidity/stats endpoints)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per sub-fetch timeout in milliseconds
    #[serde(default = "default_sub_fetch_timeout")]
    pub sub_fetch_timeout_ms: u64,
}

impl MarketDataConfig {
    pub fn sub_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.sub_fetch_timeout_ms)
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            sub_fetch_timeout_ms: default_sub_fetch_timeout(),
        }
    }
}

fn default_sub_fetch_timeout() -> u64 {
    600
}

/// Decision ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Total write attempts before reporting failure
    #[serde(default = "default_ledger_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_ledger_retry_delay")]
    pub retry_delay_ms: u64,
    /// Substituted for missing or non-positive price fields
    #[serde(default = "default_fallback_price")]
    pub fallback_price: f64,
}

impl LedgerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_ledger_attempts(),
            retry_delay_ms: default_ledger_retry_delay(),
            fallback_price: default_fallback_price(),
        }
    }
}

fn default_ledger_attempts() -> u32 {
    2
}

fn default_ledger_retry_delay() -> u64 {
    150
}

fn default_fallback_price() -> f64 {
    0.01
}

/// Database configuration for the context store and ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    30
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Overall budget for handling one webhook, in milliseconds
    #[serde(default = "default_response_budget")]
    pub response_budget_ms: u64,
    /// Optimistic concurrency attempts for one context update
    #[serde(default = "default_update_attempts")]
    pub context_update_attempts: u32,
}

impl AppSettings {
    pub fn response_budget(&self) -> Duration {
        Duration::from_millis(self.response_budget_ms)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            response_budget_ms: default_response_budget(),
            context_update_attempts: default_update_attempts(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_response_budget() -> u64 {
    3000
}

fn default_update_attempts() -> u32 {
    8
}
