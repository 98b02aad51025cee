//! Decision engine output types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::types::{Action, Direction, Timestamp};
use crate::context::DecisionContext;
use crate::market::MarketSnapshot;

/// Identifies the rule set that produced a decision
pub const ENGINE_VERSION: &str = concat!("confluence-", env!("CARGO_PKG_VERSION"));

/// Outcome of one gate or market sub-check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub name: String,
    pub passed: bool,
    /// 0-100
    pub score: f64,
    pub reason: String,
    /// A failed blocking gate forces SKIP regardless of confidence
    #[serde(default)]
    pub blocking: bool,
    /// False when the backing data was absent and a neutral score was used
    #[serde(default = "default_evaluated")]
    pub evaluated: bool,
}

fn default_evaluated() -> bool {
    true
}

impl GateResult {
    pub fn pass(name: &str, score: f64, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            score: score.clamp(0.0, 100.0),
            reason: reason.into(),
            blocking: false,
            evaluated: true,
        }
    }

    pub fn fail(name: &str, score: f64, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            ..Self::pass(name, score, reason)
        }
    }

    /// Passing result for a check whose input is missing
    pub fn neutral(name: &str, score: f64, reason: impl Into<String>) -> Self {
        Self {
            evaluated: false,
            ..Self::pass(name, score, reason)
        }
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking && !self.passed;
        self
    }
}

/// Market gate: aggregate plus the three sub-checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketGateResult {
    pub aggregate: GateResult,
    pub spread: GateResult,
    pub volatility: GateResult,
    pub depth: GateResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResults {
    pub regime: GateResult,
    pub structural: GateResult,
    pub market: MarketGateResult,
}

impl GateResults {
    /// First failed gate that blocks the decision
    pub fn blocker(&self) -> Option<&GateResult> {
        [&self.regime, &self.structural, &self.market.aggregate]
            .into_iter()
            .find(|g| g.blocking)
    }
}

/// One weighted confidence input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInput {
    pub name: String,
    /// 0-100, `None` when the backing section is absent
    pub value: Option<f64>,
    /// Configured weight
    pub weight: f64,
    /// Weight after renormalizing over present inputs, 0-1
    pub effective_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub inputs: Vec<ConfidenceInput>,
    /// Weighted average before penalties
    pub weighted: f64,
    /// Points removed for degraded market data
    pub degraded_penalty: f64,
    /// Final confidence, 0-100, two decimals
    pub score: f64,
    /// `score` before rounding; thresholds compare against this
    #[serde(default)]
    pub raw_score: f64,
}

/// One position-size factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeFactor {
    pub name: String,
    /// Value after clamping to the per-factor bounds
    pub value: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeBreakdown {
    pub factors: Vec<SizeFactor>,
    /// Product of all factors before the overall clamp
    pub product: f64,
    pub multiplier: f64,
}

/// Immutable record of one decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPacket {
    pub id: Uuid,
    pub symbol: String,
    pub action: Action,
    /// Committed direction; only set for EXECUTE
    pub direction: Option<Direction>,
    /// Direction the signal asked for, kept for audit
    pub signal_direction: Direction,
    pub confidence: f64,
    pub size_multiplier: f64,
    pub size_factors: Vec<SizeFactor>,
    pub reasons: Vec<String>,
    pub gates: GateResults,
    pub confidence_inputs: ConfidenceBreakdown,
    pub context: DecisionContext,
    pub market: MarketSnapshot,
    pub context_fingerprint: String,
    pub engine_version: String,
    pub decided_at: Timestamp,
}
