//! Decision engine
//!
//! Gates (regime, structural, market) feed a weighted confidence score,
//! which maps to EXECUTE / WAIT / SKIP through the configured thresholds.
//! Position size is derived independently from eight bounded factors.

mod confidence;
mod evaluator;
mod gates;
mod sizing;
mod types;

pub use confidence::{classify, compute_confidence};
pub use evaluator::DecisionEngine;
pub use gates::{depth_check, market_gate, regime_gate, rr_quality, spread_check, structural_gate, volatility_check};
pub use sizing::size_multiplier;
pub use types::{
    ConfidenceBreakdown, ConfidenceInput, DecisionPacket, GateResult, GateResults,
    MarketGateResult, SizeBreakdown, SizeFactor, ENGINE_VERSION,
};
