//! Decision engine: context + market snapshot -> decision packet

use tracing::debug;
use uuid::Uuid;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{Action, Timestamp};
use crate::config::{AppConfig, ConfidenceWeights, DecisionThresholds, GateConfig, SizingConfig};
use crate::context::DecisionContext;
use crate::market::MarketSnapshot;

use super::confidence::compute_confidence;
use super::gates::{market_gate, regime_gate, structural_gate};
use super::sizing::size_multiplier;
use super::types::{DecisionPacket, GateResult, GateResults, ENGINE_VERSION};

/// AI scores below this are called out in the reasons
const LOW_AI_SCORE: f64 = 6.0;

/// Stateless rule engine
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    thresholds: DecisionThresholds,
    weights: ConfidenceWeights,
    gates: GateConfig,
    sizing: SizingConfig,
}

impl DecisionEngine {
    pub fn new(
        thresholds: DecisionThresholds,
        weights: ConfidenceWeights,
        gates: GateConfig,
        sizing: SizingConfig,
    ) -> Self {
        Self {
            thresholds,
            weights,
            gates,
            sizing,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.thresholds, config.weights, config.gates, config.sizing)
    }

    pub fn thresholds(&self) -> &DecisionThresholds {
        &self.thresholds
    }

    /// Evaluate a staleness-masked context
    ///
    /// Missing optional sections degrade confidence; a missing or malformed
    /// expert section is an error and produces no packet.
    pub fn evaluate(
        &self,
        context: &DecisionContext,
        snapshot: &MarketSnapshot,
        now: Timestamp,
    ) -> Result<DecisionPacket> {
        let expert = context.expert.as_ref().ok_or_else(|| {
            EngineError::MalformedExpert(format!("no expert section for {}", context.symbol()))
        })?;
        expert.validate()?;
        let direction = expert.direction;

        let gates = GateResults {
            regime: regime_gate(context, direction, &self.gates),
            structural: structural_gate(context, expert, &self.gates),
            market: market_gate(snapshot, &self.gates),
        };

        let confidence = compute_confidence(
            context,
            expert,
            &gates,
            snapshot,
            &self.weights,
            self.gates.target_rr,
            self.gates.degraded_penalty,
        );

        let blocker = gates.blocker().cloned();
        let action = match &blocker {
            Some(_) => Action::Skip,
            None => confidence.action(&self.thresholds),
        };

        let sizing = size_multiplier(context, expert, snapshot, now, &self.sizing);

        let mut reasons = vec![self.summary(action, confidence.score, blocker.as_ref())];
        for gate in [
            &gates.regime,
            &gates.structural,
            &gates.market.spread,
            &gates.market.volatility,
            &gates.market.depth,
        ] {
            let status = match (gate.evaluated, gate.passed) {
                (false, _) => "n/a",
                (true, true) => "pass",
                (true, false) => "fail",
            };
            reasons.push(format!("{} [{}]: {}", gate.name, status, gate.reason));
        }

        if expert.ai_score < LOW_AI_SCORE {
            reasons.push(format!(
                "Low AI score {:.1}/10 ({} quality)",
                expert.ai_score, expert.quality
            ));
        } else {
            reasons.push(format!(
                "AI score {:.1}/10 ({} quality)",
                expert.ai_score, expert.quality
            ));
        }

        let excluded: Vec<&str> = confidence
            .inputs
            .iter()
            .filter(|i| i.value.is_none())
            .map(|i| i.name.as_str())
            .collect();
        if !excluded.is_empty() {
            reasons.push(format!(
                "Confidence renormalized without: {}",
                excluded.join(", ")
            ));
        }
        if snapshot.degraded() {
            reasons.push(format!(
                "Market data degraded ({:.0}% real): -{:.2} confidence",
                snapshot.completeness * 100.0,
                confidence.degraded_penalty
            ));
        }

        debug!(
            "{} {} {} confidence {:.2} size {:.2}",
            context.symbol(),
            action,
            direction,
            confidence.score,
            sizing.multiplier
        );

        Ok(DecisionPacket {
            id: Uuid::new_v4(),
            symbol: context.symbol().to_string(),
            action,
            direction: (action == Action::Execute).then_some(direction),
            signal_direction: direction,
            confidence: confidence.score,
            size_multiplier: sizing.multiplier,
            size_factors: sizing.factors,
            reasons,
            gates,
            confidence_inputs: confidence,
            context: context.clone(),
            market: snapshot.clone(),
            context_fingerprint: context.fingerprint(),
            engine_version: ENGINE_VERSION.to_string(),
            decided_at: now,
        })
    }

    fn summary(&self, action: Action, confidence: f64, blocker: Option<&GateResult>) -> String {
        match (action, blocker) {
            (_, Some(gate)) => format!("SKIP: blocked by {} gate ({})", gate.name, gate.reason),
            (Action::Execute, None) => format!(
                "EXECUTE: confidence {:.2} >= {:.2}",
                confidence, self.thresholds.execute
            ),
            (Action::Wait, None) => format!(
                "WAIT: confidence {:.2} in [{:.2}, {:.2})",
                confidence, self.thresholds.wait, self.thresholds.execute
            ),
            (Action::Skip, None) => format!(
                "SKIP: confidence {:.2} < {:.2}",
                confidence, self.thresholds.wait
            ),
        }
    }
}
