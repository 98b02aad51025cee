//! Weighted confidence and action thresholds

use crate::common::types::Action;
use crate::config::{ConfidenceWeights, DecisionThresholds};
use crate::context::{DecisionContext, ExpertSection};
use crate::market::MarketSnapshot;

use super::gates::rr_quality;
use super::types::{ConfidenceBreakdown, ConfidenceInput, GateResults};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weighted average over present inputs, minus the degraded-data penalty
///
/// Absent inputs are dropped and the remaining weights renormalized; a
/// missing section never counts as zero.
pub fn compute_confidence(
    context: &DecisionContext,
    expert: &ExpertSection,
    gates: &GateResults,
    snapshot: &MarketSnapshot,
    weights: &ConfidenceWeights,
    target_rr: f64,
    degraded_penalty: f64,
) -> ConfidenceBreakdown {
    let direction = expert.direction;
    let raw = [
        (
            "regime",
            context.regime.as_ref().map(|_| gates.regime.score),
            weights.regime,
        ),
        ("expert", Some(expert.ai_score * 10.0), weights.expert),
        (
            "alignment",
            context.alignment.as_ref().map(|a| a.agreement_pct(direction)),
            weights.alignment,
        ),
        (
            "market",
            gates
                .market
                .aggregate
                .evaluated
                .then_some(gates.market.aggregate.score),
            weights.market,
        ),
        (
            "risk_reward",
            expert.risk_reward().map(|rr| rr_quality(rr, target_rr)),
            weights.risk_reward,
        ),
    ];

    let present_weight: f64 = raw
        .iter()
        .filter(|(_, value, _)| value.is_some())
        .map(|(_, _, weight)| weight)
        .sum();

    let inputs: Vec<ConfidenceInput> = raw
        .iter()
        .map(|(name, value, weight)| ConfidenceInput {
            name: name.to_string(),
            value: value.map(|v| v.clamp(0.0, 100.0)),
            weight: *weight,
            effective_weight: match value {
                Some(_) if present_weight > 0.0 => weight / present_weight,
                _ => 0.0,
            },
        })
        .collect();

    let weighted: f64 = inputs
        .iter()
        .filter_map(|i| i.value.map(|v| v * i.effective_weight))
        .sum();

    let penalty = degraded_penalty * (1.0 - snapshot.completeness.clamp(0.0, 1.0));
    let raw_score = (weighted - penalty).clamp(0.0, 100.0);

    ConfidenceBreakdown {
        inputs,
        weighted: round2(weighted),
        degraded_penalty: round2(penalty),
        score: round2(raw_score),
        raw_score,
    }
}

impl ConfidenceBreakdown {
    /// Action for the unrounded score
    pub fn action(&self, thresholds: &DecisionThresholds) -> Action {
        classify(self.raw_score, thresholds)
    }
}

/// Map confidence to an action; lower bounds are inclusive
pub fn classify(confidence: f64, thresholds: &DecisionThresholds) -> Action {
    if confidence >= thresholds.execute {
        Action::Execute
    } else if confidence >= thresholds.wait {
        Action::Wait
    } else {
        Action::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{Bias, Direction, QualityTier};
    use crate::config::GateConfig;
    use crate::context::{AlignmentSection, RegimeSection};
    use crate::engine::gates::{market_gate, regime_gate, structural_gate};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn expert(score: f64, rr: Option<f64>) -> ExpertSection {
        ExpertSection {
            direction: Direction::Long,
            ai_score: score,
            quality: QualityTier::from_ai_score(score),
            rr_t1: rr,
            rr_t2: None,
            stop_loss: None,
            targets: vec![],
        }
    }

    fn healthy_snapshot() -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::unavailable("SPY", "", Utc::now());
        snapshot.errors.clear();
        snapshot.completeness = 1.0;
        snapshot.liquidity.spread_bps = Some(0.0);
        snapshot
    }

    fn gates_for(ctx: &DecisionContext, expert: &ExpertSection, snapshot: &MarketSnapshot) -> GateResults {
        let cfg = GateConfig::default();
        GateResults {
            regime: regime_gate(ctx, expert.direction, &cfg),
            structural: structural_gate(ctx, expert, &cfg),
            market: market_gate(snapshot, &cfg),
        }
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let t = DecisionThresholds::default();
        assert_eq!(classify(75.0, &t), Action::Execute);
        assert_eq!(classify(74.99, &t), Action::Wait);
        assert_eq!(classify(60.0, &t), Action::Wait);
        assert_eq!(classify(59.99, &t), Action::Skip);
    }

    #[test]
    fn test_missing_sections_renormalize_weights() {
        let ctx = DecisionContext::new("SPY");
        let expert = expert(8.0, Some(1.5));
        let snapshot = healthy_snapshot();
        let gates = gates_for(&ctx, &expert, &snapshot);

        let breakdown = compute_confidence(
            &ctx,
            &expert,
            &gates,
            &snapshot,
            &ConfidenceWeights::default(),
            3.0,
            5.0,
        );

        // expert 80 (25), market 100 (15), risk/reward 50 (10)
        let expected = (80.0 * 25.0 + 100.0 * 15.0 + 50.0 * 10.0) / 50.0;
        assert_eq!(breakdown.score, expected);
        let regime = &breakdown.inputs[0];
        assert_eq!(regime.value, None);
        assert_eq!(regime.effective_weight, 0.0);
        let total: f64 = breakdown.inputs.iter().map(|i| i.effective_weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_inputs_present() {
        let mut ctx = DecisionContext::new("SPY");
        ctx.regime = Some(RegimeSection {
            phase_id: Some(2),
            phase_name: "MARKUP".into(),
            bias: Bias::Bullish,
            confidence: 90.0,
            volatility: None,
            htf_bias: None,
        });
        ctx.alignment = Some(AlignmentSection {
            timeframes: BTreeMap::new(),
            bullish_pct: 70.0,
            bearish_pct: 30.0,
        });
        let expert = expert(9.0, Some(3.0));
        let snapshot = healthy_snapshot();
        let gates = gates_for(&ctx, &expert, &snapshot);

        let breakdown = compute_confidence(
            &ctx,
            &expert,
            &gates,
            &snapshot,
            &ConfidenceWeights::default(),
            3.0,
            5.0,
        );
        let expected = (90.0 * 30.0 + 90.0 * 25.0 + 70.0 * 20.0 + 100.0 * 15.0 + 100.0 * 10.0) / 100.0;
        assert!((breakdown.score - expected).abs() < 0.01);
    }

    #[test]
    fn test_degraded_snapshot_penalized() {
        let ctx = DecisionContext::new("SPY");
        let expert = expert(7.0, None);
        let snapshot = MarketSnapshot::unavailable("SPY", "down", Utc::now());
        let gates = gates_for(&ctx, &expert, &snapshot);

        let breakdown = compute_confidence(
            &ctx,
            &expert,
            &gates,
            &snapshot,
            &ConfidenceWeights::default(),
            3.0,
            5.0,
        );
        assert_eq!(breakdown.weighted, 70.0);
        assert_eq!(breakdown.degraded_penalty, 5.0);
        assert_eq!(breakdown.score, 65.0);
    }

    #[test]
    fn test_action_uses_unrounded_score() {
        let thresholds = DecisionThresholds::default();
        let near = |raw: f64| ConfidenceBreakdown {
            inputs: vec![],
            weighted: round2(raw),
            degraded_penalty: 0.0,
            score: round2(raw),
            raw_score: raw,
        };

        assert_eq!(near(74.996).score, 75.0);
        assert_eq!(near(74.996).action(&thresholds), Action::Wait);
        assert_eq!(near(75.0).action(&thresholds), Action::Execute);
        assert_eq!(near(59.995).score, 60.0);
        assert_eq!(near(59.995).action(&thresholds), Action::Skip);
        assert_eq!(near(60.0).action(&thresholds), Action::Wait);
    }
}
