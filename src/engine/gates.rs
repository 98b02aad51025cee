//! Regime, structural and market gates
//!
//! Gates are pure functions over an already staleness-masked context. Each
//! one yields pass/fail, a 0-100 score and a reason. Market sub-checks test
//! for presence explicitly: `Some(0.0)` is a reading, `None` is missing data.

use crate::common::types::{Direction, QualityTier};
use crate::config::GateConfig;
use crate::context::{DecisionContext, ExecutionGrade, ExpertSection};
use crate::market::{LiquidityMetrics, MarketSnapshot, StatsMetrics};

use super::types::{GateResult, MarketGateResult};

/// Risk/reward as a 0-100 quality score; `target_rr` earns 100
pub fn rr_quality(rr: f64, target_rr: f64) -> f64 {
    (rr / target_rr * 100.0).clamp(0.0, 100.0)
}

pub fn regime_gate(context: &DecisionContext, direction: Direction, cfg: &GateConfig) -> GateResult {
    const NAME: &str = "regime";

    let Some(regime) = &context.regime else {
        return GateResult::neutral(
            NAME,
            cfg.neutral_score,
            "No fresh regime data; signal-only mode",
        );
    };

    let forbidden = match regime.phase() {
        Some(phase) => !phase.permits(direction),
        None => regime.bias.opposes(direction),
    };
    if forbidden {
        return GateResult::fail(
            NAME,
            0.0,
            format!(
                "{} regime ({:?} bias) forbids {}",
                regime.phase_name, regime.bias, direction
            ),
        )
        .blocking(cfg.block_on_regime_conflict);
    }

    if regime.confidence < cfg.min_regime_confidence {
        return GateResult::fail(
            NAME,
            regime.confidence,
            format!(
                "Regime confidence {:.1} below minimum {:.1}",
                regime.confidence, cfg.min_regime_confidence
            ),
        );
    }

    match regime.htf_bias {
        Some(htf) if htf == regime.bias && htf.agrees_with(direction) => GateResult::pass(
            NAME,
            (regime.confidence + cfg.htf_agreement_boost).min(100.0),
            format!(
                "{} regime permits {} at {:.1} confidence, higher timeframe agrees",
                regime.phase_name, direction, regime.confidence
            ),
        ),
        _ => GateResult::pass(
            NAME,
            regime.confidence,
            format!(
                "{} regime permits {} at {:.1} confidence",
                regime.phase_name, direction, regime.confidence
            ),
        ),
    }
}

fn grade_adjustment(grade: Option<ExecutionGrade>) -> f64 {
    match grade {
        Some(ExecutionGrade::A) => 5.0,
        Some(ExecutionGrade::B) | None => 0.0,
        Some(ExecutionGrade::C) => -5.0,
        Some(ExecutionGrade::D) => -10.0,
    }
}

pub fn structural_gate(context: &DecisionContext, expert: &ExpertSection, cfg: &GateConfig) -> GateResult {
    const NAME: &str = "structural";

    let Some(structure) = &context.structure else {
        return GateResult::neutral(NAME, cfg.neutral_score, "No structure data");
    };

    if !structure.setup_valid {
        return GateResult::fail(NAME, 0.0, "Setup flagged invalid").blocking(cfg.block_on_invalid_setup);
    }

    let ai = expert.ai_score * 10.0;
    let mut score = match expert.risk_reward() {
        Some(rr) => ai * 0.6 + rr_quality(rr, cfg.target_rr) * 0.4,
        None => ai,
    };
    score += grade_adjustment(structure.execution_quality);

    let mut problems = Vec::new();
    if !structure.liquidity_ok {
        score -= 30.0;
        problems.push("liquidity not ok".to_string());
    }
    if expert.quality == QualityTier::Low {
        problems.push(format!("quality tier {}", expert.quality));
    }

    if problems.is_empty() {
        GateResult::pass(
            NAME,
            score,
            format!("Valid setup, {} quality", expert.quality),
        )
    } else {
        GateResult::fail(NAME, score, format!("Structure weak: {}", problems.join(", ")))
    }
}

pub fn spread_check(liquidity: &LiquidityMetrics, cfg: &GateConfig) -> GateResult {
    const NAME: &str = "spread";

    match liquidity.spread_bps {
        None => GateResult::neutral(NAME, cfg.neutral_score, "Spread unavailable"),
        Some(spread) if spread <= cfg.max_spread_bps => GateResult::pass(
            NAME,
            100.0 - spread.max(0.0) / cfg.max_spread_bps * 50.0,
            format!("Spread {:.1}bps within {:.1}bps", spread, cfg.max_spread_bps),
        ),
        Some(spread) => GateResult::fail(
            NAME,
            50.0 - (spread - cfg.max_spread_bps) / cfg.max_spread_bps * 50.0,
            format!("Spread {:.1}bps above {:.1}bps", spread, cfg.max_spread_bps),
        ),
    }
}

pub fn volatility_check(stats: &StatsMetrics, cfg: &GateConfig) -> GateResult {
    const NAME: &str = "volatility";

    let (Some(atr), Some(realized)) = (stats.atr14, stats.realized_vol) else {
        return GateResult::neutral(NAME, cfg.neutral_score, "ATR or realized volatility unavailable");
    };

    if atr <= 0.0 {
        return GateResult::pass(NAME, 100.0, format!("ATR {:.2}: no range expansion", atr));
    }
    if realized <= 0.0 {
        return GateResult::fail(
            NAME,
            0.0,
            format!("ATR {:.2} against zero realized volatility: spike", atr),
        );
    }

    let ratio = atr / realized;
    if ratio <= 1.0 {
        GateResult::pass(NAME, 100.0, format!("ATR/realized ratio {:.2} normal", ratio))
    } else if ratio <= cfg.max_volatility_ratio {
        GateResult::pass(
            NAME,
            100.0 - (ratio - 1.0) / (cfg.max_volatility_ratio - 1.0) * 50.0,
            format!("ATR/realized ratio {:.2} elevated", ratio),
        )
    } else {
        GateResult::fail(
            NAME,
            (50.0 - (ratio - cfg.max_volatility_ratio) * 20.0).max(0.0),
            format!(
                "ATR/realized ratio {:.2} above {:.2}: abnormal spike",
                ratio, cfg.max_volatility_ratio
            ),
        )
    }
}

pub fn depth_check(liquidity: &LiquidityMetrics, cfg: &GateConfig) -> GateResult {
    const NAME: &str = "depth";

    if let (Some(bid), Some(ask)) = (liquidity.bid_size, liquidity.ask_size) {
        let depth = bid.min(ask).max(0.0);
        let score = depth / cfg.full_depth_size * 100.0;
        return if depth >= cfg.min_depth_size {
            GateResult::pass(NAME, score, format!("Top-of-book depth {:.0}", depth))
        } else {
            GateResult::fail(
                NAME,
                score,
                format!("Top-of-book depth {:.0} below {:.0}", depth, cfg.min_depth_size),
            )
        };
    }

    match liquidity.depth_score {
        Some(score) => {
            let floor = cfg.min_depth_size / cfg.full_depth_size * 100.0;
            if score >= floor {
                GateResult::pass(NAME, score, format!("Depth score {:.1}", score))
            } else {
                GateResult::fail(NAME, score, format!("Depth score {:.1} below {:.1}", score, floor))
            }
        }
        None => GateResult::neutral(NAME, cfg.neutral_score, "Depth unavailable"),
    }
}

/// Spread, volatility and depth, with the mean of evaluated sub-checks as aggregate
pub fn market_gate(snapshot: &MarketSnapshot, cfg: &GateConfig) -> MarketGateResult {
    let spread = spread_check(&snapshot.liquidity, cfg);
    let volatility = volatility_check(&snapshot.stats, cfg);
    let depth = depth_check(&snapshot.liquidity, cfg);

    let evaluated: Vec<&GateResult> = [&spread, &volatility, &depth]
        .into_iter()
        .filter(|g| g.evaluated)
        .collect();

    let aggregate = if evaluated.is_empty() {
        GateResult::neutral("market", cfg.neutral_score, "No market data; market checks skipped")
    } else {
        let mean = evaluated.iter().map(|g| g.score).sum::<f64>() / evaluated.len() as f64;
        let failed: Vec<&str> = evaluated
            .iter()
            .filter(|g| !g.passed)
            .map(|g| g.name.as_str())
            .collect();
        if failed.is_empty() {
            GateResult::pass("market", mean, format!("Market checks passed ({:.1})", mean))
        } else {
            GateResult::fail("market", mean, format!("Market checks failed: {}", failed.join(", ")))
        }
    };

    MarketGateResult {
        aggregate,
        spread,
        volatility,
        depth,
    }
}
