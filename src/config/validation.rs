//! Startup-time consistency checks
//!
//! A configuration that can never produce a decision (for example, a required
//! source set that excludes the expert source) must fail here, loudly, instead
//! of silently suppressing decisions at runtime.

use url::Url;

use super::types::{AppConfig, CompletenessConfig};
use crate::common::errors::{EngineError, Result};
use crate::common::types::Source;

impl AppConfig {
    /// Validate every section; all problems are reported together
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        check_completeness(&self.completeness, &mut problems);

        let t = &self.thresholds;
        if !(0.0..=100.0).contains(&t.execute) || !(0.0..=100.0).contains(&t.wait) {
            problems.push(format!(
                "thresholds must lie within 0..=100 (execute={}, wait={})",
                t.execute, t.wait
            ));
        }
        if t.wait >= t.execute {
            problems.push(format!(
                "wait threshold {} must be below execute threshold {}",
                t.wait, t.execute
            ));
        }

        let w = &self.weights;
        let weights = [w.regime, w.expert, w.alignment, w.market, w.risk_reward];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) {
            problems.push("confidence weights must be finite and non-negative".to_string());
        } else if w.total() <= 0.0 {
            problems.push("confidence weights must not all be zero".to_string());
        }
        if w.expert <= 0.0 {
            problems.push("expert weight must be positive; it is the only mandatory input".to_string());
        }

        let g = &self.gates;
        if !(0.0..=100.0).contains(&g.neutral_score) {
            problems.push(format!("gates.neutral_score {} outside 0..=100", g.neutral_score));
        }
        if !(0.0..=100.0).contains(&g.min_regime_confidence) {
            problems.push(format!(
                "gates.min_regime_confidence {} outside 0..=100",
                g.min_regime_confidence
            ));
        }
        if g.max_spread_bps <= 0.0 {
            problems.push("gates.max_spread_bps must be positive".to_string());
        }
        if g.max_volatility_ratio <= 1.0 {
            problems.push("gates.max_volatility_ratio must be greater than 1.0".to_string());
        }
        if g.min_depth_size < 0.0 || g.full_depth_size <= g.min_depth_size {
            problems.push(format!(
                "gates.full_depth_size {} must exceed min_depth_size {} (>= 0)",
                g.full_depth_size, g.min_depth_size
            ));
        }
        if g.target_rr <= 0.0 {
            problems.push("gates.target_rr must be positive".to_string());
        }
        if g.degraded_penalty < 0.0 {
            problems.push("gates.degraded_penalty must not be negative".to_string());
        }

        let s = &self.sizing;
        if !(s.factor_min > 0.0 && s.factor_min <= 1.0 && s.factor_max >= 1.0) {
            problems.push(format!(
                "sizing factor bounds [{}, {}] must be positive and contain 1.0",
                s.factor_min, s.factor_max
            ));
        }
        if !(s.multiplier_min > 0.0 && s.multiplier_min <= 1.0 && s.multiplier_max >= 1.0) {
            problems.push(format!(
                "sizing multiplier bounds [{}, {}] must be positive and contain 1.0",
                s.multiplier_min, s.multiplier_max
            ));
        }

        if self.market.sub_fetch_timeout_ms == 0 {
            problems.push("market.sub_fetch_timeout_ms must be positive".to_string());
        }
        if self.market.sub_fetch_timeout_ms >= self.settings.response_budget_ms {
            problems.push(format!(
                "market.sub_fetch_timeout_ms {} must be below settings.response_budget_ms {}",
                self.market.sub_fetch_timeout_ms, self.settings.response_budget_ms
            ));
        }
        if let Some(base_url) = &self.market.base_url {
            if let Err(e) = Url::parse(base_url) {
                problems.push(format!("market.base_url {:?} is not a valid URL: {}", base_url, e));
            }
        }

        if self.ledger.max_attempts == 0 {
            problems.push("ledger.max_attempts must be at least 1".to_string());
        }
        if !(self.ledger.fallback_price.is_finite() && self.ledger.fallback_price > 0.0) {
            problems.push(format!(
                "ledger.fallback_price {} must be strictly positive",
                self.ledger.fallback_price
            ));
        }

        if self.settings.context_update_attempts == 0 {
            problems.push("settings.context_update_attempts must be at least 1".to_string());
        }

        if let Some(db) = &self.database {
            if db.max_connections == 0 {
                problems.push("database.max_connections must be at least 1".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Configuration(problems.join("; ")))
        }
    }
}

fn check_completeness(config: &CompletenessConfig, problems: &mut Vec<String>) {
    if config.required_sources.is_empty() {
        problems.push("completeness.required_sources must not be empty".to_string());
    }
    if !config.required_sources.contains(&Source::Signal) {
        problems.push(
            "completeness.required_sources must include `signal`; it is the only source of the expert section"
                .to_string(),
        );
    }
    for source in &config.required_sources {
        if config.optional_sources.contains(source) {
            problems.push(format!(
                "source `{}` is listed as both required and optional",
                source
            ));
        }
    }
    if config.max_age_secs == 0 {
        problems.push("completeness.max_age_secs must be positive".to_string());
    }
}

/// Verify two components were handed the same completeness rules
pub fn ensure_same_completeness(
    component_a: (&str, &CompletenessConfig),
    component_b: (&str, &CompletenessConfig),
) -> Result<()> {
    if component_a.1 == component_b.1 {
        Ok(())
    } else {
        Err(EngineError::Configuration(format!(
            "completeness rules disagree: {} uses {:?}, {} uses {:?}",
            component_a.0, component_a.1, component_b.0, component_b.1
        )))
    }
}
