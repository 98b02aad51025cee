//! Position-size multiplier
//!
//! Eight independent factors, each clamped to the per-factor bounds, are
//! multiplied and the product clamped to the overall bounds. The factor
//! values are a tunable default policy.

use chrono::{Datelike, Timelike, Weekday};

use crate::common::types::{Bias, Direction, QualityTier, Timestamp};
use crate::config::SizingConfig;
use crate::context::{DecisionContext, ExpertSection};
use crate::market::MarketSnapshot;

use super::types::{SizeBreakdown, SizeFactor};

fn factor(name: &str, value: f64, reason: impl Into<String>) -> SizeFactor {
    SizeFactor {
        name: name.to_string(),
        value,
        reason: reason.into(),
    }
}

fn confluence(context: &DecisionContext, direction: Direction) -> SizeFactor {
    let mut agree = 0u32;
    let mut conflict = 0u32;

    if let Some(regime) = &context.regime {
        if regime.bias.agrees_with(direction) {
            agree += 1;
        } else if regime.bias.opposes(direction) {
            conflict += 1;
        }
    }
    if let Some(alignment) = &context.alignment {
        let majority = if alignment.bullish_pct > alignment.bearish_pct {
            Bias::Bullish
        } else if alignment.bearish_pct > alignment.bullish_pct {
            Bias::Bearish
        } else {
            Bias::Neutral
        };
        if majority.agrees_with(direction) {
            agree += 1;
        } else if majority.opposes(direction) {
            conflict += 1;
        }
    }

    factor(
        "confluence",
        1.0 + 0.15 * agree as f64 - 0.15 * conflict as f64,
        format!("{} agreeing, {} conflicting sources", agree, conflict),
    )
}

fn quality(expert: &ExpertSection) -> SizeFactor {
    let value = match expert.quality {
        QualityTier::Extreme => 1.3,
        QualityTier::High => 1.15,
        QualityTier::Medium => 1.0,
        QualityTier::Low => 0.85,
    };
    factor("quality", value, format!("{} quality", expert.quality))
}

fn higher_timeframe(context: &DecisionContext, direction: Direction) -> SizeFactor {
    match context.regime.as_ref().and_then(|r| r.htf_bias) {
        Some(htf) if htf.agrees_with(direction) => factor("htf_alignment", 1.2, "Higher timeframe agrees"),
        Some(htf) if htf.opposes(direction) => factor("htf_alignment", 0.85, "Higher timeframe opposes"),
        _ => factor("htf_alignment", 1.0, "No higher-timeframe bias"),
    }
}

fn risk_reward(expert: &ExpertSection) -> SizeFactor {
    match expert.risk_reward() {
        Some(rr) => {
            let value = if rr >= 3.0 {
                1.25
            } else if rr >= 2.0 {
                1.1
            } else if rr >= 1.5 {
                1.0
            } else {
                0.85
            };
            factor("risk_reward", value, format!("R:R {:.2}", rr))
        }
        None => factor("risk_reward", 1.0, "No risk/reward reported"),
    }
}

fn volume(snapshot: &MarketSnapshot) -> SizeFactor {
    match snapshot.stats.volume_ratio {
        Some(ratio) => {
            let value = if ratio >= 1.5 {
                1.15
            } else if ratio >= 1.0 {
                1.05
            } else if ratio < 0.7 {
                0.9
            } else {
                1.0
            };
            factor("volume", value, format!("Volume ratio {:.2}", ratio))
        }
        None => factor("volume", 1.0, "Volume ratio unavailable"),
    }
}

fn trend(snapshot: &MarketSnapshot, direction: Direction) -> SizeFactor {
    match snapshot.stats.trend_slope {
        Some(slope) if slope == 0.0 => factor("trend", 1.0, "Flat trend"),
        Some(slope) => {
            let aligned = (slope > 0.0) == (direction == Direction::Long);
            if aligned {
                factor("trend", 1.1, format!("Trend slope {:.3} with {}", slope, direction))
            } else {
                factor("trend", 0.9, format!("Trend slope {:.3} against {}", slope, direction))
            }
        }
        None => factor("trend", 1.0, "Trend slope unavailable"),
    }
}

/// US regular session in UTC (13:30-20:00)
fn session(at: Timestamp) -> SizeFactor {
    let time = at.time();
    let minute = time.hour() * 60 + time.minute();

    let (value, label) = match minute {
        810..=869 => (1.1, "opening hour"),
        870..=1139 => (1.0, "midday"),
        1140..=1199 => (1.05, "power hour"),
        _ => (0.85, "outside regular hours"),
    };
    factor(
        "session",
        value,
        format!("{} ({:02}:{:02} UTC)", label, time.hour(), time.minute()),
    )
}

fn day_of_week(at: Timestamp) -> SizeFactor {
    let weekday = at.weekday();
    let value = match weekday {
        Weekday::Mon => 0.95,
        Weekday::Tue | Weekday::Wed | Weekday::Thu => 1.05,
        Weekday::Fri => 0.9,
        Weekday::Sat | Weekday::Sun => 0.8,
    };
    factor("day_of_week", value, format!("{}", weekday))
}

pub fn size_multiplier(
    context: &DecisionContext,
    expert: &ExpertSection,
    snapshot: &MarketSnapshot,
    at: Timestamp,
    cfg: &SizingConfig,
) -> SizeBreakdown {
    let direction = expert.direction;
    let mut factors = vec![
        confluence(context, direction),
        quality(expert),
        higher_timeframe(context, direction),
        risk_reward(expert),
        volume(snapshot),
        trend(snapshot, direction),
        session(at),
        day_of_week(at),
    ];
    for f in &mut factors {
        f.value = f.value.clamp(cfg.factor_min, cfg.factor_max);
    }

    let product: f64 = factors.iter().map(|f| f.value).product();
    let multiplier = product.clamp(cfg.multiplier_min, cfg.multiplier_max);

    SizeBreakdown {
        factors,
        product: (product * 10_000.0).round() / 10_000.0,
        multiplier: (multiplier * 10_000.0).round() / 10_000.0,
    }
}
