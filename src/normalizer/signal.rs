//! Primary signal source: expert and structure sections

use serde_json::Value;

use super::fields::{
    as_flag, as_number, as_number_list, as_string, optional, required, resolve, FieldSpec, Lookup,
};
use crate::common::errors::ValidationError;
use crate::common::types::{Direction, QualityTier};
use crate::context::{ExecutionGrade, ExpertSection, StructureSection};

pub const DIRECTION: FieldSpec = FieldSpec {
    name: "direction",
    paths: &[
        "direction",
        "signal.direction",
        "signal.type",
        "signal.side",
        "side",
        "action",
        "bias",
        "trend",
    ],
};

/// Free-text fields searched when no direction field matches
pub const DIRECTION_HINTS: FieldSpec = FieldSpec {
    name: "direction_hint",
    paths: &["message", "alert", "alert_message", "signal.message", "comment"],
};

pub const AI_SCORE: FieldSpec = FieldSpec {
    name: "ai_score",
    paths: &[
        "ai_score",
        "aiScore",
        "signal.ai_score",
        "signal.aiScore",
        "quality.ai_score",
        "signal.score",
        "score",
    ],
};

pub const QUALITY: FieldSpec = FieldSpec {
    name: "quality",
    paths: &[
        "quality",
        "quality_tier",
        "signal.quality",
        "signal.quality_tier",
        "quality.tier",
    ],
};

pub const RR_T1: FieldSpec = FieldSpec {
    name: "rr_t1",
    paths: &[
        "risk.rr_ratio_t1",
        "rr_ratio_t1",
        "rr1",
        "risk.rr1",
        "risk_reward",
        "risk.rr",
        "rr",
    ],
};

pub const RR_T2: FieldSpec = FieldSpec {
    name: "rr_t2",
    paths: &["risk.rr_ratio_t2", "rr_ratio_t2", "rr2", "risk.rr2"],
};

pub const STOP_LOSS: FieldSpec = FieldSpec {
    name: "stop_loss",
    paths: &["stop_loss", "stop", "sl", "risk.stop_loss", "risk.stop", "levels.stop_loss", "levels.stop"],
};

pub const TARGETS: FieldSpec = FieldSpec {
    name: "targets",
    paths: &["targets", "levels.targets", "risk.targets"],
};

pub const TARGET_1: FieldSpec = FieldSpec {
    name: "target_1",
    paths: &["target_1", "tp1", "levels.target_1", "levels.tp1", "risk.target_1"],
};

pub const TARGET_2: FieldSpec = FieldSpec {
    name: "target_2",
    paths: &["target_2", "tp2", "levels.target_2", "levels.tp2", "risk.target_2"],
};

pub const SETUP_VALID: FieldSpec = FieldSpec {
    name: "setup_valid",
    paths: &["structure.valid_setup", "structure.setup_valid", "valid_setup", "setup_valid"],
};

pub const LIQUIDITY_OK: FieldSpec = FieldSpec {
    name: "liquidity_ok",
    paths: &["structure.liquidity_ok", "liquidity_ok", "structure.liquidity"],
};

pub const EXECUTION_QUALITY: FieldSpec = FieldSpec {
    name: "execution_quality",
    paths: &["structure.execution_quality", "execution_quality", "structure.grade"],
};

fn parse_direction(value: &Value) -> Option<Direction> {
    value.as_str().and_then(Direction::parse)
}

fn parse_quality(value: &Value) -> Option<QualityTier> {
    value.as_str().and_then(QualityTier::parse)
}

fn parse_grade(value: &Value) -> Option<ExecutionGrade> {
    value.as_str().and_then(ExecutionGrade::parse)
}

/// AI score on the 0-10 scale; 0-100 inputs are rescaled
fn parse_ai_score(value: &Value) -> Option<f64> {
    let score = as_number(value)?;
    if (0.0..=10.0).contains(&score) {
        Some(score)
    } else if score > 10.0 && score <= 100.0 {
        Some(score / 10.0)
    } else {
        None
    }
}

fn parse_ratio(value: &Value) -> Option<f64> {
    as_number(value).filter(|r| *r >= 0.0)
}

/// Direction from an alert message such as "SPY LONG entry"
fn infer_direction(payload: &Value) -> Option<Direction> {
    let text = resolve(payload, &DIRECTION_HINTS, as_string).value()?;
    let upper = text.to_ascii_uppercase();
    let words: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let long = words.iter().any(|w| matches!(*w, "LONG" | "BUY" | "BULLISH"));
    let short = words.iter().any(|w| matches!(*w, "SHORT" | "SELL" | "BEARISH"));
    match (long, short) {
        (true, false) => Some(Direction::Long),
        (false, true) => Some(Direction::Short),
        _ => None,
    }
}

pub fn extract_expert(payload: &Value, errors: &mut ValidationError) -> Option<ExpertSection> {
    let direction = match resolve(payload, &DIRECTION, parse_direction) {
        Lookup::Found(direction, _) => Some(direction),
        Lookup::Unusable(paths) => infer_direction(payload).or_else(|| {
            errors.invalid(
                "direction",
                format!("expected LONG or SHORT at {}", paths.join(", ")),
            );
            None
        }),
        Lookup::Absent => infer_direction(payload).or_else(|| {
            errors.missing("direction", DIRECTION.paths);
            None
        }),
    };

    let ai_score = required(payload, &AI_SCORE, parse_ai_score, errors);
    let quality = optional(payload, &QUALITY, parse_quality, errors);

    let rr_t1 = optional(payload, &RR_T1, parse_ratio, errors);
    let rr_t2 = optional(payload, &RR_T2, parse_ratio, errors);
    let stop_loss = optional(payload, &STOP_LOSS, as_number, errors);

    let targets = match optional(payload, &TARGETS, as_number_list, errors) {
        Some(list) => list,
        None => [&TARGET_1, &TARGET_2]
            .iter()
            .filter_map(|spec| optional(payload, spec, as_number, errors))
            .collect(),
    };

    let direction = direction?;
    let ai_score = ai_score?;
    Some(ExpertSection {
        direction,
        ai_score,
        quality: quality.unwrap_or_else(|| QualityTier::from_ai_score(ai_score)),
        rr_t1,
        rr_t2,
        stop_loss,
        targets,
    })
}

/// Structure is optional as a whole; both flags are needed once any appears
pub fn extract_structure(payload: &Value, errors: &mut ValidationError) -> Option<StructureSection> {
    let setup_valid = optional(payload, &SETUP_VALID, as_flag, errors);
    let liquidity_ok = optional(payload, &LIQUIDITY_OK, as_flag, errors);
    let execution_quality = optional(payload, &EXECUTION_QUALITY, parse_grade, errors);

    match (setup_valid, liquidity_ok) {
        (None, None) if execution_quality.is_none() => None,
        (Some(setup_valid), Some(liquidity_ok)) => Some(StructureSection {
            setup_valid,
            liquidity_ok,
            execution_quality,
        }),
        (setup_valid, liquidity_ok) => {
            if setup_valid.is_none() {
                errors.missing(SETUP_VALID.name, SETUP_VALID.paths);
            }
            if liquidity_ok.is_none() {
                errors.missing(LIQUIDITY_OK.name, LIQUIDITY_OK.paths);
            }
            None
        }
    }
}
