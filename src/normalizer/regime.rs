//! Regime / phase source

use serde_json::Value;

use super::fields::{as_number, as_string, optional, required, resolve, FieldSpec, Lookup};
use crate::common::errors::ValidationError;
use crate::common::types::Bias;
use crate::context::{Phase, RegimeSection};

pub const PHASE_NAME: FieldSpec = FieldSpec {
    name: "phase_name",
    paths: &[
        "phase_name",
        "phase.name",
        "regime.phase_name",
        "regime.name",
        "regime.phase",
        "phase",
    ],
};

pub const PHASE_ID: FieldSpec = FieldSpec {
    name: "phase_id",
    paths: &["phase_id", "phase.id", "phase.current", "regime.phase_id", "phase"],
};

pub const BIAS: FieldSpec = FieldSpec {
    name: "bias",
    paths: &[
        "bias",
        "direction",
        "trend",
        "regime.bias",
        "regime.direction",
        "phase.bias",
    ],
};

pub const CONFIDENCE: FieldSpec = FieldSpec {
    name: "confidence",
    paths: &[
        "confidence",
        "regime.confidence",
        "phase.confidence",
        "strength",
        "regime.strength",
    ],
};

pub const VOLATILITY: FieldSpec = FieldSpec {
    name: "volatility",
    paths: &["volatility", "regime.volatility", "volatility_regime", "vol_regime"],
};

pub const HTF_BIAS: FieldSpec = FieldSpec {
    name: "htf_bias",
    paths: &["htf_bias", "regime.htf_bias", "higher_timeframe.bias", "htf.bias"],
};

fn parse_bias(value: &Value) -> Option<Bias> {
    value.as_str().and_then(Bias::parse)
}

fn parse_phase_id(value: &Value) -> Option<u8> {
    let id = as_number(value)?;
    (id.fract() == 0.0 && (1.0..=4.0).contains(&id)).then_some(id as u8)
}

/// Confidence 0-100; 0-1 fractions are rescaled
fn parse_confidence(value: &Value) -> Option<f64> {
    let raw = as_number(value)?;
    if (0.0..=1.0).contains(&raw) {
        Some(raw * 100.0)
    } else if raw > 1.0 && raw <= 100.0 {
        Some(raw)
    } else {
        None
    }
}

pub fn extract_regime(payload: &Value, errors: &mut ValidationError) -> Option<RegimeSection> {
    let phase_id = optional(payload, &PHASE_ID, parse_phase_id, &mut ValidationError::default());
    let phase_name = resolve(payload, &PHASE_NAME, as_string).value();

    let phase_name = match (phase_name, phase_id) {
        (Some(name), _) => Some(name),
        (None, Some(id)) => Phase::from_id(id).map(|p| p.name().to_string()),
        (None, None) => {
            errors.missing("phase", &["phase_name", "phase.name", "phase_id", "phase.current", "phase"]);
            None
        }
    };

    let bias = match resolve(payload, &BIAS, parse_bias) {
        Lookup::Found(bias, _) => Some(bias),
        // Semantic inference: MARKUP implies bullish, MARKDOWN bearish, ...
        other => {
            let inferred = phase_name
                .as_deref()
                .and_then(Phase::from_name)
                .or_else(|| phase_id.and_then(Phase::from_id))
                .map(|p| p.implied_bias());
            if inferred.is_none() {
                match other {
                    Lookup::Unusable(paths) => errors.invalid(
                        "bias",
                        format!("expected BULLISH/BEARISH/NEUTRAL at {}", paths.join(", ")),
                    ),
                    _ => errors.missing("bias", BIAS.paths),
                }
            }
            inferred
        }
    };

    let confidence = required(payload, &CONFIDENCE, parse_confidence, errors);
    let volatility = optional(payload, &VOLATILITY, as_string, errors);
    let htf_bias = optional(payload, &HTF_BIAS, parse_bias, errors);

    Some(RegimeSection {
        phase_id,
        phase_name: phase_name?,
        bias: bias?,
        confidence: confidence?,
        volatility,
        htf_bias,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_phase_payload() {
        let mut errors = ValidationError::default();
        let regime = extract_regime(
            &json!({
                "phase": {"current": 2, "name": "Markup"},
                "regime": {"bias": "bullish", "confidence": 0.95, "htf_bias": "BULLISH"},
                "volatility": "NORMAL"
            }),
            &mut errors,
        )
        .unwrap();

        assert!(errors.is_empty(), "{}", errors);
        assert_eq!(regime.phase_id, Some(2));
        assert_eq!(regime.phase_name, "Markup");
        assert_eq!(regime.bias, Bias::Bullish);
        assert_eq!(regime.confidence, 95.0);
        assert_eq!(regime.htf_bias, Some(Bias::Bullish));
        assert_eq!(regime.volatility.as_deref(), Some("NORMAL"));
    }

    #[test]
    fn test_bias_inferred_from_phase_name() {
        let mut errors = ValidationError::default();
        let regime = extract_regime(
            &json!({"phase": "DISTRIBUTION", "confidence": 72}),
            &mut errors,
        )
        .unwrap();
        assert_eq!(regime.bias, Bias::Bearish);
        assert_eq!(regime.phase_id, None);
    }

    #[test]
    fn test_phase_name_from_numeric_id() {
        let mut errors = ValidationError::default();
        let regime = extract_regime(&json!({"phase": 4, "confidence": "80"}), &mut errors).unwrap();
        assert_eq!(regime.phase_name, "MARKDOWN");
        assert_eq!(regime.bias, Bias::Bearish);
    }

    #[test]
    fn test_missing_phase_and_confidence_reported_together() {
        let mut errors = ValidationError::default();
        assert!(extract_regime(&json!({"bias": "BULLISH"}), &mut errors).is_none());
        assert_eq!(errors.missing, vec!["phase", "confidence"]);
    }

    #[test]
    fn test_zero_confidence_is_kept() {
        let mut errors = ValidationError::default();
        let regime = extract_regime(
            &json!({"phase_name": "MARKUP", "confidence": 0}),
            &mut errors,
        )
        .unwrap();
        assert_eq!(regime.confidence, 0.0);
    }
}
