//! Multi-timeframe trend alignment source

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::fields::{as_number, lookup, optional, FieldSpec};
use crate::common::errors::ValidationError;
use crate::common::types::Bias;
use crate::context::AlignmentSection;

pub const TIMEFRAMES: FieldSpec = FieldSpec {
    name: "timeframes",
    paths: &["timeframes", "alignment.timeframes", "trend.timeframes", "tf", "mtf"],
};

pub const BULLISH_PCT: FieldSpec = FieldSpec {
    name: "bullish_pct",
    paths: &[
        "bullish_pct",
        "bullish_percentage",
        "alignment.bullish_pct",
        "alignment.bullish",
        "summary.bullish_pct",
    ],
};

pub const BEARISH_PCT: FieldSpec = FieldSpec {
    name: "bearish_pct",
    paths: &[
        "bearish_pct",
        "bearish_percentage",
        "alignment.bearish_pct",
        "alignment.bearish",
        "summary.bearish_pct",
    ],
};

/// Prefixes of flat per-timeframe keys such as `tf_1h` or `trend_15m`
const FLAT_PREFIXES: &[&str] = &["tf_", "trend_", "timeframe_"];

fn parse_pct(value: &Value) -> Option<f64> {
    as_number(value).filter(|pct| (0.0..=100.0).contains(pct))
}

/// A timeframe entry is either a bias string or an object carrying one
fn entry_bias(value: &Value) -> Option<Bias> {
    match value {
        Value::String(s) => Bias::parse(s),
        Value::Object(inner) => ["bias", "direction", "trend", "state"]
            .iter()
            .filter_map(|key| inner.get(*key))
            .find_map(|v| v.as_str().and_then(Bias::parse)),
        _ => None,
    }
}

fn collect_map(
    object: &Map<String, Value>,
    timeframes: &mut BTreeMap<String, Bias>,
    errors: &mut ValidationError,
) {
    for (label, value) in object {
        match entry_bias(value) {
            Some(bias) => {
                timeframes.insert(label.clone(), bias);
            }
            None => errors.invalid(
                "timeframes",
                format!("unrecognized bias for timeframe {}", label),
            ),
        }
    }
}

fn collect_timeframes(payload: &Value, errors: &mut ValidationError) -> BTreeMap<String, Bias> {
    let mut timeframes = BTreeMap::new();

    if let Some(object) = TIMEFRAMES
        .paths
        .iter()
        .find_map(|path| lookup(payload, path).and_then(Value::as_object))
    {
        collect_map(object, &mut timeframes, errors);
        return timeframes;
    }

    if let Some(object) = payload.as_object() {
        for (key, value) in object {
            let label = FLAT_PREFIXES
                .iter()
                .find_map(|prefix| key.strip_prefix(prefix));
            if let (Some(label), Some(bias)) = (label, entry_bias(value)) {
                timeframes.insert(label.to_string(), bias);
            }
        }
    }
    timeframes
}

fn share(timeframes: &BTreeMap<String, Bias>, bias: Bias) -> f64 {
    let count = timeframes.values().filter(|b| **b == bias).count();
    count as f64 / timeframes.len() as f64 * 100.0
}

pub fn extract_alignment(payload: &Value, errors: &mut ValidationError) -> Option<AlignmentSection> {
    let timeframes = collect_timeframes(payload, errors);
    let bullish = optional(payload, &BULLISH_PCT, parse_pct, errors);
    let bearish = optional(payload, &BEARISH_PCT, parse_pct, errors);

    let (bullish_pct, bearish_pct) = match (bullish, bearish) {
        (Some(bull), Some(bear)) => (bull, bear),
        (Some(bull), None) if timeframes.is_empty() => (bull, 100.0 - bull),
        (None, Some(bear)) if timeframes.is_empty() => (100.0 - bear, bear),
        _ if !timeframes.is_empty() => (
            bullish.unwrap_or_else(|| share(&timeframes, Bias::Bullish)),
            bearish.unwrap_or_else(|| share(&timeframes, Bias::Bearish)),
        ),
        _ => {
            errors.missing("timeframes", TIMEFRAMES.paths);
            return None;
        }
    };

    Some(AlignmentSection {
        timeframes,
        bullish_pct,
        bearish_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percentages_computed_from_timeframes() {
        let mut errors = ValidationError::default();
        let alignment = extract_alignment(
            &json!({"timeframes": {"5m": "BULLISH", "15m": {"bias": "bullish"}, "1h": "bearish", "4h": "neutral"}}),
            &mut errors,
        )
        .unwrap();

        assert!(errors.is_empty());
        assert_eq!(alignment.timeframes.len(), 4);
        assert_eq!(alignment.bullish_pct, 50.0);
        assert_eq!(alignment.bearish_pct, 25.0);
    }

    #[test]
    fn test_flat_timeframe_keys() {
        let mut errors = ValidationError::default();
        let alignment = extract_alignment(
            &json!({"ticker": "SPY", "tf_1h": "UP", "tf_4h": "UP", "tf_1d": "DOWN"}),
            &mut errors,
        )
        .unwrap();
        assert_eq!(alignment.timeframes.get("1d"), Some(&Bias::Bearish));
        assert!((alignment.bullish_pct - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_reported_percentages_take_priority() {
        let mut errors = ValidationError::default();
        let alignment = extract_alignment(
            &json!({"timeframes": {"1h": "BULLISH"}, "bullish_pct": 80, "bearish_pct": "20%"}),
            &mut errors,
        )
        .unwrap();
        assert_eq!(alignment.bullish_pct, 80.0);
        assert_eq!(alignment.bearish_pct, 20.0);
    }

    #[test]
    fn test_single_percentage_without_timeframes() {
        let mut errors = ValidationError::default();
        let alignment = extract_alignment(&json!({"alignment": {"bullish": 0}}), &mut errors).unwrap();
        assert_eq!(alignment.bullish_pct, 0.0);
        assert_eq!(alignment.bearish_pct, 100.0);
    }

    #[test]
    fn test_missing_alignment_data() {
        let mut errors = ValidationError::default();
        assert!(extract_alignment(&json!({"ticker": "SPY"}), &mut errors).is_none());
        assert_eq!(errors.missing, vec!["timeframes"]);
    }
}
