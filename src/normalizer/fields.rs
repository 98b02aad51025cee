//! Alias lookup primitives
//!
//! Each logical field is described by a [`FieldSpec`]: an ordered list of
//! dotted paths. Lookup walks the list in order and the first path holding a
//! usable value wins. Explicit `null` is treated as absent; a literal `0` is a
//! value.

use serde_json::Value;

use crate::common::errors::ValidationError;

/// Ordered alias list for one logical field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub paths: &'static [&'static str],
}

/// Converts a raw JSON value into a field value, or `None` if unusable
pub type Extractor<T> = fn(&Value) -> Option<T>;

/// Resolve a dotted path (`risk.rr_ratio_t1`); `null` resolves to `None`
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Outcome of resolving one field against its aliases
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// First alias with a usable value, and that alias
    Found(T, &'static str),
    /// Some aliases were present but none converted
    Unusable(Vec<&'static str>),
    /// No alias present
    Absent,
}

impl<T> Lookup<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Lookup::Found(value, _) => Some(value),
            _ => None,
        }
    }
}

/// Walk `spec.paths` in order and return the first convertible value
pub fn resolve<T>(payload: &Value, spec: &FieldSpec, extract: Extractor<T>) -> Lookup<T> {
    let mut unusable = Vec::new();
    for path in spec.paths {
        if let Some(raw) = lookup(payload, path) {
            match extract(raw) {
                Some(value) => return Lookup::Found(value, path),
                None => unusable.push(*path),
            }
        }
    }
    if unusable.is_empty() {
        Lookup::Absent
    } else {
        Lookup::Unusable(unusable)
    }
}

/// Resolve a field that must be present; records diagnostics on failure
pub fn required<T>(
    payload: &Value,
    spec: &FieldSpec,
    extract: Extractor<T>,
    errors: &mut ValidationError,
) -> Option<T> {
    match resolve(payload, spec, extract) {
        Lookup::Found(value, _) => Some(value),
        Lookup::Unusable(paths) => {
            errors.invalid(spec.name, format!("unusable value at {}", paths.join(", ")));
            None
        }
        Lookup::Absent => {
            errors.missing(spec.name, spec.paths);
            None
        }
    }
}

/// Resolve an optional field; unusable values are reported, absence is not
pub fn optional<T>(
    payload: &Value,
    spec: &FieldSpec,
    extract: Extractor<T>,
    errors: &mut ValidationError,
) -> Option<T> {
    match resolve(payload, spec, extract) {
        Lookup::Found(value, _) => Some(value),
        Lookup::Unusable(paths) => {
            errors.invalid(spec.name, format!("unusable value at {}", paths.join(", ")));
            None
        }
        Lookup::Absent => None,
    }
}

/// Number or numeric string; rejects NaN and infinities
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Non-empty string, or a number rendered as text
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-empty string only
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Boolean, 0/1, or yes/no style strings
pub fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "ok" | "valid" | "pass" => Some(true),
            "false" | "no" | "n" | "0" | "invalid" | "fail" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Array of numbers (numeric strings allowed); empty arrays are unusable
pub fn as_number_list(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array()?;
    let numbers: Option<Vec<f64>> = items.iter().map(as_number).collect();
    numbers.filter(|n| !n.is_empty())
}

/// Dotted paths of the payload's first two levels, for diagnostics
pub fn seen_paths(payload: &Value) -> Vec<String> {
    let mut seen = Vec::new();
    if let Some(object) = payload.as_object() {
        for (key, value) in object {
            match value.as_object() {
                Some(inner) if !inner.is_empty() => {
                    for inner_key in inner.keys() {
                        seen.push(format!("{}.{}", key, inner_key));
                    }
                }
                _ => seen.push(key.clone()),
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCORE: FieldSpec = FieldSpec {
        name: "score",
        paths: &["score", "signal.score", "meta.score"],
    };

    #[test]
    fn test_lookup_dotted_paths() {
        let payload = json!({"risk": {"rr": 2.5, "none": null}});
        assert_eq!(lookup(&payload, "risk.rr"), Some(&json!(2.5)));
        assert_eq!(lookup(&payload, "risk.none"), None);
        assert_eq!(lookup(&payload, "risk.rr.deeper"), None);
        assert_eq!(lookup(&payload, "missing"), None);
    }

    #[test]
    fn test_first_usable_alias_wins() {
        let payload = json!({"signal": {"score": 7}, "meta": {"score": 9}});
        assert_eq!(
            resolve(&payload, &SCORE, as_number),
            Lookup::Found(7.0, "signal.score")
        );
    }

    #[test]
    fn test_unusable_alias_falls_through() {
        let payload = json!({"score": {"nested": true}, "meta": {"score": "8.5"}});
        assert_eq!(
            resolve(&payload, &SCORE, as_number),
            Lookup::Found(8.5, "meta.score")
        );

        let bad = json!({"score": "high"});
        assert_eq!(resolve(&bad, &SCORE, as_number), Lookup::Unusable(vec!["score"]));
    }

    #[test]
    fn test_zero_is_a_value() {
        let payload = json!({"score": 0});
        assert_eq!(resolve(&payload, &SCORE, as_number), Lookup::Found(0.0, "score"));
        assert_eq!(as_flag(&json!(0)), Some(false));
    }

    #[test]
    fn test_required_records_attempted_aliases() {
        let mut errors = ValidationError::default();
        let value = required(&json!({"other": 1}), &SCORE, as_number, &mut errors);
        assert!(value.is_none());
        assert_eq!(errors.missing, vec!["score"]);
        assert_eq!(
            errors.attempted,
            vec!["score: [score, signal.score, meta.score]"]
        );
    }

    #[test]
    fn test_converters() {
        assert_eq!(as_number(&json!("85%")), Some(85.0));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_text(&json!(2)), Some("2".to_string()));
        assert_eq!(as_string(&json!(2)), None);
        assert_eq!(as_flag(&json!("Yes")), Some(true));
        assert_eq!(as_number_list(&json!([455, "460.5"])), Some(vec![455.0, 460.5]));
        assert_eq!(as_number_list(&json!([])), None);
    }

    #[test]
    fn test_seen_paths() {
        let mut seen = seen_paths(&json!({"ticker": "SPY", "signal": {"type": "LONG"}}));
        seen.sort();
        assert_eq!(seen, vec!["signal.type", "ticker"]);
    }
}
