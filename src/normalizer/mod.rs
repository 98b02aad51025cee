//! Source normalizer
//!
//! Turns loosely structured webhook payloads into a [`PartialContext`] that
//! carries only the sections the originating source owns. Every logical field
//! is read through an explicit, ordered alias list (see [`fields`]); a failed
//! extraction returns a [`ValidationError`] naming what was missing, what was
//! tried and what the payload actually contained.
//!
//! Normalization is a pure function of its input.

pub mod alignment;
pub mod fields;
pub mod instrument;
pub mod regime;
pub mod signal;

use serde::Serialize;
use serde_json::Value;

use crate::common::errors::ValidationError;
use crate::common::types::Source;
use crate::context::PartialContext;
use fields::{as_string, lookup, resolve, seen_paths, FieldSpec};

/// Explicit source tag carried by the payload itself
pub const SOURCE_TAG: FieldSpec = FieldSpec {
    name: "source",
    paths: &["source", "indicator", "meta.source", "meta.indicator", "type"],
};

const REGIME_MARKERS: &[&str] = &["phase", "phase_name", "phase_id", "regime"];
const ALIGNMENT_MARKERS: &[&str] = &["timeframes", "alignment", "mtf", "bullish_pct", "bullish_percentage"];

/// A normalized webhook, ready for the context store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedUpdate {
    pub symbol: String,
    pub source: Source,
    pub partial: PartialContext,
}

fn has_any(payload: &Value, paths: &[&str]) -> bool {
    paths.iter().any(|path| lookup(payload, path).is_some())
}

fn has_flat_timeframes(payload: &Value) -> bool {
    payload
        .as_object()
        .map(|object| object.keys().any(|key| key.starts_with("tf_")))
        .unwrap_or(false)
}

/// Identify the source of a payload: explicit tag first, then shape
pub fn detect_source(payload: &Value) -> Result<Source, ValidationError> {
    if let Some(tag) = resolve(payload, &SOURCE_TAG, as_string).value() {
        if let Some(source) = Source::from_tag(&tag) {
            return Ok(source);
        }
    }

    if has_any(payload, signal::AI_SCORE.paths) {
        return Ok(Source::Signal);
    }
    if has_any(payload, REGIME_MARKERS) {
        return Ok(Source::Regime);
    }
    if has_any(payload, ALIGNMENT_MARKERS) || has_flat_timeframes(payload) {
        return Ok(Source::Alignment);
    }
    if has_any(payload, signal::DIRECTION.paths) {
        return Ok(Source::Signal);
    }

    let mut errors = ValidationError::for_source(None);
    errors.missing("source", SOURCE_TAG.paths);
    errors.invalid(
        "source",
        "payload shape matches no known source (signal, regime, alignment)",
    );
    errors.seen = seen_paths(payload);
    Err(errors)
}

/// Normalize a payload from a known source
pub fn normalize(payload: &Value, source: Source) -> Result<NormalizedUpdate, ValidationError> {
    let mut errors = ValidationError::for_source(Some(source));

    if !payload.is_object() {
        errors.invalid("payload", "expected a JSON object");
        return Err(errors);
    }

    let instrument = instrument::extract_instrument(payload, &mut errors);
    let mut partial = PartialContext::default();
    match source {
        Source::Signal => {
            partial.expert = signal::extract_expert(payload, &mut errors);
            partial.structure = signal::extract_structure(payload, &mut errors);
        }
        Source::Regime => partial.regime = regime::extract_regime(payload, &mut errors),
        Source::Alignment => partial.alignment = alignment::extract_alignment(payload, &mut errors),
    }

    match instrument {
        Some(instrument) if errors.is_empty() => {
            let symbol = instrument.symbol.clone();
            partial.instrument = Some(instrument);
            Ok(NormalizedUpdate {
                symbol,
                source,
                partial,
            })
        }
        _ => {
            errors.seen = seen_paths(payload);
            Err(errors)
        }
    }
}

/// Normalize with a declared source, or detect one when none is given
pub fn normalize_detected(
    payload: &Value,
    declared: Option<Source>,
) -> Result<NormalizedUpdate, ValidationError> {
    let source = match declared {
        Some(source) => source,
        None => detect_source(payload)?,
    };
    normalize(payload, source)
}
