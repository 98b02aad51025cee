//! Unified types used across the normalizer, context store and decision engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock timestamp used everywhere in the core
pub type Timestamp = DateTime<Utc>;

/// Logical origin of a webhook
///
/// Each source supplies a disjoint subset of context sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Primary signal source (expert direction, AI score, structure)
    Signal,
    /// Regime / phase source
    Regime,
    /// Multi-timeframe trend alignment source
    Alignment,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Signal, Source::Regime, Source::Alignment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Signal => "signal",
            Source::Regime => "regime",
            Source::Alignment => "alignment",
        }
    }

    /// Parse a source tag, accepting the names indicator vendors commonly use
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "signal" | "expert" | "signals" | "ultimate" | "primary" => Some(Source::Signal),
            "regime" | "phase" | "phases" | "saty" | "ripster" => Some(Source::Regime),
            "alignment" | "trend" | "mtf" | "timeframes" | "trend_alignment" => {
                Some(Source::Alignment)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade direction committed by the primary signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LONG" | "BUY" | "BULL" | "BULLISH" | "UP" => Some(Direction::Long),
            "SHORT" | "SELL" | "BEAR" | "BEARISH" | "DOWN" => Some(Direction::Short),
            _ => None,
        }
    }

    /// The bias that agrees with this direction
    pub fn bias(&self) -> Bias {
        match self {
            Direction::Long => Bias::Bullish,
            Direction::Short => Bias::Bearish,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Directional bias reported by regime and alignment sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BULLISH" | "BULL" | "LONG" | "BUY" | "UP" | "UPTREND" => Some(Bias::Bullish),
            "BEARISH" | "BEAR" | "SHORT" | "SELL" | "DOWN" | "DOWNTREND" => Some(Bias::Bearish),
            "NEUTRAL" | "FLAT" | "RANGE" | "SIDEWAYS" | "NONE" => Some(Bias::Neutral),
            _ => None,
        }
    }

    pub fn agrees_with(&self, direction: Direction) -> bool {
        *self == direction.bias()
    }

    pub fn opposes(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Bias::Bullish, Direction::Short) | (Bias::Bearish, Direction::Long)
        )
    }
}

/// Quality tier assigned by the primary signal source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityTier {
    Low,
    Medium,
    High,
    Extreme,
}

impl QualityTier {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "EXTREME" | "ELITE" | "A+" => Some(QualityTier::Extreme),
            "HIGH" | "STRONG" | "A" => Some(QualityTier::High),
            "MEDIUM" | "MODERATE" | "MED" | "B" => Some(QualityTier::Medium),
            "LOW" | "WEAK" | "C" => Some(QualityTier::Low),
            _ => None,
        }
    }

    /// Tier implied by an AI score on the 0-10 scale
    pub fn from_ai_score(score: f64) -> Self {
        if score >= 9.0 {
            QualityTier::Extreme
        } else if score >= 7.5 {
            QualityTier::High
        } else if score >= 6.0 {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityTier::Low => write!(f, "LOW"),
            QualityTier::Medium => write!(f, "MEDIUM"),
            QualityTier::High => write!(f, "HIGH"),
            QualityTier::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// Final action emitted by the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Execute,
    Wait,
    Skip,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Execute => "EXECUTE",
            Action::Wait => "WAIT",
            Action::Skip => "SKIP",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "EXECUTE" => Some(Action::Execute),
            "WAIT" => Some(Action::Wait),
            "SKIP" => Some(Action::Skip),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tags() {
        assert_eq!(Source::from_tag("Phase"), Some(Source::Regime));
        assert_eq!(Source::from_tag(" trend "), Some(Source::Alignment));
        assert_eq!(Source::from_tag("expert"), Some(Source::Signal));
        assert_eq!(Source::from_tag("weather"), None);
    }

    #[test]
    fn test_direction_and_bias() {
        assert_eq!(Direction::parse("buy"), Some(Direction::Long));
        assert_eq!(Direction::parse("SHORT"), Some(Direction::Short));
        assert_eq!(Direction::parse("sideways"), None);

        assert!(Bias::Bullish.agrees_with(Direction::Long));
        assert!(Bias::Bearish.opposes(Direction::Long));
        assert!(!Bias::Neutral.opposes(Direction::Short));
    }

    #[test]
    fn test_quality_from_score() {
        assert_eq!(QualityTier::from_ai_score(9.5), QualityTier::Extreme);
        assert_eq!(QualityTier::from_ai_score(7.5), QualityTier::High);
        assert_eq!(QualityTier::from_ai_score(5.5), QualityTier::Low);
        assert!(QualityTier::Extreme > QualityTier::Medium);
    }

    #[test]
    fn test_serde_casing() {
        assert_eq!(serde_json::to_string(&Source::Alignment).unwrap(), "\"alignment\"");
        assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"LONG\"");
        assert_eq!(serde_json::to_string(&Action::Wait).unwrap(), "\"WAIT\"");
    }
}
