//! Decision context data model
//!
//! A [`DecisionContext`] is the aggregated, per-symbol state assembled from
//! every webhook source. A [`PartialContext`] is what one normalized webhook
//! contributes to it.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{Bias, Direction, QualityTier, Source, Timestamp};

/// Instrument identity and last known price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: normalize_symbol(&symbol.into()),
            exchange: None,
            price: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }
}

/// Canonical symbol key: trimmed, upper-case, exchange prefix removed
pub fn normalize_symbol(raw: &str) -> String {
    let trimmed = raw.trim();
    let bare = trimmed.rsplit(':').next().unwrap_or(trimmed);
    bare.to_ascii_uppercase()
}

/// Market cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Accumulation,
    Markup,
    Distribution,
    Markdown,
}

impl Phase {
    /// Phase implied by a free-form phase name
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.contains("MARKUP") || upper.contains("MARK_UP") || upper.contains("MARK UP") {
            Some(Phase::Markup)
        } else if upper.contains("MARKDOWN") || upper.contains("MARK_DOWN") || upper.contains("MARK DOWN") {
            Some(Phase::Markdown)
        } else if upper.contains("DISTRIBUTION") {
            Some(Phase::Distribution)
        } else if upper.contains("ACCUMULATION") {
            Some(Phase::Accumulation)
        } else {
            None
        }
    }

    /// Phase for the numeric ids 1-4 used by the phase indicator
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Phase::Accumulation),
            2 => Some(Phase::Markup),
            3 => Some(Phase::Distribution),
            4 => Some(Phase::Markdown),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Accumulation => "ACCUMULATION",
            Phase::Markup => "MARKUP",
            Phase::Distribution => "DISTRIBUTION",
            Phase::Markdown => "MARKDOWN",
        }
    }

    pub fn implied_bias(&self) -> Bias {
        match self {
            Phase::Accumulation | Phase::Markup => Bias::Bullish,
            Phase::Distribution | Phase::Markdown => Bias::Bearish,
        }
    }

    /// Whether a trade in `direction` is allowed during this phase
    pub fn permits(&self, direction: Direction) -> bool {
        match self {
            Phase::Accumulation | Phase::Markup => direction == Direction::Long,
            Phase::Distribution | Phase::Markdown => direction == Direction::Short,
        }
    }
}

/// Regime / phase section (regime source only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSection {
    #[serde(default)]
    pub phase_id: Option<u8>,
    pub phase_name: String,
    pub bias: Bias,
    /// 0-100
    pub confidence: f64,
    #[serde(default)]
    pub volatility: Option<String>,
    /// Higher-timeframe bias, when the indicator reports one
    #[serde(default)]
    pub htf_bias: Option<Bias>,
}

impl RegimeSection {
    pub fn phase(&self) -> Option<Phase> {
        Phase::from_name(&self.phase_name).or_else(|| self.phase_id.and_then(Phase::from_id))
    }
}

/// Multi-timeframe alignment section (alignment source only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSection {
    /// Timeframe label -> bias, ordered by label
    #[serde(default)]
    pub timeframes: BTreeMap<String, Bias>,
    pub bullish_pct: f64,
    pub bearish_pct: f64,
}

impl AlignmentSection {
    /// Percentage of timeframes agreeing with `direction`
    pub fn agreement_pct(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.bullish_pct,
            Direction::Short => self.bearish_pct,
        }
    }
}

/// Primary signal section (signal source only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertSection {
    pub direction: Direction,
    /// AI quality score on a 0-10 scale
    pub ai_score: f64,
    pub quality: QualityTier,
    /// Risk/reward to the first target
    #[serde(default)]
    pub rr_t1: Option<f64>,
    /// Risk/reward to the second target
    #[serde(default)]
    pub rr_t2: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub targets: Vec<f64>,
}

impl ExpertSection {
    /// Fail fast on values no caller should ever send
    pub fn validate(&self) -> Result<()> {
        if !self.ai_score.is_finite() || !(0.0..=10.0).contains(&self.ai_score) {
            return Err(EngineError::MalformedExpert(format!(
                "ai_score {} outside 0..=10",
                self.ai_score
            )));
        }
        for (name, rr) in [("rr_t1", self.rr_t1), ("rr_t2", self.rr_t2)] {
            if let Some(value) = rr {
                if !value.is_finite() || value < 0.0 {
                    return Err(EngineError::MalformedExpert(format!(
                        "{} {} must be finite and non-negative",
                        name, value
                    )));
                }
            }
        }
        Ok(())
    }

    /// Best available risk/reward ratio (first target preferred)
    pub fn risk_reward(&self) -> Option<f64> {
        self.rr_t1.or(self.rr_t2)
    }
}

/// Execution grade of the structural setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionGrade {
    A,
    B,
    C,
    D,
}

impl ExecutionGrade {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" | "A+" | "EXCELLENT" => Some(ExecutionGrade::A),
            "B" | "GOOD" => Some(ExecutionGrade::B),
            "C" | "FAIR" => Some(ExecutionGrade::C),
            "D" | "F" | "POOR" => Some(ExecutionGrade::D),
            _ => None,
        }
    }
}

/// Structural setup section (signal source only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSection {
    pub setup_valid: bool,
    pub liquidity_ok: bool,
    #[serde(default)]
    pub execution_quality: Option<ExecutionGrade>,
}

/// Named context section, used for ownership checks and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Regime,
    Alignment,
    Expert,
    Structure,
}

impl Section {
    pub fn name(&self) -> &'static str {
        match self {
            Section::Regime => "regime",
            Section::Alignment => "alignment",
            Section::Expert => "expert",
            Section::Structure => "structure",
        }
    }

    /// The only source allowed to populate this section
    pub fn owner(&self) -> Source {
        match self {
            Section::Regime => Source::Regime,
            Section::Alignment => Source::Alignment,
            Section::Expert | Section::Structure => Source::Signal,
        }
    }
}

/// What one source contributes to a context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialContext {
    #[serde(default)]
    pub instrument: Option<Instrument>,
    #[serde(default)]
    pub regime: Option<RegimeSection>,
    #[serde(default)]
    pub alignment: Option<AlignmentSection>,
    #[serde(default)]
    pub expert: Option<ExpertSection>,
    #[serde(default)]
    pub structure: Option<StructureSection>,
}

impl PartialContext {
    pub fn sections(&self) -> Vec<Section> {
        let mut sections = Vec::new();
        if self.regime.is_some() {
            sections.push(Section::Regime);
        }
        if self.alignment.is_some() {
            sections.push(Section::Alignment);
        }
        if self.expert.is_some() {
            sections.push(Section::Expert);
        }
        if self.structure.is_some() {
            sections.push(Section::Structure);
        }
        sections
    }

    /// Reject sections `source` is not allowed to populate
    pub fn check_ownership(&self, source: Source) -> Result<()> {
        match self.sections().into_iter().find(|s| s.owner() != source) {
            Some(section) => Err(EngineError::SectionNotOwned {
                origin: source,
                section: section.name(),
            }),
            None => Ok(()),
        }
    }
}

/// Aggregated per-symbol context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub instrument: Instrument,
    #[serde(default)]
    pub regime: Option<RegimeSection>,
    #[serde(default)]
    pub alignment: Option<AlignmentSection>,
    #[serde(default)]
    pub expert: Option<ExpertSection>,
    #[serde(default)]
    pub structure: Option<StructureSection>,
    /// Most recent contribution per source
    #[serde(default)]
    pub last_updated: BTreeMap<Source, Timestamp>,
    /// Storage version for optimistic concurrency
    #[serde(default)]
    pub version: u64,
}

impl DecisionContext {
    pub fn new(symbol: &str) -> Self {
        Self {
            instrument: Instrument::new(symbol),
            regime: None,
            alignment: None,
            expert: None,
            structure: None,
            last_updated: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.instrument.symbol
    }

    /// Merge a partial update
    ///
    /// Sections are replaced wholesale. The instrument keeps previously known
    /// price and exchange when the incoming update omits them.
    pub fn apply(&mut self, partial: PartialContext, source: Source, now: Timestamp) {
        if let Some(incoming) = partial.instrument {
            let previous = std::mem::replace(&mut self.instrument, incoming);
            self.instrument.symbol = previous.symbol;
            if self.instrument.price.is_none() {
                self.instrument.price = previous.price;
            }
            if self.instrument.exchange.is_none() {
                self.instrument.exchange = previous.exchange;
            }
        }
        if let Some(regime) = partial.regime {
            self.regime = Some(regime);
        }
        if let Some(alignment) = partial.alignment {
            self.alignment = Some(alignment);
        }
        if let Some(expert) = partial.expert {
            self.expert = Some(expert);
        }
        if let Some(structure) = partial.structure {
            self.structure = Some(structure);
        }
        self.last_updated.insert(source, now);
    }

    /// Whether the section(s) owned by `source` are present
    pub fn has_source_data(&self, source: Source) -> bool {
        match source {
            Source::Signal => self.expert.is_some(),
            Source::Regime => self.regime.is_some(),
            Source::Alignment => self.alignment.is_some(),
        }
    }

    /// Age of a source's latest contribution; future timestamps count as zero
    pub fn source_age(&self, source: Source, now: Timestamp) -> Option<Duration> {
        self.last_updated
            .get(&source)
            .map(|ts| (now - *ts).max(Duration::zero()))
    }

    pub fn is_fresh(&self, source: Source, max_age: Duration, now: Timestamp) -> bool {
        self.source_age(source, now)
            .map(|age| age <= max_age)
            .unwrap_or(false)
    }

    /// Copy with every stale source's sections removed
    ///
    /// Read-time staleness only; stored state is untouched.
    pub fn without_stale(&self, max_age: Duration, now: Timestamp) -> DecisionContext {
        let mut view = self.clone();
        if !self.is_fresh(Source::Signal, max_age, now) {
            view.expert = None;
            view.structure = None;
        }
        if !self.is_fresh(Source::Regime, max_age, now) {
            view.regime = None;
        }
        if !self.is_fresh(Source::Alignment, max_age, now) {
            view.alignment = None;
        }
        view
    }

    /// SHA-256 over the decision-relevant sections, timestamps excluded
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Canonical<'a> {
            symbol: &'a str,
            regime: &'a Option<RegimeSection>,
            alignment: &'a Option<AlignmentSection>,
            expert: &'a Option<ExpertSection>,
            structure: &'a Option<StructureSection>,
        }

        let canonical = Canonical {
            symbol: &self.instrument.symbol,
            regime: &self.regime,
            alignment: &self.alignment,
            expert: &self.expert,
            structure: &self.structure,
        };
        // Plain structs, enums, BTreeMaps and f64 always serialize.
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}
