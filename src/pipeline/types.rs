//! Pipeline response types

use serde::Serialize;

use crate::common::types::{Action, Source};
use crate::context::ContextStatus;
use crate::engine::DecisionPacket;
use crate::ledger::LedgerWrite;

/// Response to one source update
///
/// Either a finished decision (with its ledger write report) or a waiting
/// state that says which required source is missing and how old it is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceUpdateOutcome {
    pub symbol: String,
    pub source: Source,
    /// Context satisfied the completeness rules at evaluation time
    pub complete: bool,
    pub status: ContextStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionPacket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<LedgerWrite>,
}

impl SourceUpdateOutcome {
    pub fn waiting(source: Source, status: ContextStatus) -> Self {
        Self {
            symbol: status.symbol.clone(),
            source,
            complete: false,
            waiting_reason: status.waiting_reason.clone(),
            status,
            decision: None,
            ledger: None,
        }
    }

    pub fn decided(
        source: Source,
        status: ContextStatus,
        decision: DecisionPacket,
        ledger: LedgerWrite,
    ) -> Self {
        Self {
            symbol: decision.symbol.clone(),
            source,
            complete: true,
            waiting_reason: None,
            status,
            decision: Some(decision),
            ledger: Some(ledger),
        }
    }

    pub fn action(&self) -> Option<Action> {
        self.decision.as_ref().map(|d| d.action)
    }

    /// Ledger write failed after retries (decision was still produced)
    pub fn persistence_failed(&self) -> bool {
        self.ledger.as_ref().map(|l| !l.stored).unwrap_or(false)
    }

    /// One-line summary for logs and the replay CLI
    pub fn summary(&self) -> String {
        match (&self.decision, &self.waiting_reason) {
            (Some(decision), _) => format!(
                "{} {} confidence {:.2} size {:.2}",
                self.symbol, decision.action, decision.confidence, decision.size_multiplier
            ),
            (None, Some(reason)) => format!("{} waiting: {}", self.symbol, reason),
            (None, None) => format!("{} waiting", self.symbol),
        }
    }
}
