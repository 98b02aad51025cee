//! Ledger record types

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::common::types::{Action, Direction, Timestamp};
use crate::engine::DecisionPacket;

/// Append-only ledger row
///
/// Price columns are always strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: Uuid,
    pub symbol: String,
    pub action: Action,
    pub direction: Option<Direction>,
    pub confidence: f64,
    pub size_multiplier: f64,
    pub price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub targets: Vec<Decimal>,
    pub context_fingerprint: String,
    pub engine_version: String,
    pub decided_at: Timestamp,
    /// Full packet, including context and market snapshot, for audit and replay
    pub packet: DecisionPacket,
}

/// Price rounded to the column scale, or the fallback with a warning when
/// the rounded value is not strictly positive
fn positive_price(field: &str, value: Option<f64>, fallback: Decimal, symbol: &str) -> Decimal {
    let stored = value
        .and_then(Decimal::from_f64)
        .map(|p| p.round_dp(6))
        .filter(|p| *p > Decimal::ZERO);
    match stored {
        Some(price) => price,
        None => {
            warn!(
                "Ledger {} for {} was {:?}; substituting fallback {}",
                field, symbol, value, fallback
            );
            fallback
        }
    }
}

impl LedgerRecord {
    pub fn from_packet(packet: &DecisionPacket, fallback_price: Decimal) -> Self {
        let symbol = packet.symbol.as_str();
        let expert = packet.context.expert.as_ref();

        let price = positive_price("price", packet.context.instrument.price, fallback_price, symbol);
        let stop_loss = expert
            .and_then(|e| e.stop_loss)
            .map(|stop| positive_price("stop_loss", Some(stop), fallback_price, symbol));
        let targets = expert
            .map(|e| {
                e.targets
                    .iter()
                    .map(|t| positive_price("target", Some(*t), fallback_price, symbol))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: packet.id,
            symbol: packet.symbol.clone(),
            action: packet.action,
            direction: packet.direction,
            confidence: packet.confidence,
            size_multiplier: packet.size_multiplier,
            price,
            stop_loss,
            targets,
            context_fingerprint: packet.context_fingerprint.clone(),
            engine_version: packet.engine_version.clone(),
            decided_at: packet.decided_at,
            packet: packet.clone(),
        }
    }
}

/// Result of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendReceipt {
    /// Id of the stored record; the original one when `duplicate`
    pub id: Uuid,
    /// A record with the same context fingerprint already existed
    pub duplicate: bool,
}

/// Ledger query filters; all are optional and combined with AND
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub symbol: Option<String>,
    /// Inclusive lower bound on `decided_at`
    pub since: Option<Timestamp>,
    /// Exclusive upper bound on `decided_at`
    pub until: Option<Timestamp>,
    pub engine_version: Option<String>,
    pub action: Option<Action>,
    pub limit: Option<usize>,
}

impl LedgerFilter {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(crate::context::normalize_symbol(symbol)),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &LedgerRecord) -> bool {
        self.symbol.as_ref().map_or(true, |s| *s == record.symbol)
            && self.since.map_or(true, |t| record.decided_at >= t)
            && self.until.map_or(true, |t| record.decided_at < t)
            && self
                .engine_version
                .as_ref()
                .map_or(true, |v| *v == record.engine_version)
            && self.action.map_or(true, |a| a == record.action)
    }
}

/// Exit / outcome attached to a decision after the fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
    pub closed_at: Timestamp,
    #[serde(default)]
    pub note: Option<String>,
}

/// What the pipeline reports about a ledger write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerWrite {
    /// Decision id (the original one when the write was a duplicate)
    pub id: Uuid,
    pub stored: bool,
    pub duplicate: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
