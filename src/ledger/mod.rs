//! Decision ledger
//!
//! Append-only, durable record of every decision. Each context fingerprint is
//! written at most once; outcomes are attached separately and never rewrite
//! the original record.

mod adapter;
mod postgres;
mod store;
mod types;

pub use adapter::LedgerAdapter;
pub use postgres::PgLedgerStore;
pub use store::{InMemoryLedgerStore, LedgerStore};
pub use types::{AppendReceipt, DecisionOutcome, LedgerFilter, LedgerRecord, LedgerWrite};
