//! Ledger storage port and in-memory backend

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{AppendReceipt, DecisionOutcome, LedgerFilter, LedgerRecord};
use crate::common::errors::{EngineError, Result};

/// Durable, append-only decision storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append a record; an existing record with the same context
    /// fingerprint is returned instead of writing a second one
    async fn append(&self, record: &LedgerRecord) -> Result<AppendReceipt>;

    /// Records matching `filter`, newest first
    async fn query(&self, filter: &LedgerFilter) -> Result<Vec<LedgerRecord>>;

    /// The record stored under `decision_id`, if any
    async fn record(&self, decision_id: Uuid) -> Result<Option<LedgerRecord>>;

    /// Attach an outcome; `false` when one was already attached
    async fn attach_outcome(&self, decision_id: Uuid, outcome: &DecisionOutcome) -> Result<bool>;

    async fn outcome(&self, decision_id: Uuid) -> Result<Option<DecisionOutcome>>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<LedgerRecord>,
    by_fingerprint: HashMap<String, Uuid>,
    outcomes: HashMap<Uuid, DecisionOutcome>,
}

/// Process-local ledger for paper replays and tests
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, record: &LedgerRecord) -> Result<AppendReceipt> {
        let mut inner = self.inner.write().await;
        if let Some(id) = inner.by_fingerprint.get(&record.context_fingerprint) {
            return Ok(AppendReceipt {
                id: *id,
                duplicate: true,
            });
        }
        inner
            .by_fingerprint
            .insert(record.context_fingerprint.clone(), record.id);
        inner.records.push(record.clone());
        Ok(AppendReceipt {
            id: record.id,
            duplicate: false,
        })
    }

    async fn query(&self, filter: &LedgerFilter) -> Result<Vec<LedgerRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<LedgerRecord> = inner
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.decided_at.cmp(&a.decided_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn record(&self, decision_id: Uuid) -> Result<Option<LedgerRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().find(|r| r.id == decision_id).cloned())
    }

    async fn attach_outcome(&self, decision_id: Uuid, outcome: &DecisionOutcome) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if !inner.records.iter().any(|r| r.id == decision_id) {
            return Err(EngineError::UnknownDecision(decision_id));
        }
        if inner.outcomes.contains_key(&decision_id) {
            return Ok(false);
        }
        inner.outcomes.insert(decision_id, outcome.clone());
        Ok(true)
    }

    async fn outcome(&self, decision_id: Uuid) -> Result<Option<DecisionOutcome>> {
        Ok(self.inner.read().await.outcomes.get(&decision_id).cloned())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
