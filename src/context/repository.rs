//! Storage port for per-symbol contexts
//!
//! The context store keeps no state of its own; every read and write goes
//! through a [`ContextRepository`] so that all handler instances observe the
//! same context. Writes are versioned compare-and-swap operations, which is
//! what makes concurrent updates for one symbol atomic.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::DecisionContext;
use crate::common::errors::Result;

/// Port for shared, keyed context storage
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Load the stored context for a symbol
    async fn load(&self, symbol: &str) -> Result<Option<DecisionContext>>;

    /// Store `context` only if the stored version still equals `expected`
    ///
    /// `expected == None` means "only if no context exists yet". Returns
    /// `false` when another writer got there first.
    async fn compare_and_swap(
        &self,
        symbol: &str,
        expected: Option<u64>,
        context: &DecisionContext,
    ) -> Result<bool>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Process-local repository
///
/// Only correct when a single handler instance is running; multi-instance
/// deployments must use the Postgres repository.
#[derive(Debug, Default)]
pub struct InMemoryContextRepository {
    contexts: RwLock<HashMap<String, DecisionContext>>,
}

impl InMemoryContextRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of symbols with a stored context
    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }
}

#[async_trait]
impl ContextRepository for InMemoryContextRepository {
    async fn load(&self, symbol: &str) -> Result<Option<DecisionContext>> {
        Ok(self.contexts.read().await.get(symbol).cloned())
    }

    async fn compare_and_swap(
        &self,
        symbol: &str,
        expected: Option<u64>,
        context: &DecisionContext,
    ) -> Result<bool> {
        let mut contexts = self.contexts.write().await;
        let current = contexts.get(symbol).map(|c| c.version);
        if current != expected {
            return Ok(false);
        }
        contexts.insert(symbol.to_string(), context.clone());
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_compare_and_swap_detects_conflicts() {
        let repo = InMemoryContextRepository::new();
        let mut ctx = DecisionContext::new("SPY");
        ctx.version = 1;

        assert!(repo.compare_and_swap("SPY", None, &ctx).await.unwrap());
        assert!(!repo.compare_and_swap("SPY", None, &ctx).await.unwrap());

        let mut next = ctx.clone();
        next.version = 2;
        assert!(repo.compare_and_swap("SPY", Some(1), &next).await.unwrap());
        assert!(!repo.compare_and_swap("SPY", Some(1), &next).await.unwrap());

        assert_eq!(repo.load("SPY").await.unwrap().unwrap().version, 2);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_symbol_loads_none() {
        let repo = InMemoryContextRepository::new();
        assert!(repo.load("QQQ").await.unwrap().is_none());
        assert!(repo.is_empty().await);
    }
}
