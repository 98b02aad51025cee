//! Context store: authoritative per-symbol context, merge and completeness

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::repository::ContextRepository;
use super::types::{normalize_symbol, DecisionContext, PartialContext};
use crate::common::errors::{EngineError, Result};
use crate::common::types::{Source, Timestamp};
use crate::config::CompletenessConfig;

/// Read-only completeness report for one symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextStatus {
    pub symbol: String,
    pub is_complete: bool,
    /// Share of tracked sources with a fresh contribution, 0-100
    pub completeness_pct: f64,
    /// Seconds since each tracked source last contributed (None = never)
    pub per_source_age: BTreeMap<Source, Option<i64>>,
    /// Required sources that are absent or stale
    pub missing_required: Vec<Source>,
    /// Tracked sources whose last contribution is older than max age
    pub stale: Vec<Source>,
    /// Why no decision can be made yet, when incomplete
    pub waiting_reason: Option<String>,
}

impl CompletenessConfig {
    /// Completeness predicate: every required source present and fresh
    pub fn is_complete(&self, context: &DecisionContext, now: Timestamp) -> bool {
        context.expert.is_some()
            && self
                .required_sources
                .iter()
                .all(|s| context.has_source_data(*s) && context.is_fresh(*s, self.max_age(), now))
    }

    /// Full status report for a context (or for a symbol never seen)
    pub fn status(&self, symbol: &str, context: Option<&DecisionContext>, now: Timestamp) -> ContextStatus {
        let tracked = self.tracked_sources();
        let max_age = self.max_age();

        let mut per_source_age = BTreeMap::new();
        let mut stale = Vec::new();
        let mut fresh_count = 0usize;
        for source in &tracked {
            let age = context.and_then(|c| c.source_age(*source, now));
            per_source_age.insert(*source, age.map(|a| a.num_seconds()));
            match (age, context) {
                (Some(age), Some(c)) if age <= max_age && c.has_source_data(*source) => {
                    fresh_count += 1
                }
                (Some(age), _) if age > max_age => stale.push(*source),
                _ => {}
            }
        }

        let missing_required: Vec<Source> = self
            .required_sources
            .iter()
            .copied()
            .filter(|s| {
                !context
                    .map(|c| c.has_source_data(*s) && c.is_fresh(*s, max_age, now))
                    .unwrap_or(false)
            })
            .collect();

        let is_complete = context.map(|c| self.is_complete(c, now)).unwrap_or(false);

        let waiting_reason = if is_complete {
            None
        } else {
            let parts: Vec<String> = missing_required
                .iter()
                .map(|s| match per_source_age.get(s).copied().flatten() {
                    Some(age) => format!(
                        "required source `{}` is stale ({}s old, max {}s)",
                        s, age, self.max_age_secs
                    ),
                    None => format!("required source `{}` has not reported", s),
                })
                .collect();
            Some(if parts.is_empty() {
                "expert section missing".to_string()
            } else {
                parts.join("; ")
            })
        };

        let completeness_pct = if tracked.is_empty() {
            0.0
        } else {
            (fresh_count as f64 / tracked.len() as f64 * 10000.0).round() / 100.0
        };

        ContextStatus {
            symbol: symbol.to_string(),
            is_complete,
            completeness_pct,
            per_source_age,
            missing_required,
            stale,
            waiting_reason,
        }
    }
}

/// Owns the per-symbol contexts through a shared repository
#[derive(Clone)]
pub struct ContextStore {
    repository: Arc<dyn ContextRepository>,
    completeness: Arc<CompletenessConfig>,
    max_attempts: u32,
}

impl ContextStore {
    pub fn new(
        repository: Arc<dyn ContextRepository>,
        completeness: Arc<CompletenessConfig>,
        max_attempts: u32,
    ) -> Self {
        Self {
            repository,
            completeness,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Completeness rules this store was built with
    pub fn completeness(&self) -> &Arc<CompletenessConfig> {
        &self.completeness
    }

    /// Merge `partial` into the symbol's context and return the stored result
    ///
    /// Applied as a compare-and-swap loop: a concurrent writer causes a reload
    /// and re-merge, never a torn write.
    #[instrument(skip(self, partial), fields(backend = self.repository.backend_name()))]
    pub async fn update(
        &self,
        symbol: &str,
        partial: PartialContext,
        source: Source,
        now: Timestamp,
    ) -> Result<DecisionContext> {
        partial.check_ownership(source)?;
        let key = normalize_symbol(symbol);

        for attempt in 1..=self.max_attempts {
            let current = self.repository.load(&key).await?;
            let expected = current.as_ref().map(|c| c.version);

            let mut next = current.unwrap_or_else(|| DecisionContext::new(&key));
            next.apply(partial.clone(), source, now);
            next.version = expected.unwrap_or(0) + 1;

            if self.repository.compare_and_swap(&key, expected, &next).await? {
                debug!(
                    "Merged {} update into {} (version {}, attempt {})",
                    source, key, next.version, attempt
                );
                return Ok(next);
            }
            warn!(
                "Concurrent update for {} detected on attempt {}/{}, retrying",
                key, attempt, self.max_attempts
            );
        }

        Err(EngineError::ContextConflict {
            symbol: key,
            attempts: self.max_attempts,
        })
    }

    /// Raw stored context, including stale sections
    pub async fn get(&self, symbol: &str) -> Result<Option<DecisionContext>> {
        self.repository.load(&normalize_symbol(symbol)).await
    }

    pub async fn is_complete(&self, symbol: &str, now: Timestamp) -> Result<bool> {
        Ok(self
            .get(symbol)
            .await?
            .map(|c| self.completeness.is_complete(&c, now))
            .unwrap_or(false))
    }

    /// Context view with stale sources treated as absent
    pub async fn expire(&self, symbol: &str, now: Timestamp) -> Result<Option<DecisionContext>> {
        Ok(self
            .get(symbol)
            .await?
            .map(|c| c.without_stale(self.completeness.max_age(), now)))
    }

    /// Evaluation snapshot, or `None` while incomplete
    pub async fn build(&self, symbol: &str, now: Timestamp) -> Result<Option<DecisionContext>> {
        Ok(self.get(symbol).await?.and_then(|c| self.snapshot_of(&c, now)))
    }

    /// Evaluation snapshot of an already loaded context
    pub fn snapshot_of(&self, context: &DecisionContext, now: Timestamp) -> Option<DecisionContext> {
        if self.completeness.is_complete(context, now) {
            Some(context.without_stale(self.completeness.max_age(), now))
        } else {
            None
        }
    }

    pub async fn status(&self, symbol: &str, now: Timestamp) -> Result<ContextStatus> {
        let key = normalize_symbol(symbol);
        let context = self.repository.load(&key).await?;
        Ok(self.completeness.status(&key, context.as_ref(), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{Bias, Direction, QualityTier};
    use crate::context::repository::InMemoryContextRepository;
    use crate::context::types::{AlignmentSection, ExpertSection, RegimeSection};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap()
    }

    fn store() -> ContextStore {
        ContextStore::new(
            Arc::new(InMemoryContextRepository::new()),
            Arc::new(CompletenessConfig::default()),
            4,
        )
    }

    fn expert_update() -> PartialContext {
        PartialContext {
            expert: Some(ExpertSection {
                direction: Direction::Long,
                ai_score: 8.0,
                quality: QualityTier::High,
                rr_t1: Some(2.0),
                rr_t2: None,
                stop_loss: None,
                targets: vec![],
            }),
            ..Default::default()
        }
    }

    fn regime_update() -> PartialContext {
        PartialContext {
            regime: Some(RegimeSection {
                phase_id: Some(2),
                phase_name: "MARKUP".to_string(),
                bias: Bias::Bullish,
                confidence: 90.0,
                volatility: None,
                htf_bias: None,
            }),
            ..Default::default()
        }
    }

    fn alignment_update() -> PartialContext {
        PartialContext {
            alignment: Some(AlignmentSection {
                timeframes: BTreeMap::new(),
                bullish_pct: 80.0,
                bearish_pct: 20.0,
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_incomplete_until_expert_arrives() {
        let store = store();
        store.update("spy", regime_update(), Source::Regime, t0()).await.unwrap();
        assert!(!store.is_complete("SPY", t0()).await.unwrap());
        assert!(store.build("SPY", t0()).await.unwrap().is_none());

        let ctx = store.update("SPY", expert_update(), Source::Signal, t0()).await.unwrap();
        assert_eq!(ctx.version, 2);
        assert!(store.is_complete("SPY", t0()).await.unwrap());

        let built = store.build("SPY", t0()).await.unwrap().unwrap();
        assert!(built.regime.is_some());
        assert!(built.expert.is_some());
    }

    #[tokio::test]
    async fn test_completeness_independent_of_optional_sections() {
        let store = store();
        store.update("SPY", expert_update(), Source::Signal, t0()).await.unwrap();
        assert!(store.is_complete("SPY", t0()).await.unwrap());

        store.update("SPY", regime_update(), Source::Regime, t0()).await.unwrap();
        store.update("SPY", alignment_update(), Source::Alignment, t0()).await.unwrap();
        assert!(store.is_complete("SPY", t0()).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_expert_is_incomplete_not_error() {
        let store = store();
        store.update("SPY", expert_update(), Source::Signal, t0()).await.unwrap();

        let later = t0() + Duration::minutes(16);
        assert!(!store.is_complete("SPY", later).await.unwrap());
        assert!(store.build("SPY", later).await.unwrap().is_none());

        let status = store.status("SPY", later).await.unwrap();
        assert_eq!(status.missing_required, vec![Source::Signal]);
        assert_eq!(status.stale, vec![Source::Signal]);
        assert!(status
            .waiting_reason
            .unwrap()
            .contains("`signal` is stale (960s old, max 900s)"));
    }

    #[tokio::test]
    async fn test_expire_masks_stale_optional_sections() {
        let store = store();
        store.update("SPY", regime_update(), Source::Regime, t0()).await.unwrap();
        let later = t0() + Duration::minutes(30);
        store.update("SPY", expert_update(), Source::Signal, later).await.unwrap();

        let view = store.expire("SPY", later).await.unwrap().unwrap();
        assert!(view.regime.is_none());
        assert!(view.expert.is_some());

        let raw = store.get("SPY").await.unwrap().unwrap();
        assert!(raw.regime.is_some());
    }

    #[tokio::test]
    async fn test_status_for_unknown_symbol() {
        let status = store().status("NVDA", t0()).await.unwrap();
        assert!(!status.is_complete);
        assert_eq!(status.completeness_pct, 0.0);
        assert_eq!(status.per_source_age[&Source::Signal], None);
        assert_eq!(
            status.waiting_reason.as_deref(),
            Some("required source `signal` has not reported")
        );
    }

    #[tokio::test]
    async fn test_status_completeness_pct() {
        let store = store();
        store.update("SPY", expert_update(), Source::Signal, t0()).await.unwrap();
        store.update("SPY", regime_update(), Source::Regime, t0()).await.unwrap();

        let status = store.status("SPY", t0() + Duration::seconds(30)).await.unwrap();
        assert!(status.is_complete);
        assert_eq!(status.completeness_pct, 66.67);
        assert_eq!(status.per_source_age[&Source::Regime], Some(30));
        assert_eq!(status.per_source_age[&Source::Alignment], None);
        assert!(status.waiting_reason.is_none());
    }

    #[tokio::test]
    async fn test_foreign_section_rejected() {
        let err = store()
            .update("SPY", regime_update(), Source::Signal, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SectionNotOwned { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_updates_both_persist() {
        let store = store();
        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.update("SPY", regime_update(), Source::Regime, t0()).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.update("SPY", expert_update(), Source::Signal, t0()).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let ctx = store.get("SPY").await.unwrap().unwrap();
        assert!(ctx.regime.is_some());
        assert!(ctx.expert.is_some());
        assert_eq!(ctx.version, 2);
    }

    /// Repository that loses the first `conflicts` compare-and-swap races
    struct ContendedRepository {
        inner: InMemoryContextRepository,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl ContextRepository for ContendedRepository {
        async fn load(&self, symbol: &str) -> Result<Option<DecisionContext>> {
            self.inner.load(symbol).await
        }

        async fn compare_and_swap(
            &self,
            symbol: &str,
            expected: Option<u64>,
            context: &DecisionContext,
        ) -> Result<bool> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Ok(false);
            }
            self.inner.compare_and_swap(symbol, expected, context).await
        }

        fn backend_name(&self) -> &'static str {
            "contended"
        }
    }

    #[tokio::test]
    async fn test_conflicts_retried_then_reported() {
        let repo = Arc::new(ContendedRepository {
            inner: InMemoryContextRepository::new(),
            conflicts: AtomicU32::new(2),
        });
        let store = ContextStore::new(repo.clone(), Arc::new(CompletenessConfig::default()), 3);
        assert!(store.update("SPY", expert_update(), Source::Signal, t0()).await.is_ok());

        repo.conflicts.store(10, Ordering::SeqCst);
        let err = store
            .update("SPY", regime_update(), Source::Regime, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ContextConflict { attempts: 3, .. }));
    }
}
