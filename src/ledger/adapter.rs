//! Ledger adapter: packet -> record, bounded retry, never blocks the decision

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::store::LedgerStore;
use super::types::{DecisionOutcome, LedgerFilter, LedgerRecord, LedgerWrite};
use crate::common::errors::Result;
use crate::config::LedgerConfig;
use crate::engine::DecisionPacket;

#[derive(Clone)]
pub struct LedgerAdapter {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
    fallback_price: Decimal,
}

impl LedgerAdapter {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        let fallback_price = Decimal::from_f64(config.fallback_price)
            .map(|p| p.round_dp(6))
            .filter(|p| *p > Decimal::ZERO)
            .unwrap_or_else(|| Decimal::new(1, 2));
        Self {
            store,
            config,
            fallback_price,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Persist a packet at most once
    ///
    /// Transient failures are retried up to `max_attempts` with a fixed
    /// delay. The outcome, including a final failure, is reported rather
    /// than returned as an error.
    #[instrument(skip(self, packet), fields(id = %packet.id, symbol = %packet.symbol))]
    pub async fn append(&self, packet: &DecisionPacket) -> LedgerWrite {
        let record = LedgerRecord::from_packet(packet, self.fallback_price);
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.append(&record).await {
                Ok(receipt) => {
                    if receipt.duplicate {
                        info!(
                            "Context for {} already recorded as {}; not writing {}",
                            packet.symbol, receipt.id, packet.id
                        );
                    }
                    return LedgerWrite {
                        id: receipt.id,
                        stored: true,
                        duplicate: receipt.duplicate,
                        attempts: attempt,
                        error: None,
                    };
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "Ledger write attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        self.config.retry_delay()
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                Err(e) => {
                    error!(
                        "Ledger write for {} failed after {} attempt(s): {}",
                        packet.id, attempt, e
                    );
                    return LedgerWrite {
                        id: packet.id,
                        stored: false,
                        duplicate: false,
                        attempts: attempt,
                        error: Some(e.to_string()),
                    };
                }
            }
        }
    }

    pub async fn query(&self, filter: &LedgerFilter) -> Result<Vec<LedgerRecord>> {
        self.store.query(filter).await
    }

    pub async fn record(&self, decision_id: Uuid) -> Result<Option<LedgerRecord>> {
        self.store.record(decision_id).await
    }

    /// Idempotent: a second outcome for the same decision returns `false`
    pub async fn attach_outcome(&self, decision_id: Uuid, outcome: &DecisionOutcome) -> Result<bool> {
        let attached = self.store.attach_outcome(decision_id, outcome).await?;
        if !attached {
            info!("Outcome for {} already attached; ignoring", decision_id);
        }
        Ok(attached)
    }

    pub async fn outcome(&self, decision_id: Uuid) -> Result<Option<DecisionOutcome>> {
        self.store.outcome(decision_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::EngineError;
    use crate::common::types::{Action, Direction, QualityTier, Source, Timestamp};
    use crate::config::AppConfig;
    use crate::context::{DecisionContext, ExpertSection, Instrument};
    use crate::engine::DecisionEngine;
    use crate::ledger::store::{InMemoryLedgerStore, MockLedgerStore};
    use crate::ledger::types::AppendReceipt;
    use crate::market::MarketSnapshot;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 4, 15, 0, 0).unwrap()
    }

    fn packet(price: Option<f64>, stop: Option<f64>) -> DecisionPacket {
        let mut ctx = DecisionContext::new("SPY");
        ctx.instrument = Instrument {
            symbol: "SPY".into(),
            exchange: None,
            price,
        };
        ctx.expert = Some(ExpertSection {
            direction: Direction::Long,
            ai_score: 8.0,
            quality: QualityTier::High,
            rr_t1: Some(2.0),
            rr_t2: None,
            stop_loss: stop,
            targets: vec![455.5, -1.0],
        });
        ctx.last_updated.insert(Source::Signal, now());
        DecisionEngine::from_config(&AppConfig::default())
            .evaluate(&ctx, &MarketSnapshot::unavailable("SPY", "down", now()), now())
            .unwrap()
    }

    fn config() -> LedgerConfig {
        LedgerConfig {
            retry_delay_ms: 5,
            ..LedgerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_non_positive_prices_use_fallback() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let adapter = LedgerAdapter::new(store.clone(), config());

        let write = adapter.append(&packet(Some(0.0), Some(-3.0))).await;
        assert!(write.stored);

        let records = adapter.query(&LedgerFilter::for_symbol("spy")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, dec!(0.01));
        assert_eq!(records[0].stop_loss, Some(dec!(0.01)));
        assert_eq!(records[0].targets, vec![dec!(455.5), dec!(0.01)]);
    }

    #[tokio::test]
    async fn test_prices_that_round_to_zero_use_fallback() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let adapter = LedgerAdapter::new(store.clone(), config());

        let write = adapter.append(&packet(Some(0.0000004), Some(0.0000002))).await;
        assert!(write.stored);

        let records = adapter.query(&LedgerFilter::for_symbol("SPY")).await.unwrap();
        assert_eq!(records[0].price, dec!(0.01));
        assert_eq!(records[0].stop_loss, Some(dec!(0.01)));
        assert!(records[0].price > Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_small_positive_price_kept_at_column_scale() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let adapter = LedgerAdapter::new(store, config());

        adapter.append(&packet(Some(0.0000006), None)).await;
        let records = adapter.query(&LedgerFilter::default()).await.unwrap();
        assert_eq!(records[0].price, dec!(0.000001));
    }

    #[tokio::test]
    async fn test_duplicate_context_returns_original_id() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let adapter = LedgerAdapter::new(store.clone(), config());

        let first = packet(Some(450.0), None);
        let mut second = first.clone();
        second.id = Uuid::new_v4();

        let a = adapter.append(&first).await;
        let b = adapter.append(&second).await;
        assert!(!a.duplicate);
        assert!(b.duplicate);
        assert!(b.stored);
        assert_eq!(b.id, first.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_stored() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut store = MockLedgerStore::new();
        store.expect_append().times(2).returning(move |record| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EngineError::Storage("connection reset".into()))
            } else {
                Ok(AppendReceipt {
                    id: record.id,
                    duplicate: false,
                })
            }
        });

        let adapter = LedgerAdapter::new(Arc::new(store), config());
        let write = adapter.append(&packet(Some(450.0), None)).await;
        assert!(write.stored);
        assert_eq!(write.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_reported_not_raised() {
        let mut store = MockLedgerStore::new();
        store
            .expect_append()
            .times(2)
            .returning(|_| Err(EngineError::Storage("database unavailable".into())));

        let adapter = LedgerAdapter::new(Arc::new(store), config());
        let packet = packet(Some(450.0), None);
        let write = adapter.append(&packet).await;

        assert!(!write.stored);
        assert_eq!(write.id, packet.id);
        assert_eq!(write.attempts, 2);
        assert!(write.error.unwrap().contains("database unavailable"));
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let mut store = MockLedgerStore::new();
        store
            .expect_append()
            .times(1)
            .returning(|_| Err(EngineError::InvalidResponse("schema mismatch".into())));

        let adapter = LedgerAdapter::new(Arc::new(store), config());
        let write = adapter.append(&packet(Some(450.0), None)).await;
        assert!(!write.stored);
        assert_eq!(write.attempts, 1);
    }

    #[tokio::test]
    async fn test_attach_outcome_is_idempotent() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let adapter = LedgerAdapter::new(store, config());
        let packet = packet(Some(450.0), Some(445.0));
        adapter.append(&packet).await;

        let outcome = DecisionOutcome {
            exit_price: dec!(455.5),
            realized_pnl: dec!(5.5),
            closed_at: now() + Duration::hours(2),
            note: None,
        };
        assert!(adapter.attach_outcome(packet.id, &outcome).await.unwrap());

        let later = DecisionOutcome {
            exit_price: dec!(440),
            ..outcome.clone()
        };
        assert!(!adapter.attach_outcome(packet.id, &later).await.unwrap());
        assert_eq!(adapter.outcome(packet.id).await.unwrap(), Some(outcome));

        let unknown = adapter.attach_outcome(Uuid::new_v4(), &later).await;
        assert!(matches!(unknown, Err(EngineError::UnknownDecision(_))));
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let adapter = LedgerAdapter::new(store, config());
        let packet = packet(Some(450.0), None);
        adapter.append(&packet).await;

        let by_action = LedgerFilter {
            action: Some(Action::Execute),
            ..LedgerFilter::default()
        };
        let expected = usize::from(packet.action == Action::Execute);
        assert_eq!(adapter.query(&by_action).await.unwrap().len(), expected);

        let later = LedgerFilter {
            since: Some(now() + Duration::seconds(1)),
            ..LedgerFilter::default()
        };
        assert!(adapter.query(&later).await.unwrap().is_empty());

        let other_version = LedgerFilter {
            engine_version: Some("confluence-0.0.0".into()),
            ..LedgerFilter::default()
        };
        assert!(adapter.query(&other_version).await.unwrap().is_empty());
    }
}
