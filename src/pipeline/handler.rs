//! Decision pipeline: normalize -> merge -> (maybe) evaluate -> record

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::types::SourceUpdateOutcome;
use crate::common::clock::Clock;
use crate::common::errors::Result;
use crate::common::types::Source;
use crate::config::{ensure_same_completeness, AppConfig};
use crate::context::{ContextStatus, ContextStore, PartialContext};
use crate::engine::{DecisionEngine, DecisionPacket};
use crate::ledger::{DecisionOutcome, LedgerAdapter, LedgerFilter, LedgerRecord, LedgerStore};
use crate::market::{MarketContextProvider, MarketSnapshot};
use crate::normalizer::normalize_detected;

/// Entry point for the webhook-handling layer
///
/// Holds no per-symbol state of its own: contexts live in the store's
/// repository, decisions in the ledger.
#[derive(Clone)]
pub struct DecisionPipeline {
    config: Arc<AppConfig>,
    store: ContextStore,
    engine: DecisionEngine,
    provider: Arc<dyn MarketContextProvider>,
    ledger: LedgerAdapter,
    clock: Arc<dyn Clock>,
}

impl DecisionPipeline {
    /// Wire the pipeline, failing on any configuration inconsistency
    pub fn new(
        config: AppConfig,
        store: ContextStore,
        provider: Arc<dyn MarketContextProvider>,
        ledger_store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        ensure_same_completeness(
            ("context store", store.completeness().as_ref()),
            ("pipeline config", &config.completeness),
        )?;

        let engine = DecisionEngine::from_config(&config);
        let ledger = LedgerAdapter::new(ledger_store, config.ledger.clone());
        info!(
            "Decision pipeline ready (ledger: {}, required sources: {:?}, max age {}s)",
            ledger.backend_name(),
            config.completeness.required_sources,
            config.completeness.max_age_secs
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            engine,
            provider,
            ledger,
            clock,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Merge one source's contribution and decide if the context is complete
    ///
    /// An incomplete context is a normal "waiting" outcome, not an error.
    /// Market data and ledger failures degrade the outcome; only malformed
    /// input or an unusable context store fail the call.
    #[instrument(skip(self, partial))]
    pub async fn handle_source_update(
        &self,
        symbol: &str,
        partial: PartialContext,
        source: Source,
    ) -> Result<SourceUpdateOutcome> {
        let started = Instant::now();
        let now = self.clock.now();

        let context = self.store.update(symbol, partial, source, now).await?;
        let status = self
            .store
            .completeness()
            .status(context.symbol(), Some(&context), now);

        let Some(snapshot_ctx) = self.store.snapshot_of(&context, now) else {
            info!(
                "{} not ready after {} update: {}",
                context.symbol(),
                source,
                status.waiting_reason.as_deref().unwrap_or("incomplete")
            );
            return Ok(SourceUpdateOutcome::waiting(source, status));
        };

        let remaining = self
            .config
            .settings
            .response_budget()
            .saturating_sub(started.elapsed());
        let market = match tokio::time::timeout(remaining, self.provider.fetch(snapshot_ctx.symbol())).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                warn!(
                    "Market data for {} exceeded the remaining {:?} of the response budget",
                    snapshot_ctx.symbol(),
                    remaining
                );
                MarketSnapshot::unavailable(
                    snapshot_ctx.symbol(),
                    "response budget exhausted",
                    self.clock.now(),
                )
            }
        };

        let evaluated = self.engine.evaluate(&snapshot_ctx, &market, now)?;
        let ledger = self.ledger.append(&evaluated).await;
        let packet = if ledger.duplicate && ledger.id != evaluated.id {
            self.recorded_packet(evaluated, ledger.id).await
        } else {
            evaluated
        };

        info!(
            "{} {} (confidence {:.2}, size {:.2}, ledger {})",
            packet.symbol,
            packet.action,
            packet.confidence,
            packet.size_multiplier,
            if ledger.stored { "stored" } else { "NOT stored" }
        );

        Ok(SourceUpdateOutcome::decided(source, status, packet, ledger))
    }

    /// The packet the ledger holds for `recorded_id`
    ///
    /// A re-fired context answers with the decision already on record. If it
    /// cannot be loaded the fresh evaluation is returned and `ledger.id`
    /// still names the recorded decision.
    async fn recorded_packet(&self, evaluated: DecisionPacket, recorded_id: Uuid) -> DecisionPacket {
        match self.ledger.record(recorded_id).await {
            Ok(Some(record)) => {
                debug!(
                    "{} context already decided as {}; returning the recorded packet",
                    evaluated.symbol, recorded_id
                );
                record.packet
            }
            Ok(None) => {
                warn!(
                    "Ledger reported {} as the recorded decision for {} but has no such record",
                    recorded_id, evaluated.symbol
                );
                evaluated
            }
            Err(e) => {
                warn!(
                    "Could not load recorded decision {} for {}: {}",
                    recorded_id, evaluated.symbol, e
                );
                evaluated
            }
        }
    }

    /// Normalize a raw payload and run it through [`Self::handle_source_update`]
    ///
    /// `declared` is the source named by the route, if any; otherwise the
    /// payload's own tag or shape decides.
    pub async fn handle_webhook(
        &self,
        payload: &Value,
        declared: Option<Source>,
    ) -> Result<SourceUpdateOutcome> {
        let update = normalize_detected(payload, declared)?;
        self.handle_source_update(&update.symbol, update.partial, update.source)
            .await
    }

    /// Read-only completeness report
    pub async fn get_context_status(&self, symbol: &str) -> Result<ContextStatus> {
        self.store.status(symbol, self.clock.now()).await
    }

    pub async fn query_ledger(&self, filter: &LedgerFilter) -> Result<Vec<LedgerRecord>> {
        self.ledger.query(filter).await
    }

    pub async fn attach_outcome(&self, decision_id: Uuid, outcome: &DecisionOutcome) -> Result<bool> {
        self.ledger.attach_outcome(decision_id, outcome).await
    }

    pub async fn outcome(&self, decision_id: Uuid) -> Result<Option<DecisionOutcome>> {
        self.ledger.outcome(decision_id).await
    }
}
