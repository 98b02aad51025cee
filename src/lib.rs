//! Confluence Engine Library
//!
//! Aggregates webhooks from independent trading-indicator sources into a
//! per-symbol decision context and, once the context is complete, evaluates
//! it into an auditable EXECUTE / WAIT / SKIP decision.

pub mod common;
pub mod config;
pub mod context;
pub mod engine;
pub mod ledger;
pub mod market;
pub mod normalizer;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use common::clock::{Clock, ManualClock, SystemClock};
pub use common::errors::{EngineError, Result, ValidationError};
pub use common::types::{Action, Bias, Direction, QualityTier, Source, Timestamp};
pub use config::types::AppConfig;
pub use context::{
    ContextRepository, ContextStatus, ContextStore, DecisionContext, InMemoryContextRepository,
    PartialContext, PgContextRepository,
};
pub use engine::{DecisionEngine, DecisionPacket, ENGINE_VERSION};
pub use ledger::{
    DecisionOutcome, InMemoryLedgerStore, LedgerAdapter, LedgerFilter, LedgerRecord, LedgerStore,
    LedgerWrite, PgLedgerStore,
};
pub use market::{
    CompositeMarketProvider, HttpMarketSource, MarketContextProvider, MarketDataSource,
    MarketSnapshot, StaticMarketSource,
};
pub use normalizer::{detect_source, normalize, normalize_detected, NormalizedUpdate};
pub use pipeline::{DecisionPipeline, SourceUpdateOutcome};
