//! Decision pipeline
//!
//! The single entry point the webhook layer calls after receiving a payload:
//!
//! ```text
//! payload ──► normalizer ──► ContextStore::update ──► complete? ──no──► waiting
//!                                                        │
//!                                                       yes
//!                                                        ▼
//!                     MarketContextProvider ──► DecisionEngine ──► LedgerAdapter
//! ```

mod handler;
mod types;

pub use handler::DecisionPipeline;
pub use types::SourceUpdateOutcome;
