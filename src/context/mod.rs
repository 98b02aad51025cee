//! Context aggregation
//!
//! Webhooks from different sources arrive out of order; the context store
//! merges each one into a single per-symbol [`DecisionContext`] and answers
//! whether it is complete enough to evaluate.
//!
//! ```text
//! PartialContext ──► ContextStore::update ──► ContextRepository (CAS)
//!                          │
//!                          ▼
//!                 CompletenessConfig::is_complete ──► build() / expire()
//! ```

mod postgres;
mod repository;
mod store;
mod types;

pub use postgres::PgContextRepository;
pub use repository::{ContextRepository, InMemoryContextRepository};
pub use store::{ContextStatus, ContextStore};
pub use types::{
    normalize_symbol, AlignmentSection, DecisionContext, ExecutionGrade, ExpertSection,
    Instrument, PartialContext, Phase, RegimeSection, Section, StructureSection,
};
