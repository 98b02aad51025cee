//! Configuration: types, loading and startup validation

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{load_config, load_from_str};
pub use types::{
    AppConfig, AppSettings, CompletenessConfig, ConfidenceWeights, DatabaseConfig,
    DecisionThresholds, GateConfig, LedgerConfig, MarketDataConfig, SizingConfig,
};
pub use validation::ensure_same_completeness;
