//! Market context provider: best-effort options, liquidity and stats data

mod http;
mod provider;
mod types;

pub use http::HttpMarketSource;
pub use provider::{CompositeMarketProvider, MarketContextProvider, MarketDataSource, StaticMarketSource};
pub use types::{
    GammaBias, LiquidityMetrics, MarketSection, MarketSnapshot, OptionsMetrics, ProviderError,
    StatsMetrics,
};
