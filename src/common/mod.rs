//! Shared building blocks: error taxonomy, domain enums and the clock port

pub mod clock;
pub mod errors;
pub mod types;
