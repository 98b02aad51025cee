//! Error types for the application

use thiserror::Error;

use super::types::Source;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Webhook payload could not be normalized
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Mandatory expert section is unusable; no decision can be produced
    #[error("Malformed expert section: {0}")]
    MalformedExpert(String),

    /// Startup-time configuration inconsistency
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A partial update tried to write a section its source does not own
    #[error("Source {origin} may not populate section `{section}`")]
    SectionNotOwned {
        origin: Source,
        section: &'static str,
    },

    /// Optimistic concurrency retries exhausted for a symbol
    #[error("Concurrent update conflict for {symbol} after {attempts} attempts")]
    ContextConflict { symbol: String, attempts: u32 },

    /// Outcome attached to a decision the ledger has never seen
    #[error("Unknown decision id: {0}")]
    UnknownDecision(uuid::Uuid),

    /// Context or ledger storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database driver errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid upstream response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Tls(_)
            ),
            EngineError::HttpRequest(err) => err.is_timeout() || err.is_connect(),
            EngineError::Storage(_) | EngineError::Timeout(_) | EngineError::ContextConflict { .. } => {
                true
            }
            _ => false,
        }
    }
}

/// Diagnostic detail for a rejected webhook payload
///
/// This is the caller-facing answer to "why wasn't my webhook accepted".
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct ValidationError {
    /// Declared or detected source, when known
    pub source: Option<Source>,
    /// Logical fields that could not be extracted
    pub missing: Vec<String>,
    /// Field-name variants tried for each missing field, in priority order
    pub attempted: Vec<String>,
    /// Fields present in the payload (dotted paths, top two levels)
    pub seen: Vec<String>,
    /// Fields that were present but unusable, with the reason
    pub invalid: Vec<String>,
}

impl ValidationError {
    pub fn for_source(source: Option<Source>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn missing(&mut self, field: &str, aliases: &[&str]) {
        self.missing.push(field.to_string());
        self.attempted
            .push(format!("{}: [{}]", field, aliases.join(", ")));
    }

    pub fn invalid(&mut self, field: &str, reason: impl Into<String>) {
        self.invalid.push(format!("{}: {}", field, reason.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = self
            .source
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        write!(f, "Invalid {} payload", source)?;
        if !self.missing.is_empty() {
            write!(f, "; missing [{}]", self.missing.join(", "))?;
        }
        if !self.invalid.is_empty() {
            write!(f, "; invalid [{}]", self.invalid.join("; "))?;
        }
        if !self.attempted.is_empty() {
            write!(f, "; tried {}", self.attempted.join(" | "))?;
        }
        if !self.seen.is_empty() {
            write!(f, "; seen [{}]", self.seen.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
