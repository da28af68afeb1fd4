//! Error types for the answersmith engine.
//!
//! Per-source retrieval faults never appear here: the orchestrator contains
//! them locally and records them in the per-query stats instead. The public
//! taxonomy stays small so a synthesis failure is always distinguishable from
//! a grounded answer.

use thiserror::Error;

/// Errors surfaced to callers of the answer engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Inbound contract violation: query text was empty
    #[error("Query text must not be empty")]
    EmptyQuery,

    /// Configuration load or validation failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// The completion model failed to produce an answer. This variant must
    /// never be replaced with a default answer string.
    #[error("Answer synthesis failed ({model}): {reason}")]
    Synthesis { model: String, reason: String },

    /// Internal fault in the merge/rank/truncate stage
    #[error("Orchestration failed: {0}")]
    Orchestration(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// True when the completion model itself failed
    pub fn is_synthesis_failure(&self) -> bool {
        matches!(self, EngineError::Synthesis { .. })
    }
}
