//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Agent ID was empty or absent.
    #[error("agent id is required")]
    MissingAgentId,

    /// Agent ID contained something other than base-10 digits.
    #[error("agent id must be a base-10 unsigned integer (got {0:?})")]
    MalformedAgentId(String),

    /// Agent ID exceeds the uint256 range.
    #[error("agent id exceeds 2^256 - 1 (got {0:?})")]
    AgentIdOutOfRange(String),

    /// Feedback counters violate `positive <= total`.
    #[error("positive feedback {positive} exceeds total feedback {total}")]
    InconsistentFeedbackCounters {
        /// Total feedback count.
        total: u64,
        /// Positive feedback count.
        positive: u64,
    },
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
