//! # Trustline Core
//!
//! Core types for the trustline reputation oracle.
//!
//! This crate provides the leaf building blocks shared by the indexer, the
//! scoring engine, and the trust client:
//!
//! - **Agent identifiers**: validated 256-bit IDs with canonical decimal form
//! - **Score records**: the on-chain `TrustScore` view the client consumes
//! - **Scoring configuration**: every knob of the scoring algorithm
//! - **Response envelope**: the structured verdict shape and its enumerations,
//!   including the fallback taxonomy
//!
//! The envelope and the fallback taxonomy live here, below both the client and
//! the classifier, so neither has to depend on the other.

#![warn(missing_docs)]

pub mod agent_id;
pub mod config;
pub mod envelope;
pub mod error;
pub mod types;

pub use agent_id::AgentId;
pub use config::ScoringConfig;
pub use envelope::{
    EnvelopeData, FallbackCause, QueryStatus, Recommendation, RiskFactor, SourceKind,
    TrustEnvelope, Verdict,
};
pub use error::{CoreError, Result};
pub use types::ScoreRecord;

// Re-export the primitives used across crate boundaries
pub use alloy_primitives::{Address, B256, U256};
