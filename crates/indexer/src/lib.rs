//! Feedback-event indexing for the trustline reputation oracle.
//!
//! This crate provides:
//! - Event listening for ERC-8004 feedback events (both accepted signatures)
//! - A durable, atomically-persisted cycle checkpoint
//! - A retry harness for transient RPC failures
//! - The indexer cycle: discover dirty agents, recompute their scores through
//!   the engine, commit one `batchUpdateScores` transaction, advance the
//!   checkpoint
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────┐
//! │  trustline-indexer (this crate)  │
//! │                                   │
//! │  ┌──────────────┐                 │
//! │  │ Event Source │ ← Ethereum RPC  │
//! │  │  (listener)  │   FeedbackPosted + NewFeedback
//! │  └──────┬───────┘                 │
//! │         │ dirty agents            │
//! │   ┌─────▼──────┐   ┌───────────┐  │
//! │   │   Cycle    │──▶│  Engine   │  │
//! │   │ (serial)   │   │ (scoring) │  │
//! │   └─────┬──────┘   └───────────┘  │
//! │         │ batchUpdateScores       │
//! │         ▼                         │
//! │    TrustScore (on-chain)          │
//! │         │                         │
//! │   ┌─────▼──────┐                  │
//! │   │ Checkpoint │ ← JSON file,     │
//! │   │   store    │   atomic rename  │
//! │   └────────────┘                  │
//! └───────────────────────────────────┘
//! ```
//!
//! At most one cycle is in flight at any time: the score contract's updater
//! is a single signer with a monotonic nonce, and the polling loop awaits
//! each cycle before sleeping.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod config;
pub mod contract;
pub mod cycle;
pub mod listener;
pub mod retry;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use cycle::{CycleReport, Indexer};
pub use retry::RetryPolicy;
