//! Event listening: feedback log decoding and the RPC provider wrapper.

pub mod events;
pub mod provider;

pub use events::{normalize_events, FeedbackEvent, FeedbackEventKind};
pub use provider::RpcProvider;
