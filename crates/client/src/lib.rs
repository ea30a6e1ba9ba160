//! # Trustline Client
//!
//! Multi-source trust resolution for ERC-8004 agents.
//!
//! A query walks an ordered chain of sources - paid HTTP API, free demo
//! endpoint, direct on-chain read - attempting each exactly once. Every
//! failure is classified into the stable fallback taxonomy; no raw error ever
//! crosses the client boundary. The caller always receives a structured
//! [`TrustEnvelope`](trustline_core::TrustEnvelope) carrying the verdict, the
//! source that produced it, and any degradation context.
//!
//! ```no_run
//! # async fn demo() {
//! use trustline_client::{ClientConfig, QueryOptions, TrustClient};
//!
//! let client = TrustClient::new(ClientConfig::default()).unwrap();
//! let envelope = client.score("42", &QueryOptions::default()).await;
//! println!("{} -> {}", envelope.verdict.as_str(), envelope.recommendation.as_str());
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod fallback;
pub mod shaper;
pub mod sources;

pub use client::{QueryOptions, TrustClient};
pub use config::{ClientConfig, QueryMode, X402Config};
pub use sources::{PaymentProvider, QueryKind, RawTrustData, ReportSource, SourceFailure};
