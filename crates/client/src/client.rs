//! The multi-source trust client.
//!
//! One query walks the source sequence for its mode, attempting each source
//! exactly once and classifying every failure. Sources are attempted
//! sequentially, never in parallel: the ordering is the fallback contract,
//! and the cheaper sources must not be hit when the preferred one answers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use trustline_core::{AgentId, FallbackCause, QueryStatus, SourceKind, TrustEnvelope};

use crate::config::{ClientConfig, QueryMode};
use crate::shaper::{shape_failure, shape_success};
use crate::sources::{
    ContractSource, HttpSource, PaymentProvider, QueryKind, RawTrustData, ReportSource,
    SourceFailure,
};

/// Per-query overrides. Unset fields inherit from [`ClientConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Source chain to start from.
    pub mode: Option<QueryMode>,

    /// Override for the demo fallback flag.
    pub allow_demo_fallback: Option<bool>,

    /// Override for the on-chain fallback flag.
    pub allow_onchain_fallback: Option<bool>,
}

/// A reusable, reentrant trust client.
///
/// The paid fetcher and the contract reader are built lazily, at most once
/// per instance, and never mutated afterwards.
pub struct TrustClient {
    config: ClientConfig,
    http: reqwest::Client,
    payment: Option<Arc<dyn PaymentProvider>>,
    paid: std::sync::OnceLock<HttpSource>,
    demo: std::sync::OnceLock<HttpSource>,
    contract: OnceCell<Arc<dyn ReportSource>>,
}

impl TrustClient {
    /// Create a client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("trustline-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            http,
            payment: None,
            paid: std::sync::OnceLock::new(),
            demo: std::sync::OnceLock::new(),
            contract: OnceCell::new(),
        })
    }

    /// Attach a payment provider for paid-mode queries. Without one, paid
    /// attempts reach the API unauthenticated and fall back on the 402.
    pub fn with_payment_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.payment = Some(provider);
        self
    }

    /// Replace the on-chain source. Intended for custom providers and tests;
    /// the default reads `getDetailedReport` over the configured RPC URL.
    pub fn with_contract_source(mut self, source: Arc<dyn ReportSource>) -> Self {
        self.contract = OnceCell::new_with(Some(source));
        self
    }

    /// Resolve a score query.
    pub async fn score(&self, raw_agent_id: &str, options: &QueryOptions) -> TrustEnvelope {
        self.resolve(QueryKind::Score, raw_agent_id, options).await
    }

    /// Resolve a report query.
    pub async fn report(&self, raw_agent_id: &str, options: &QueryOptions) -> TrustEnvelope {
        self.resolve(QueryKind::Report, raw_agent_id, options).await
    }

    async fn resolve(
        &self,
        kind: QueryKind,
        raw_agent_id: &str,
        options: &QueryOptions,
    ) -> TrustEnvelope {
        let correlation_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let mode = options.mode.unwrap_or(self.config.default_mode);
        let allow_demo = options
            .allow_demo_fallback
            .unwrap_or(self.config.allow_demo_fallback);
        let allow_onchain = options
            .allow_onchain_fallback
            .unwrap_or(self.config.allow_onchain_fallback);
        let sequence = source_sequence(mode, allow_demo, allow_onchain);
        let primary = sequence
            .first()
            .copied()
            .unwrap_or(SourceKind::TrustscoreContract);

        // Validation short-circuits before any remote call.
        let agent = match AgentId::parse(raw_agent_id) {
            Ok(agent) => agent,
            Err(err) => {
                return shape_failure(
                    None,
                    QueryStatus::Error,
                    FallbackCause::InvalidAgentId,
                    err.to_string(),
                    primary,
                    elapsed_ms(started),
                    correlation_id,
                );
            }
        };

        let mut last_failure: Option<SourceFailure> = None;
        let mut last_attempted = primary;

        for &source in &sequence {
            last_attempted = source;
            match self.attempt(source, kind, &agent).await {
                Ok(raw) => {
                    return shape_success(
                        &agent,
                        &raw,
                        source,
                        last_failure.as_ref(),
                        elapsed_ms(started),
                        correlation_id,
                        &self.config,
                    );
                }
                Err(failure) => {
                    debug!(
                        "source {} failed for agent {}: {}",
                        source.as_str(),
                        agent,
                        failure
                    );
                    last_failure = Some(failure);
                }
            }
        }

        let failure = last_failure
            .unwrap_or_else(|| SourceFailure::new(FallbackCause::OracleUnavailable, "no sources"));
        let status = if failure.cause == FallbackCause::AgentNotFound {
            QueryStatus::Error
        } else {
            QueryStatus::Degraded
        };

        shape_failure(
            Some(agent.to_decimal()),
            status,
            failure.cause,
            failure.message,
            last_attempted,
            elapsed_ms(started),
            correlation_id,
        )
    }

    async fn attempt(
        &self,
        source: SourceKind,
        kind: QueryKind,
        agent: &AgentId,
    ) -> Result<RawTrustData, SourceFailure> {
        match source {
            SourceKind::ApiPaid => self.paid_source().fetch(kind, agent).await,
            SourceKind::ApiDemo => self.demo_source().fetch(kind, agent).await,
            SourceKind::TrustscoreContract => {
                let contract = self.contract_source().await?;
                contract.fetch(kind, agent).await
            }
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    fn paid_source(&self) -> &HttpSource {
        self.paid.get_or_init(|| {
            HttpSource::paid(
                self.http.clone(),
                self.config.base_url.clone(),
                self.timeout(),
                self.payment.clone(),
            )
        })
    }

    fn demo_source(&self) -> &HttpSource {
        self.demo.get_or_init(|| {
            HttpSource::demo(
                self.http.clone(),
                self.config.base_url.clone(),
                self.timeout(),
            )
        })
    }

    async fn contract_source(&self) -> Result<&Arc<dyn ReportSource>, SourceFailure> {
        self.contract
            .get_or_try_init(|| async {
                let address = self.config.trust_score_address.ok_or_else(|| {
                    SourceFailure::new(
                        FallbackCause::OracleUnavailable,
                        "trust score contract address not configured",
                    )
                })?;
                let source =
                    ContractSource::new(&self.config.rpc_url, address).map_err(|err| {
                        SourceFailure::new(FallbackCause::RpcUnavailable, format!("{err:#}"))
                    })?;
                Ok(Arc::new(source) as Arc<dyn ReportSource>)
            })
            .await
    }
}

/// The ordered source sequence for a mode and its fallback flags.
fn source_sequence(mode: QueryMode, allow_demo: bool, allow_onchain: bool) -> Vec<SourceKind> {
    match mode {
        QueryMode::TrustscoreContract => vec![SourceKind::TrustscoreContract],
        QueryMode::ApiDemo => {
            let mut sequence = vec![SourceKind::ApiDemo];
            if allow_onchain {
                sequence.push(SourceKind::TrustscoreContract);
            }
            sequence
        }
        QueryMode::ApiPaid => {
            let mut sequence = vec![SourceKind::ApiPaid];
            if allow_demo {
                sequence.push(SourceKind::ApiDemo);
            }
            if allow_onchain {
                sequence.push(SourceKind::TrustscoreContract);
            }
            sequence
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_sequence_honors_both_flags() {
        assert_eq!(
            source_sequence(QueryMode::ApiPaid, true, true),
            vec![
                SourceKind::ApiPaid,
                SourceKind::ApiDemo,
                SourceKind::TrustscoreContract
            ]
        );
        assert_eq!(
            source_sequence(QueryMode::ApiPaid, false, true),
            vec![SourceKind::ApiPaid, SourceKind::TrustscoreContract]
        );
        assert_eq!(
            source_sequence(QueryMode::ApiPaid, true, false),
            vec![SourceKind::ApiPaid, SourceKind::ApiDemo]
        );
        assert_eq!(
            source_sequence(QueryMode::ApiPaid, false, false),
            vec![SourceKind::ApiPaid]
        );
    }

    #[test]
    fn demo_sequence_ignores_demo_flag() {
        assert_eq!(
            source_sequence(QueryMode::ApiDemo, false, true),
            vec![SourceKind::ApiDemo, SourceKind::TrustscoreContract]
        );
        assert_eq!(
            source_sequence(QueryMode::ApiDemo, true, false),
            vec![SourceKind::ApiDemo]
        );
    }

    #[test]
    fn contract_sequence_is_single_source() {
        assert_eq!(
            source_sequence(QueryMode::TrustscoreContract, true, true),
            vec![SourceKind::TrustscoreContract]
        );
    }

    #[tokio::test]
    async fn invalid_agent_id_short_circuits() {
        let client = TrustClient::new(ClientConfig::default()).unwrap();
        let envelope = client.score("abc", &QueryOptions::default()).await;

        assert_eq!(envelope.status, QueryStatus::Error);
        assert_eq!(envelope.fallback, Some(FallbackCause::InvalidAgentId));
        assert_eq!(envelope.score, None);
        assert_eq!(envelope.agent_id, None);
        assert_eq!(envelope.source, SourceKind::ApiPaid);
        assert_eq!(
            envelope.recommendation,
            trustline_core::Recommendation::ManualReview
        );
        assert!(envelope.is_consistent());
        assert!(Uuid::parse_str(&envelope.correlation_id).is_ok());
    }

    #[tokio::test]
    async fn contract_mode_without_address_is_oracle_unavailable() {
        let config = ClientConfig {
            trust_score_address: None,
            ..ClientConfig::default()
        };
        let client = TrustClient::new(config).unwrap();
        let options = QueryOptions {
            mode: Some(QueryMode::TrustscoreContract),
            ..QueryOptions::default()
        };
        let envelope = client.score("1", &options).await;

        assert_eq!(envelope.status, QueryStatus::Degraded);
        assert_eq!(envelope.fallback, Some(FallbackCause::OracleUnavailable));
        assert_eq!(envelope.source, SourceKind::TrustscoreContract);
    }
}
