//! Trust-data sources: the HTTP API (paid and demo) and the on-chain read.
//!
//! A source attempt either yields [`RawTrustData`] or a [`SourceFailure`]
//! already classified into the fallback taxonomy. Attempts are single-shot;
//! the only time bound is the per-request timeout.

use alloy::primitives::Address;
use alloy::providers::{ProviderBuilder, RootProvider};
use alloy::sol;
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use trustline_core::{AgentId, FallbackCause, RiskFactor, ScoreRecord};

use crate::fallback::{classify_contract_error, classify_http_status, classify_http_transport};

/// Header carrying the x402 payment proof on paid routes.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract TrustScore {
        function getScore(uint256 agentId) external view returns (uint256);
        function getDetailedReport(uint256 agentId) external view
            returns (uint256 score, uint256 totalFeedback, uint256 positiveFeedback, uint256 lastUpdated, bool exists);
    }
}

/// What is being asked about an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// The score endpoint: score and confidence only.
    Score,
    /// The report endpoint: score plus analytics.
    Report,
}

impl QueryKind {
    /// URL path segment for this kind.
    pub const fn path_segment(&self) -> &'static str {
        match self {
            QueryKind::Score => "score",
            QueryKind::Report => "report",
        }
    }
}

/// A classified source failure. This is the only failure shape that leaves a
/// source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Taxonomy classification.
    pub cause: FallbackCause,
    /// Human-readable detail for the envelope's `error` field.
    pub message: String,
}

impl SourceFailure {
    /// Build a failure.
    pub fn new(cause: FallbackCause, message: impl Into<String>) -> Self {
        Self {
            cause,
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.cause.as_str(), self.message)
    }
}

/// Raw trust data as a source produced it, before shaping.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTrustData {
    /// Score as reported; may be absent.
    pub score: Option<f64>,

    /// Explicit numeric confidence.
    pub confidence: Option<f64>,

    /// Discrete confidence band (`high`, `low`, `none`).
    pub confidence_band: Option<String>,

    /// Total feedback count.
    pub total_feedback: Option<u64>,

    /// Positive feedback count.
    pub positive_feedback: Option<u64>,

    /// Seconds since epoch of the last score write.
    pub last_updated: Option<u64>,

    /// Flag state as reported by the API.
    pub flagged: Option<bool>,

    /// Risk-factor tags as reported by the API.
    pub risk_factors: Option<Vec<RiskFactor>>,

    /// Negative rate in basis points as reported by the API.
    pub negative_rate_bps: Option<u32>,

    /// Trend label as reported by the API.
    pub recent_trend: Option<String>,

    /// Demo-endpoint marker.
    pub demo: Option<bool>,

    /// Free-form note from the API.
    pub note: Option<String>,
}

/// Produces the payment proof attached to paid API calls.
///
/// The client never manages wallets itself; a provider failure is simply
/// classified as `payment_unavailable` and the fallback chain continues.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Produce the `X-PAYMENT` header value for one request.
    async fn payment_header(&self, url: &str) -> Result<String>;
}

/// One resolvable trust-data source.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Attempt the source exactly once.
    async fn fetch(&self, kind: QueryKind, agent: &AgentId) -> Result<RawTrustData, SourceFailure>;
}

/// HTTP source: the paid API or the demo endpoint.
pub struct HttpSource {
    http: reqwest::Client,
    base_url: String,
    demo: bool,
    timeout: Duration,
    payment: Option<Arc<dyn PaymentProvider>>,
}

impl HttpSource {
    /// Paid API source; attaches a payment proof when a provider is present.
    pub fn paid(
        http: reqwest::Client,
        base_url: String,
        timeout: Duration,
        payment: Option<Arc<dyn PaymentProvider>>,
    ) -> Self {
        Self {
            http,
            base_url,
            demo: false,
            timeout,
            payment,
        }
    }

    /// Demo endpoint source.
    pub fn demo(http: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            demo: true,
            timeout,
            payment: None,
        }
    }

    fn url(&self, kind: QueryKind, agent: &AgentId) -> String {
        let suffix = if self.demo { "?demo=true" } else { "" };
        format!(
            "{}/{}/{}{}",
            self.base_url.trim_end_matches('/'),
            kind.path_segment(),
            agent.to_decimal(),
            suffix
        )
    }
}

/// Pull a `{"error": "..."}` detail out of a failure body, falling back to
/// the status line.
fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value.get("error").and_then(|e| e.as_str()) {
            return format!("HTTP {}: {}", status.as_u16(), detail);
        }
    }
    format!("HTTP {}", status.as_u16())
}

#[async_trait]
impl ReportSource for HttpSource {
    async fn fetch(&self, kind: QueryKind, agent: &AgentId) -> Result<RawTrustData, SourceFailure> {
        let url = self.url(kind, agent);
        let mut request = self.http.get(&url).timeout(self.timeout);

        if let Some(payment) = &self.payment {
            match payment.payment_header(&url).await {
                Ok(proof) => request = request.header(PAYMENT_HEADER, proof),
                Err(err) => {
                    return Err(SourceFailure::new(
                        FallbackCause::PaymentUnavailable,
                        format!("payment proof unavailable: {err:#}"),
                    ));
                }
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                return Err(SourceFailure::new(
                    classify_http_transport(&err),
                    err.to_string(),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceFailure::new(
                classify_http_status(status),
                error_detail(status, &body),
            ));
        }

        match response.json::<RawTrustData>().await {
            Ok(data) => Ok(data),
            Err(err) if err.is_timeout() => Err(SourceFailure::new(
                FallbackCause::ApiTimeout,
                err.to_string(),
            )),
            Err(err) => Err(SourceFailure::new(
                FallbackCause::OracleUnavailable,
                format!("malformed API response: {err}"),
            )),
        }
    }
}

/// Direct on-chain read of the TrustScore contract.
pub struct ContractSource {
    contract: TrustScore::TrustScoreInstance<Http<Client>, RootProvider<Http<Client>>>,
}

impl ContractSource {
    /// Create a read-only contract source.
    pub fn new(rpc_url: &str, contract_address: Address) -> Result<Self> {
        let url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;
        let provider = ProviderBuilder::new().on_http(url);
        Ok(Self {
            contract: TrustScore::new(contract_address, provider),
        })
    }
}

fn u256_field(value: alloy::primitives::U256, field: &str) -> Result<u64, SourceFailure> {
    u64::try_from(value).map_err(|_| {
        SourceFailure::new(
            FallbackCause::OracleUnavailable,
            format!("contract returned out-of-range {field}: {value}"),
        )
    })
}

#[async_trait]
impl ReportSource for ContractSource {
    async fn fetch(
        &self,
        _kind: QueryKind,
        agent: &AgentId,
    ) -> Result<RawTrustData, SourceFailure> {
        let report = self
            .contract
            .getDetailedReport(agent.value())
            .call()
            .await
            .map_err(|err| {
                let message = err.to_string();
                SourceFailure::new(classify_contract_error(&message), message)
            })?;

        let record = ScoreRecord {
            score: u256_field(report.score, "score")?,
            total_feedback: u256_field(report.totalFeedback, "totalFeedback")?,
            positive_feedback: u256_field(report.positiveFeedback, "positiveFeedback")?,
            last_updated: u256_field(report.lastUpdated, "lastUpdated")?,
            exists: report.exists,
        };

        // Most deployments revert for unknown agents; `exists` covers the
        // ones that return a zero record instead.
        if !record.exists {
            return Err(SourceFailure::new(
                FallbackCause::AgentNotFound,
                format!("agent {agent} has no score record"),
            ));
        }

        record.validate().map_err(|err| {
            SourceFailure::new(FallbackCause::OracleUnavailable, err.to_string())
        })?;

        Ok(RawTrustData::from(record))
    }
}

impl From<ScoreRecord> for RawTrustData {
    fn from(record: ScoreRecord) -> Self {
        RawTrustData {
            score: Some(record.score as f64),
            total_feedback: Some(record.total_feedback),
            positive_feedback: Some(record.positive_feedback),
            last_updated: Some(record.last_updated),
            ..RawTrustData::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(demo: bool) -> HttpSource {
        let client = reqwest::Client::new();
        if demo {
            HttpSource::demo(
                client,
                "https://oracle.example".to_string(),
                Duration::from_secs(8),
            )
        } else {
            HttpSource::paid(
                client,
                "https://oracle.example/".to_string(),
                Duration::from_secs(8),
                None,
            )
        }
    }

    #[test]
    fn paid_urls_have_no_demo_marker() {
        let agent = AgentId::parse("42").unwrap();
        assert_eq!(
            http(false).url(QueryKind::Score, &agent),
            "https://oracle.example/score/42"
        );
        assert_eq!(
            http(false).url(QueryKind::Report, &agent),
            "https://oracle.example/report/42"
        );
    }

    #[test]
    fn demo_urls_append_the_marker() {
        let agent = AgentId::parse("7").unwrap();
        assert_eq!(
            http(true).url(QueryKind::Report, &agent),
            "https://oracle.example/report/7?demo=true"
        );
    }

    #[test]
    fn error_detail_prefers_json_error_field() {
        let status = reqwest::StatusCode::INTERNAL_SERVER_ERROR;
        assert_eq!(
            error_detail(status, r#"{"error":"upstream exploded"}"#),
            "HTTP 500: upstream exploded"
        );
        assert_eq!(error_detail(status, "<html>oops</html>"), "HTTP 500");
        assert_eq!(error_detail(status, r#"{"detail":"other"}"#), "HTTP 500");
    }

    #[test]
    fn raw_data_deserializes_api_shapes() {
        let score: RawTrustData = serde_json::from_str(
            r#"{"agentId":"42","score":810,"confidence":0.92,"totalFeedback":64,"lastUpdated":1700000000}"#,
        )
        .unwrap();
        assert_eq!(score.score, Some(810.0));
        assert_eq!(score.confidence, Some(0.92));
        assert_eq!(score.total_feedback, Some(64));

        let report: RawTrustData = serde_json::from_str(
            r#"{"score":310,"confidenceBand":"low","positiveFeedback":3,"recentTrend":"declining",
                "flagged":true,"riskFactors":["low_feedback_volume","low_trust_score"],
                "negativeRateBps":7000,"demo":true,"note":"demo data"}"#,
        )
        .unwrap();
        assert_eq!(report.confidence_band.as_deref(), Some("low"));
        assert_eq!(
            report.risk_factors,
            Some(vec![
                RiskFactor::LowFeedbackVolume,
                RiskFactor::LowTrustScore
            ])
        );
        assert_eq!(report.demo, Some(true));
    }
}
