//! The structured response envelope and its enumerations.
//!
//! These are leaf types: both the trust client and the fallback classifier
//! consume them, neither owns them. The string forms below are public wire
//! contract and must not change.

use serde::{Deserialize, Serialize};

/// Overall outcome of a trust query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// The preferred source answered.
    Ok,
    /// A non-preferred source answered, or every source failed transiently.
    Degraded,
    /// The failure is authoritative (bad input, or the agent does not exist).
    Error,
}

impl QueryStatus {
    /// Canonical lowercase string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Ok => "ok",
            QueryStatus::Degraded => "degraded",
            QueryStatus::Error => "error",
        }
    }
}

/// Categorical trust label derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Score above 700.
    Trusted,
    /// Score within `[400, 700]`.
    Caution,
    /// Score below 400.
    Dangerous,
    /// No score, or no usable history.
    Unknown,
}

impl Verdict {
    /// Canonical uppercase string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Verdict::Trusted => "TRUSTED",
            Verdict::Caution => "CAUTION",
            Verdict::Dangerous => "DANGEROUS",
            Verdict::Unknown => "UNKNOWN",
        }
    }

    /// Action tier for this verdict.
    pub const fn recommendation(&self) -> Recommendation {
        match self {
            Verdict::Trusted => Recommendation::Proceed,
            Verdict::Caution | Verdict::Unknown => Recommendation::ManualReview,
            Verdict::Dangerous => Recommendation::Abort,
        }
    }
}

/// Action tier derived from the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Safe to transact.
    Proceed,
    /// A human should look first.
    ManualReview,
    /// Do not transact.
    Abort,
}

impl Recommendation {
    /// Canonical string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Proceed => "proceed",
            Recommendation::ManualReview => "manual_review",
            Recommendation::Abort => "abort",
        }
    }
}

/// Which source produced (or last attempted to produce) the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The paid HTTP API.
    ApiPaid,
    /// The free demo HTTP endpoint.
    ApiDemo,
    /// Direct on-chain read of the `TrustScore` contract.
    TrustscoreContract,
}

impl SourceKind {
    /// Canonical string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ApiPaid => "api_paid",
            SourceKind::ApiDemo => "api_demo",
            SourceKind::TrustscoreContract => "trustscore_contract",
        }
    }
}

/// Stable, machine-readable cause for an unsuccessful source attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCause {
    /// 5xx or any unclassified upstream failure.
    OracleUnavailable,
    /// The HTTP attempt hit its abort timer.
    ApiTimeout,
    /// The paid route answered 402, or no payment proof could be produced.
    PaymentUnavailable,
    /// The RPC endpoint was unreachable.
    RpcUnavailable,
    /// 404, or the contract reverted for a nonexistent agent.
    AgentNotFound,
    /// Local validation rejected the agent identifier.
    InvalidAgentId,
}

impl FallbackCause {
    /// Canonical string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FallbackCause::OracleUnavailable => "oracle_unavailable",
            FallbackCause::ApiTimeout => "api_timeout",
            FallbackCause::PaymentUnavailable => "payment_unavailable",
            FallbackCause::RpcUnavailable => "rpc_unavailable",
            FallbackCause::AgentNotFound => "agent_not_found",
            FallbackCause::InvalidAgentId => "invalid_agent_id",
        }
    }
}

/// Risk-factor tags attached to contract-sourced reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    /// Fewer feedback events than the confidence threshold.
    LowFeedbackVolume,
    /// The negative-feedback ratio crossed the flagging threshold.
    HighNegativeFeedbackRatio,
    /// Score below 500.
    LowTrustScore,
}

impl RiskFactor {
    /// Canonical string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RiskFactor::LowFeedbackVolume => "low_feedback_volume",
            RiskFactor::HighNegativeFeedbackRatio => "high_negative_feedback_ratio",
            RiskFactor::LowTrustScore => "low_trust_score",
        }
    }
}

/// Source-specific extras carried in the envelope's `data` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvelopeData {
    /// Total feedback events, when the source reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_feedback: Option<u64>,

    /// Positive feedback events, when the source reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positive_feedback: Option<u64>,

    /// Seconds since epoch of the last score write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<u64>,

    /// Whether the record is currently flagged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,

    /// Risk-factor tags in insertion order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_factors: Option<Vec<RiskFactor>>,

    /// Negative-feedback rate in basis points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_rate_bps: Option<u32>,

    /// Trend label reported by the HTTP API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_trend: Option<String>,

    /// Set when the data came from the demo endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo: Option<bool>,

    /// Free-form note from the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The trust client's structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustEnvelope {
    /// Overall query outcome.
    pub status: QueryStatus,

    /// Canonical decimal agent ID, or `None` when the input never validated.
    pub agent_id: Option<String>,

    /// Normalized score, or `None` when no source produced one.
    pub score: Option<f64>,

    /// Confidence in `[0, 1]` at four decimal places.
    pub confidence: Option<f64>,

    /// Categorical trust label.
    pub verdict: Verdict,

    /// Action tier.
    pub recommendation: Recommendation,

    /// The source that produced the data, or the last one attempted.
    pub source: SourceKind,

    /// Cause classification when the query did not go through cleanly.
    pub fallback: Option<FallbackCause>,

    /// Human-readable failure detail.
    pub error: Option<String>,

    /// Wall-clock duration of the query in milliseconds.
    pub timing_ms: u64,

    /// RFC-3339 timestamp of envelope creation.
    pub timestamp: String,

    /// UUIDv4 correlation identifier.
    pub correlation_id: String,

    /// Source-specific extras.
    pub data: EnvelopeData,
}

impl TrustEnvelope {
    /// The envelope invariant: `ok` carries no fallback, everything else does.
    pub fn is_consistent(&self) -> bool {
        let fallback_matches = match self.status {
            QueryStatus::Ok => self.fallback.is_none(),
            QueryStatus::Degraded | QueryStatus::Error => self.fallback.is_some(),
        };
        fallback_matches && self.recommendation == self.verdict.recommendation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_stable() {
        assert_eq!(
            serde_json::to_string(&QueryStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&Verdict::Trusted).unwrap(),
            "\"TRUSTED\""
        );
        assert_eq!(
            serde_json::to_string(&Recommendation::ManualReview).unwrap(),
            "\"manual_review\""
        );
        assert_eq!(
            serde_json::to_string(&SourceKind::TrustscoreContract).unwrap(),
            "\"trustscore_contract\""
        );
        assert_eq!(
            serde_json::to_string(&FallbackCause::PaymentUnavailable).unwrap(),
            "\"payment_unavailable\""
        );
        assert_eq!(
            serde_json::to_string(&RiskFactor::HighNegativeFeedbackRatio).unwrap(),
            "\"high_negative_feedback_ratio\""
        );
    }

    #[test]
    fn as_str_matches_serde() {
        assert_eq!(QueryStatus::Ok.as_str(), "ok");
        assert_eq!(Verdict::Dangerous.as_str(), "DANGEROUS");
        assert_eq!(Recommendation::Abort.as_str(), "abort");
        assert_eq!(SourceKind::ApiPaid.as_str(), "api_paid");
        assert_eq!(FallbackCause::InvalidAgentId.as_str(), "invalid_agent_id");
        assert_eq!(RiskFactor::LowTrustScore.as_str(), "low_trust_score");
    }

    #[test]
    fn recommendation_table() {
        assert_eq!(Verdict::Trusted.recommendation(), Recommendation::Proceed);
        assert_eq!(
            Verdict::Caution.recommendation(),
            Recommendation::ManualReview
        );
        assert_eq!(
            Verdict::Unknown.recommendation(),
            Recommendation::ManualReview
        );
        assert_eq!(Verdict::Dangerous.recommendation(), Recommendation::Abort);
    }

    #[test]
    fn envelope_serializes_camel_case() {
        let envelope = TrustEnvelope {
            status: QueryStatus::Ok,
            agent_id: Some("7".to_string()),
            score: Some(810.0),
            confidence: Some(1.0),
            verdict: Verdict::Trusted,
            recommendation: Recommendation::Proceed,
            source: SourceKind::ApiPaid,
            fallback: None,
            error: None,
            timing_ms: 12,
            timestamp: "2026-08-02T00:00:00+00:00".to_string(),
            correlation_id: "3e2e9d3e-1f33-4a88-9b51-1a2b3c4d5e6f".to_string(),
            data: EnvelopeData::default(),
        };
        assert!(envelope.is_consistent());

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["agentId"], "7");
        assert_eq!(json["timingMs"], 12);
        assert_eq!(json["correlationId"], envelope.correlation_id);
        assert!(json["fallback"].is_null());
    }

    #[test]
    fn consistency_rejects_ok_with_fallback() {
        let envelope = TrustEnvelope {
            status: QueryStatus::Ok,
            agent_id: None,
            score: None,
            confidence: None,
            verdict: Verdict::Unknown,
            recommendation: Recommendation::ManualReview,
            source: SourceKind::ApiDemo,
            fallback: Some(FallbackCause::ApiTimeout),
            error: None,
            timing_ms: 0,
            timestamp: String::new(),
            correlation_id: String::new(),
            data: EnvelopeData::default(),
        };
        assert!(!envelope.is_consistent());
    }
}
