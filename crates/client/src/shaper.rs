//! Response shaping: raw source data into the structured envelope.
//!
//! The shaper owns every derivation rule - score normalization, confidence
//! resolution, the verdict table, the no-history mask, and the analytics
//! re-derived for contract-sourced reports.

use chrono::Utc;

use trustline_core::{
    AgentId, EnvelopeData, FallbackCause, QueryStatus, RiskFactor, SourceKind, TrustEnvelope,
    Verdict,
};

use crate::config::ClientConfig;
use crate::sources::{RawTrustData, SourceFailure};

/// Shape a successful source attempt into an envelope. When `degraded_from`
/// names a prior failure, the envelope is marked degraded and carries that
/// failure's classification.
pub(crate) fn shape_success(
    agent: &AgentId,
    raw: &RawTrustData,
    source: SourceKind,
    degraded_from: Option<&SourceFailure>,
    timing_ms: u64,
    correlation_id: String,
    config: &ClientConfig,
) -> TrustEnvelope {
    let score = normalize_score(raw.score);
    let confidence = resolve_confidence(raw, config);

    let data = if source == SourceKind::TrustscoreContract {
        derive_contract_data(score, raw, config)
    } else {
        EnvelopeData {
            total_feedback: raw.total_feedback,
            positive_feedback: raw.positive_feedback,
            last_updated: raw.last_updated,
            flagged: raw.flagged,
            risk_factors: raw.risk_factors.clone(),
            negative_rate_bps: raw.negative_rate_bps,
            recent_trend: raw.recent_trend.clone(),
            demo: raw.demo,
            note: raw.note.clone(),
        }
    };

    let no_history = score == Some(0.0)
        && (zero_counters(raw)
            || (config.zero_confidence_masks_history && confidence == Some(0.0)));
    let verdict = verdict_for(score, no_history);

    let (status, fallback, error) = match degraded_from {
        Some(failure) => (
            QueryStatus::Degraded,
            Some(failure.cause),
            Some(failure.message.clone()),
        ),
        None => (QueryStatus::Ok, None, None),
    };

    TrustEnvelope {
        status,
        agent_id: Some(agent.to_decimal()),
        score,
        confidence,
        verdict,
        recommendation: verdict.recommendation(),
        source,
        fallback,
        error,
        timing_ms,
        timestamp: Utc::now().to_rfc3339(),
        correlation_id,
        data,
    }
}

/// Shape a terminal failure into an envelope.
pub(crate) fn shape_failure(
    agent_id: Option<String>,
    status: QueryStatus,
    cause: FallbackCause,
    message: String,
    source: SourceKind,
    timing_ms: u64,
    correlation_id: String,
) -> TrustEnvelope {
    let verdict = Verdict::Unknown;
    TrustEnvelope {
        status,
        agent_id,
        score: None,
        confidence: None,
        verdict,
        recommendation: verdict.recommendation(),
        source,
        fallback: Some(cause),
        error: Some(message),
        timing_ms,
        timestamp: Utc::now().to_rfc3339(),
        correlation_id,
        data: EnvelopeData::default(),
    }
}

fn normalize_score(raw: Option<f64>) -> Option<f64> {
    raw.filter(|score| score.is_finite() && *score >= 0.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Confidence resolution: explicit value, then the feedback-count derivation,
/// then the discrete band, otherwise null.
fn resolve_confidence(raw: &RawTrustData, config: &ClientConfig) -> Option<f64> {
    if let Some(explicit) = raw.confidence {
        if explicit.is_finite() {
            return Some(round4(explicit.clamp(0.0, 1.0)));
        }
    }

    if let Some(total) = raw.total_feedback {
        let threshold = f64::from(config.confidence_threshold_feedback_count.max(1));
        return Some(round4((total as f64 / threshold).clamp(0.0, 1.0)));
    }

    if let Some(band) = &raw.confidence_band {
        return match band.to_ascii_lowercase().as_str() {
            "high" => Some(1.0),
            "low" => Some(0.4),
            "none" => Some(0.0),
            _ => None,
        };
    }

    None
}

fn zero_counters(raw: &RawTrustData) -> bool {
    raw.total_feedback == Some(0) && raw.positive_feedback == Some(0)
}

fn verdict_for(score: Option<f64>, no_history: bool) -> Verdict {
    let Some(score) = score else {
        return Verdict::Unknown;
    };
    if no_history {
        return Verdict::Unknown;
    }
    if score > 700.0 {
        Verdict::Trusted
    } else if score >= 400.0 {
        Verdict::Caution
    } else {
        Verdict::Dangerous
    }
}

/// Analytics for contract-sourced reports are not stored on-chain; re-derive
/// them from the counters.
fn derive_contract_data(
    score: Option<f64>,
    raw: &RawTrustData,
    config: &ClientConfig,
) -> EnvelopeData {
    let total = raw.total_feedback.unwrap_or(0);
    let positive = raw.positive_feedback.unwrap_or(0);
    let negative = total.saturating_sub(positive);

    let negative_rate_bps = if total == 0 {
        0
    } else {
        (negative as f64 / total as f64 * 10_000.0).round() as u32
    };
    let flagged = total > 0 && negative_rate_bps > config.negative_flag_threshold_bps;

    let mut risk_factors = Vec::new();
    if total < u64::from(config.confidence_threshold_feedback_count) {
        risk_factors.push(RiskFactor::LowFeedbackVolume);
    }
    if flagged {
        risk_factors.push(RiskFactor::HighNegativeFeedbackRatio);
    }
    if let Some(score) = score {
        if score < 500.0 {
            risk_factors.push(RiskFactor::LowTrustScore);
        }
    }

    EnvelopeData {
        total_feedback: Some(total),
        positive_feedback: Some(positive),
        last_updated: raw.last_updated,
        flagged: Some(flagged),
        risk_factors: Some(risk_factors),
        negative_rate_bps: Some(negative_rate_bps),
        recent_trend: None,
        demo: None,
        note: None,
    }
}
