//! Trustline scoring engine.
//!
//! This crate implements the deterministic feedback-to-score rule:
//! - Recent feedback (inside the decay window) weighs more than older feedback
//! - The weighted positive ratio scales to `[0, max_score]`
//! - Enough history earns a confidence bonus
//! - A recent negative spike flags the agent and applies a penalty multiplier
//!
//! `score_feedback` is a pure function: no I/O, no hidden state, inputs are
//! never mutated. Identical inputs produce identical, byte-for-byte
//! serializable output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trustline_core::ScoringConfig;

/// Numeric timestamps below this are interpreted as seconds, at or above as
/// milliseconds.
const NUMERIC_MILLIS_CUTOFF: f64 = 1e12;

/// Flexible timestamp input accepted from external feedback payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    /// A concrete instant.
    Instant(DateTime<Utc>),
    /// Seconds when `< 10^12`, milliseconds otherwise.
    Numeric(f64),
    /// An RFC-3339 string.
    Text(String),
}

/// One feedback entry as the engine accepts it.
///
/// Sentiment is derived, in priority order, from the explicit `positive`
/// flag, the `sentiment` label, or the numeric `rating`. A missing or
/// unparsable timestamp or sentiment fails the whole scoring call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackEntry {
    /// When the feedback was given.
    pub timestamp: Option<TimeValue>,

    /// Explicit sentiment flag.
    pub positive: Option<bool>,

    /// Sentiment label, `"positive"` or `"negative"`, case-insensitive.
    pub sentiment: Option<String>,

    /// Numeric rating; strictly positive means positive.
    pub rating: Option<f64>,
}

impl FeedbackEntry {
    /// Build an entry from chain data: an unambiguous millisecond instant and
    /// an already-resolved sentiment. This is the indexer's path.
    pub fn from_chain(positive: bool, timestamp_ms: i64) -> Self {
        Self {
            timestamp: DateTime::from_timestamp_millis(timestamp_ms).map(TimeValue::Instant),
            positive: Some(positive),
            sentiment: None,
            rating: None,
        }
    }
}

/// Scoring failures. All variants are fatal input errors: the engine refuses
/// to guess at partially valid feedback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    /// The entry carried no timestamp.
    #[error("feedback entry {index} has no timestamp")]
    MissingTimestamp {
        /// Position of the offending entry.
        index: usize,
    },

    /// The entry's timestamp could not be interpreted.
    #[error("feedback entry {index} has an unparsable timestamp: {detail}")]
    UnparsableTimestamp {
        /// Position of the offending entry.
        index: usize,
        /// What was wrong with it.
        detail: String,
    },

    /// The entry carried no sentiment in any accepted form.
    #[error("feedback entry {index} has no sentiment")]
    MissingSentiment {
        /// Position of the offending entry.
        index: usize,
    },

    /// The entry's sentiment label was not recognized.
    #[error("feedback entry {index} has an unrecognized sentiment label: {label:?}")]
    UnrecognizedSentiment {
        /// Position of the offending entry.
        index: usize,
        /// The rejected label.
        label: String,
    },
}

/// The engine's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
    /// Final score after the confidence bonus and flagging penalty.
    pub score: u32,

    /// Weighted positive ratio scaled to the score range, before adjustments.
    pub base_score: u32,

    /// Base score after the confidence bonus, before the flagging penalty.
    pub confidence_adjusted_score: u32,

    /// Whether a recent negative spike flagged the agent.
    pub flagged: bool,

    /// Unweighted count of all feedback entries.
    pub total_feedback: u32,

    /// Unweighted count of positive entries.
    pub positive_feedback: u32,

    /// Negative rate inside the recent-negative window, in basis points.
    pub recent_negative_rate_bps: u32,

    /// Entries inside the recent-negative window.
    pub recent_feedback_count: u32,

    /// Whether the confidence bonus applied.
    pub confidence_applied: bool,
}

/// Compute a trust score from a set of feedback entries.
///
/// `now_ms` anchors the decay and recent-negative windows; passing it in
/// keeps the function pure and the output reproducible.
pub fn score_feedback(
    entries: &[FeedbackEntry],
    config: &ScoringConfig,
    now_ms: i64,
) -> Result<ScoringResult, ScoringError> {
    let cutoff_recent = now_ms - config.decay_window_ms();
    let cutoff_negative = now_ms - config.recent_negative_window_ms();

    let mut weighted_total: u64 = 0;
    let mut weighted_positive: u64 = 0;
    let mut total_feedback: u32 = 0;
    let mut positive_feedback: u32 = 0;
    let mut recent_feedback_count: u32 = 0;
    let mut recent_negative_count: u32 = 0;

    for (index, entry) in entries.iter().enumerate() {
        let timestamp_ms = resolve_timestamp_ms(entry, index)?;
        let positive = resolve_positive(entry, index)?;

        let weight = if timestamp_ms >= cutoff_recent {
            u64::from(config.recent_feedback_weight)
        } else {
            u64::from(config.older_feedback_weight)
        };

        weighted_total += weight;
        if positive {
            weighted_positive += weight;
            positive_feedback += 1;
        }
        total_feedback += 1;

        if timestamp_ms >= cutoff_negative {
            recent_feedback_count += 1;
            if !positive {
                recent_negative_count += 1;
            }
        }
    }

    if weighted_total == 0 {
        return Ok(ScoringResult::default());
    }

    let max_score = f64::from(config.max_score);
    let base_raw = weighted_positive as f64 / weighted_total as f64 * max_score;

    let confidence_applied = total_feedback >= config.confidence_threshold_feedback_count;
    let confidence_adjusted_raw = if confidence_applied {
        base_raw * config.confidence_multiplier
    } else {
        base_raw
    };

    let recent_negative_rate_bps = if recent_feedback_count == 0 {
        0
    } else {
        (f64::from(recent_negative_count) / f64::from(recent_feedback_count) * 10_000.0).round()
            as u32
    };

    let flagged =
        recent_feedback_count > 0 && recent_negative_rate_bps > config.negative_flag_threshold_bps;
    let penalized_raw = if flagged {
        confidence_adjusted_raw * config.flagged_score_multiplier
    } else {
        confidence_adjusted_raw
    };

    Ok(ScoringResult {
        score: clamp_to_score(penalized_raw, max_score),
        base_score: clamp_to_score(base_raw, max_score),
        confidence_adjusted_score: clamp_to_score(confidence_adjusted_raw, max_score),
        flagged,
        total_feedback,
        positive_feedback,
        recent_negative_rate_bps,
        recent_feedback_count,
        confidence_applied,
    })
}

fn clamp_to_score(raw: f64, max_score: f64) -> u32 {
    raw.clamp(0.0, max_score).round() as u32
}

fn resolve_timestamp_ms(entry: &FeedbackEntry, index: usize) -> Result<i64, ScoringError> {
    let value = entry
        .timestamp
        .as_ref()
        .ok_or(ScoringError::MissingTimestamp { index })?;

    match value {
        TimeValue::Instant(instant) => Ok(instant.timestamp_millis()),
        TimeValue::Numeric(n) => {
            if !n.is_finite() {
                return Err(ScoringError::UnparsableTimestamp {
                    index,
                    detail: format!("non-finite numeric timestamp {n}"),
                });
            }
            if n.abs() < NUMERIC_MILLIS_CUTOFF {
                Ok((n * 1000.0).round() as i64)
            } else {
                Ok(n.round() as i64)
            }
        }
        TimeValue::Text(text) => DateTime::parse_from_rfc3339(text)
            .map(|parsed| parsed.timestamp_millis())
            .map_err(|err| ScoringError::UnparsableTimestamp {
                index,
                detail: format!("{text:?}: {err}"),
            }),
    }
}

fn resolve_positive(entry: &FeedbackEntry, index: usize) -> Result<bool, ScoringError> {
    if let Some(flag) = entry.positive {
        return Ok(flag);
    }

    if let Some(label) = &entry.sentiment {
        return match label.to_ascii_lowercase().as_str() {
            "positive" => Ok(true),
            "negative" => Ok(false),
            _ => Err(ScoringError::UnrecognizedSentiment {
                index,
                label: label.clone(),
            }),
        };
    }

    if let Some(rating) = entry.rating {
        if rating.is_finite() {
            return Ok(rating > 0.0);
        }
    }

    Err(ScoringError::MissingSentiment { index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustline_core::config::MILLIS_PER_DAY;

    const NOW_MS: i64 = 1_754_000_000_000;

    fn entry_aged_days(positive: bool, age_days: f64) -> FeedbackEntry {
        FeedbackEntry::from_chain(positive, NOW_MS - (age_days * MILLIS_PER_DAY as f64) as i64)
    }

    #[test]
    fn empty_feedback_yields_zero_result() {
        let result = score_feedback(&[], &ScoringConfig::default(), NOW_MS).unwrap();
        assert_eq!(result, ScoringResult::default());
        assert_eq!(result.score, 0);
        assert!(!result.flagged);
        assert_eq!(result.total_feedback, 0);
        assert_eq!(result.recent_negative_rate_bps, 0);
        assert!(!result.confidence_applied);
    }

    #[test]
    fn weighted_ratio_uses_decay_window() {
        let config = ScoringConfig {
            decay_window_days: 30,
            recent_feedback_weight: 2,
            older_feedback_weight: 1,
            confidence_threshold_feedback_count: 100,
            flagged_score_multiplier: 1.0,
            negative_flag_threshold_bps: 10_000,
            ..ScoringConfig::default()
        };
        let entries = [entry_aged_days(true, 40.0), entry_aged_days(false, 2.0)];

        let result = score_feedback(&entries, &config, NOW_MS).unwrap();
        // Weighted positives 1 over weighted total 3.
        assert_eq!(result.score, 333);
        assert_eq!(result.base_score, 333);
        assert!(!result.flagged);
        assert_eq!(result.total_feedback, 2);
        assert_eq!(result.positive_feedback, 1);
    }

    #[test]
    fn confidence_bonus_applies_at_threshold() {
        let config = ScoringConfig {
            confidence_threshold_feedback_count: 50,
            confidence_multiplier: 1.1,
            recent_feedback_weight: 1,
            older_feedback_weight: 1,
            flagged_score_multiplier: 1.0,
            negative_flag_threshold_bps: 10_000,
            ..ScoringConfig::default()
        };
        let mut entries = Vec::new();
        for _ in 0..30 {
            entries.push(entry_aged_days(true, 10.0));
        }
        for _ in 0..20 {
            entries.push(entry_aged_days(false, 10.0));
        }

        let result = score_feedback(&entries, &config, NOW_MS).unwrap();
        assert_eq!(result.base_score, 600);
        assert!(result.confidence_applied);
        assert_eq!(result.confidence_adjusted_score, 660);
        assert_eq!(result.score, 660);
        // 10-day-old entries sit outside the 7-day negative window.
        assert_eq!(result.recent_feedback_count, 0);
        assert!(!result.flagged);
    }

    #[test]
    fn recent_negative_spike_flags_and_penalizes() {
        let config = ScoringConfig {
            recent_negative_window_days: 7,
            negative_flag_threshold_bps: 2000,
            flagged_score_multiplier: 0.8,
            confidence_threshold_feedback_count: 999,
            recent_feedback_weight: 2,
            older_feedback_weight: 1,
            ..ScoringConfig::default()
        };
        let mut entries = Vec::new();
        for _ in 0..5 {
            entries.push(entry_aged_days(true, 1.0));
        }
        for _ in 0..2 {
            entries.push(entry_aged_days(false, 1.0));
        }

        let result = score_feedback(&entries, &config, NOW_MS).unwrap();
        assert_eq!(result.base_score, 714);
        assert_eq!(result.recent_negative_rate_bps, 2857);
        assert!(result.flagged);
        assert_eq!(result.score, 571);
        assert!(!result.confidence_applied);
    }

    #[test]
    fn flagging_threshold_is_strict() {
        // Exactly at the threshold: 1 negative out of 1 recent = 10000 bps.
        let config = ScoringConfig {
            negative_flag_threshold_bps: 10_000,
            ..ScoringConfig::default()
        };
        let entries = [entry_aged_days(false, 1.0)];
        let result = score_feedback(&entries, &config, NOW_MS).unwrap();
        assert_eq!(result.recent_negative_rate_bps, 10_000);
        assert!(!result.flagged);
    }

    #[test]
    fn numeric_seconds_and_millis_agree() {
        let config = ScoringConfig::default();
        let seconds = FeedbackEntry {
            timestamp: Some(TimeValue::Numeric((NOW_MS / 1000) as f64)),
            positive: Some(true),
            ..FeedbackEntry::default()
        };
        let millis = FeedbackEntry {
            timestamp: Some(TimeValue::Numeric(NOW_MS as f64)),
            positive: Some(true),
            ..FeedbackEntry::default()
        };
        let a = score_feedback(&[seconds], &config, NOW_MS).unwrap();
        let b = score_feedback(&[millis], &config, NOW_MS).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.score, config.max_score);
    }

    #[test]
    fn rfc3339_timestamps_parse() {
        let entry = FeedbackEntry {
            timestamp: Some(TimeValue::Text("2026-07-30T12:00:00Z".to_string())),
            sentiment: Some("Positive".to_string()),
            ..FeedbackEntry::default()
        };
        let result = score_feedback(&[entry], &ScoringConfig::default(), NOW_MS).unwrap();
        assert_eq!(result.positive_feedback, 1);
    }

    #[test]
    fn sentiment_priority_flag_over_label_over_rating() {
        let entry = FeedbackEntry {
            timestamp: Some(TimeValue::Numeric(NOW_MS as f64)),
            positive: Some(false),
            sentiment: Some("positive".to_string()),
            rating: Some(5.0),
        };
        let result = score_feedback(&[entry], &ScoringConfig::default(), NOW_MS).unwrap();
        assert_eq!(result.positive_feedback, 0);

        let entry = FeedbackEntry {
            timestamp: Some(TimeValue::Numeric(NOW_MS as f64)),
            positive: None,
            sentiment: Some("negative".to_string()),
            rating: Some(5.0),
        };
        let result = score_feedback(&[entry], &ScoringConfig::default(), NOW_MS).unwrap();
        assert_eq!(result.positive_feedback, 0);

        let entry = FeedbackEntry {
            timestamp: Some(TimeValue::Numeric(NOW_MS as f64)),
            positive: None,
            sentiment: None,
            rating: Some(0.5),
        };
        let result = score_feedback(&[entry], &ScoringConfig::default(), NOW_MS).unwrap();
        assert_eq!(result.positive_feedback, 1);
    }

    #[test]
    fn zero_rating_counts_negative() {
        let entry = FeedbackEntry {
            timestamp: Some(TimeValue::Numeric(NOW_MS as f64)),
            rating: Some(0.0),
            ..FeedbackEntry::default()
        };
        let result = score_feedback(&[entry], &ScoringConfig::default(), NOW_MS).unwrap();
        assert_eq!(result.positive_feedback, 0);
        assert_eq!(result.total_feedback, 1);
    }

    #[test]
    fn missing_timestamp_is_fatal() {
        let entry = FeedbackEntry {
            positive: Some(true),
            ..FeedbackEntry::default()
        };
        assert_eq!(
            score_feedback(&[entry], &ScoringConfig::default(), NOW_MS),
            Err(ScoringError::MissingTimestamp { index: 0 })
        );
    }

    #[test]
    fn missing_sentiment_is_fatal() {
        let entry = FeedbackEntry {
            timestamp: Some(TimeValue::Numeric(NOW_MS as f64)),
            ..FeedbackEntry::default()
        };
        assert_eq!(
            score_feedback(&[entry], &ScoringConfig::default(), NOW_MS),
            Err(ScoringError::MissingSentiment { index: 0 })
        );
    }

    #[test]
    fn unrecognized_label_is_fatal() {
        let entry = FeedbackEntry {
            timestamp: Some(TimeValue::Numeric(NOW_MS as f64)),
            sentiment: Some("meh".to_string()),
            ..FeedbackEntry::default()
        };
        assert_eq!(
            score_feedback(&[entry], &ScoringConfig::default(), NOW_MS),
            Err(ScoringError::UnrecognizedSentiment {
                index: 0,
                label: "meh".to_string()
            })
        );
    }

    #[test]
    fn bad_timestamp_reports_offending_index() {
        let entries = [
            entry_aged_days(true, 1.0),
            FeedbackEntry {
                timestamp: Some(TimeValue::Text("yesterday".to_string())),
                positive: Some(true),
                ..FeedbackEntry::default()
            },
        ];
        match score_feedback(&entries, &ScoringConfig::default(), NOW_MS) {
            Err(ScoringError::UnparsableTimestamp { index: 1, .. }) => {}
            other => panic!("expected unparsable timestamp at index 1, got {other:?}"),
        }
    }

    #[test]
    fn output_is_deterministic_when_serialized() {
        let entries = [
            entry_aged_days(true, 3.0),
            entry_aged_days(false, 12.0),
            entry_aged_days(true, 45.0),
        ];
        let config = ScoringConfig::default();
        let a = score_feedback(&entries, &config, NOW_MS).unwrap();
        let b = score_feedback(&entries, &config, NOW_MS).unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn score_never_exceeds_max_even_with_bonus() {
        let config = ScoringConfig {
            confidence_threshold_feedback_count: 1,
            confidence_multiplier: 1.5,
            ..ScoringConfig::default()
        };
        let entries = [entry_aged_days(true, 1.0)];
        let result = score_feedback(&entries, &config, NOW_MS).unwrap();
        assert_eq!(result.score, config.max_score);
        assert_eq!(result.confidence_adjusted_score, config.max_score);
    }
}
