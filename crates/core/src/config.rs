//! Scoring configuration.
//!
//! Every knob of the scoring algorithm, externally configurable with the
//! documented defaults. The same struct is embedded in the indexer's TOML
//! configuration and used directly by library callers of the engine.

use serde::{Deserialize, Serialize};

/// Configuration for the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Age boundary, in days, between "recent" and "older" feedback.
    pub decay_window_days: u32,

    /// Multiplicative weight applied to recent feedback.
    pub recent_feedback_weight: u32,

    /// Multiplicative weight applied to older feedback.
    pub older_feedback_weight: u32,

    /// Minimum number of feedback events before the confidence bonus applies.
    pub confidence_threshold_feedback_count: u32,

    /// Multiplier applied to the base score once the confidence threshold is met.
    pub confidence_multiplier: f64,

    /// Window, in days, used to detect recent negative spikes.
    pub recent_negative_window_days: u32,

    /// Flagging threshold in basis points (strictly above flags the agent).
    pub negative_flag_threshold_bps: u32,

    /// Penalty multiplier applied to the score when flagged.
    pub flagged_score_multiplier: f64,

    /// Upper bound of the score range.
    pub max_score: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            decay_window_days: 30,
            recent_feedback_weight: 2,
            older_feedback_weight: 1,
            confidence_threshold_feedback_count: 50,
            confidence_multiplier: 1.05,
            recent_negative_window_days: 7,
            negative_flag_threshold_bps: 2000,
            flagged_score_multiplier: 0.9,
            max_score: 1000,
        }
    }
}

impl ScoringConfig {
    /// Milliseconds in the decay window.
    pub fn decay_window_ms(&self) -> i64 {
        i64::from(self.decay_window_days) * MILLIS_PER_DAY
    }

    /// Milliseconds in the recent-negative window.
    pub fn recent_negative_window_ms(&self) -> i64 {
        i64::from(self.recent_negative_window_days) * MILLIS_PER_DAY
    }
}

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;
