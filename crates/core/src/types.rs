//! Shared data records.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The authoritative on-chain score record for one agent, as returned by
/// `TrustScore.getDetailedReport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Cached trust score in `[0, max_score]`.
    pub score: u64,

    /// Total feedback events folded into the score.
    pub total_feedback: u64,

    /// Positive feedback events folded into the score.
    pub positive_feedback: u64,

    /// Seconds since epoch of the last on-chain write.
    pub last_updated: u64,

    /// Whether the record has ever been written.
    pub exists: bool,
}

impl ScoreRecord {
    /// Validate the `positive <= total` invariant.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.positive_feedback > self.total_feedback {
            return Err(CoreError::InconsistentFeedbackCounters {
                total: self.total_feedback,
                positive: self.positive_feedback,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_consistent_counters() {
        let record = ScoreRecord {
            score: 800,
            total_feedback: 80,
            positive_feedback: 70,
            last_updated: 1_700_000_000,
            exists: true,
        };
        assert!(record.validate().is_ok());
    }

    #[test]
    fn validate_rejects_positive_above_total() {
        let record = ScoreRecord {
            score: 800,
            total_feedback: 10,
            positive_feedback: 11,
            last_updated: 0,
            exists: true,
        };
        assert_eq!(
            record.validate(),
            Err(CoreError::InconsistentFeedbackCounters {
                total: 10,
                positive: 11
            })
        );
    }
}
