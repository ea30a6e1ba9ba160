//! Client configuration.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Which source chain a query starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Paid API first, then the configured fallbacks.
    ApiPaid,
    /// Demo endpoint first, optionally falling back on-chain.
    ApiDemo,
    /// Direct on-chain read only.
    TrustscoreContract,
}

/// x402 payment limits for the paid fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct X402Config {
    /// Largest payment, in atomic units, the client will authorize per call.
    pub max_payment_atomic: u64,
}

impl Default for X402Config {
    fn default() -> Self {
        Self {
            max_payment_atomic: 20_000,
        }
    }
}

/// Runtime configuration for the trust client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the oracle HTTP API.
    pub base_url: String,

    /// Source chain used when a query does not name a mode.
    pub default_mode: QueryMode,

    /// Whether paid-mode queries may fall back to the demo endpoint.
    pub allow_demo_fallback: bool,

    /// Whether API-mode queries may fall back to the on-chain read.
    pub allow_onchain_fallback: bool,

    /// Per-attempt HTTP timeout in milliseconds.
    pub timeout_ms: u64,

    /// RPC URL for the on-chain fallback.
    pub rpc_url: String,

    /// TrustScore contract address; the on-chain fallback needs it.
    pub trust_score_address: Option<Address>,

    /// Feedback count at which confidence saturates.
    pub confidence_threshold_feedback_count: u32,

    /// Flagging threshold, in basis points, for re-derived analytics.
    pub negative_flag_threshold_bps: u32,

    /// Whether an explicit confidence of zero masks a zero score as
    /// "no history". On by default; disable to let an all-negative,
    /// high-history agent surface as DANGEROUS instead of UNKNOWN.
    pub zero_confidence_masks_history: bool,

    /// Payment limits for the paid fetcher.
    pub x402: X402Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://robomoustach.io".to_string(),
            default_mode: QueryMode::ApiPaid,
            allow_demo_fallback: true,
            allow_onchain_fallback: true,
            timeout_ms: 8000,
            rpc_url: "https://mainnet.base.org".to_string(),
            trust_score_address: None,
            confidence_threshold_feedback_count: 50,
            negative_flag_threshold_bps: 2000,
            zero_confidence_masks_history: true,
            x402: X402Config::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://robomoustach.io");
        assert_eq!(config.default_mode, QueryMode::ApiPaid);
        assert!(config.allow_demo_fallback);
        assert!(config.allow_onchain_fallback);
        assert_eq!(config.timeout_ms, 8000);
        assert_eq!(config.rpc_url, "https://mainnet.base.org");
        assert_eq!(config.trust_score_address, None);
        assert_eq!(config.confidence_threshold_feedback_count, 50);
        assert_eq!(config.negative_flag_threshold_bps, 2000);
        assert!(config.zero_confidence_masks_history);
        assert_eq!(config.x402.max_payment_atomic, 20_000);
    }

    #[test]
    fn mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&QueryMode::ApiPaid).unwrap(),
            "\"api_paid\""
        );
        assert_eq!(
            serde_json::to_string(&QueryMode::TrustscoreContract).unwrap(),
            "\"trustscore_contract\""
        );
    }
}
