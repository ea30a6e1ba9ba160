//! Failure classification into the stable fallback taxonomy.
//!
//! Every unsuccessful source attempt maps to exactly one
//! [`FallbackCause`]; callers never see transport- or contract-level errors.

use reqwest::StatusCode;
use trustline_core::FallbackCause;

/// Classify an HTTP response status that was not a success.
pub fn classify_http_status(status: StatusCode) -> FallbackCause {
    match status {
        StatusCode::NOT_FOUND => FallbackCause::AgentNotFound,
        StatusCode::PAYMENT_REQUIRED => FallbackCause::PaymentUnavailable,
        status if status.is_server_error() => FallbackCause::OracleUnavailable,
        _ => FallbackCause::OracleUnavailable,
    }
}

/// Classify an HTTP transport failure (the request never produced a status).
pub fn classify_http_transport(err: &reqwest::Error) -> FallbackCause {
    if err.is_timeout() {
        FallbackCause::ApiTimeout
    } else {
        FallbackCause::OracleUnavailable
    }
}

/// Substrings marking a contract/RPC failure as a connectivity problem.
const RPC_CONNECTIVITY_FRAGMENTS: [&str; 6] =
    ["timeout", "timed out", "network", "socket", "connect", "rpc"];

/// Classify a contract read failure from its error message.
pub fn classify_contract_error(message: &str) -> FallbackCause {
    let lowered = message.to_ascii_lowercase();

    // A recognized revert means the agent has no record on-chain.
    if lowered.contains("call_exception") || lowered.contains("execution reverted") {
        return FallbackCause::AgentNotFound;
    }

    if RPC_CONNECTIVITY_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
    {
        return FallbackCause::RpcUnavailable;
    }

    FallbackCause::OracleUnavailable
}
