//! Exponential-backoff retries for transient RPC failures.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff parameters for a retried operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap on the doubled delay.
    pub max_delay: Duration,

    /// Maximum number of retries. `None` retries until the error stops being
    /// transient.
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Run `op` until it succeeds, the error stops matching `retryable`, or the
/// retry budget runs out. After each retryable failure the harness reports it
/// through `on_retry`, sleeps, and doubles the delay up to `max_delay`.
pub async fn retry_with_backoff<T, F, Fut, P, H>(
    policy: &RetryPolicy,
    mut retryable: P,
    mut on_retry: H,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&anyhow::Error) -> bool,
    H: FnMut(u32, &anyhow::Error, Duration),
{
    let mut delay = policy.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let budget_spent = policy.max_retries.is_some_and(|max| attempt >= max);
                if budget_spent || !retryable(&err) {
                    return Err(err);
                }
                attempt += 1;
                on_retry(attempt, &err, delay);
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}

/// Retry `op` with the default transient-error classifier, logging each
/// retry under `label`.
pub async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(
        policy,
        is_transient_rpc_error,
        |attempt, err, delay| {
            warn!(
                "{label}: transient RPC failure (attempt {attempt}), retrying in {:?}: {err:#}",
                delay
            );
        },
        op,
    )
    .await
}

/// JSON-RPC error codes worth retrying.
const TRANSIENT_RPC_CODES: [&str; 3] = ["-32000", "-32005", "-32603"];

/// Error-code identifiers worth retrying (matched case-insensitively).
const TRANSIENT_CODE_TOKENS: [&str; 6] = [
    "network_error",
    "server_error",
    "timeout",
    "econnreset",
    "etimedout",
    "enotfound",
];

/// Message fragments worth retrying (matched case-insensitively).
const TRANSIENT_MESSAGE_FRAGMENTS: [&str; 9] = [
    "timeout",
    "timed out",
    "429",
    "rate limit",
    "network error",
    "missing response",
    "temporarily unavailable",
    "socket hang up",
    "gateway timeout",
];

/// Broad transient-error classifier: inspects the error and one nested cause.
pub fn is_transient_rpc_error(err: &anyhow::Error) -> bool {
    err.chain()
        .take(2)
        .any(|cause| message_is_transient(&cause.to_string()))
}

fn message_is_transient(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    TRANSIENT_RPC_CODES.iter().any(|code| lowered.contains(code))
        || TRANSIENT_CODE_TOKENS
            .iter()
            .any(|token| lowered.contains(token))
        || TRANSIENT_MESSAGE_FRAGMENTS
            .iter()
            .any(|fragment| lowered.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(max_retries: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_retries,
        }
    }

    #[test]
    fn classifier_matches_rpc_codes() {
        for code in ["-32000", "-32005", "-32603"] {
            let err = anyhow!("server returned an error response: error code {code}: busy");
            assert!(is_transient_rpc_error(&err), "code {code} should retry");
        }
        let err = anyhow!("server returned an error response: error code -32601: method not found");
        assert!(!is_transient_rpc_error(&err));
    }

    #[test]
    fn classifier_matches_code_tokens_case_insensitively() {
        for token in [
            "NETWORK_ERROR",
            "SERVER_ERROR",
            "TIMEOUT",
            "ECONNRESET",
            "ETIMEDOUT",
            "ENOTFOUND",
        ] {
            let err = anyhow!("request failed: {token}");
            assert!(is_transient_rpc_error(&err), "token {token} should retry");
        }
    }

    #[test]
    fn classifier_matches_message_fragments() {
        for message in [
            "connection Timed Out",
            "HTTP 429 Too Many Requests",
            "rate limit exceeded",
            "Network Error while dialing",
            "missing response",
            "service temporarily unavailable",
            "socket hang up",
            "gateway timeout from upstream",
        ] {
            let err = anyhow!("{message}");
            assert!(is_transient_rpc_error(&err), "{message:?} should retry");
        }
    }

    #[test]
    fn classifier_rejects_permanent_errors() {
        for message in [
            "execution reverted",
            "invalid argument",
            "block 42 not found",
            "insufficient funds for gas",
        ] {
            let err = anyhow!("{message}");
            assert!(!is_transient_rpc_error(&err), "{message:?} should not retry");
        }
    }

    #[test]
    fn classifier_inspects_one_nested_cause() {
        let inner = anyhow!("socket hang up");
        let wrapped = inner.context("failed to fetch logs");
        assert!(is_transient_rpc_error(&wrapped));

        // Two levels of wrapping pushes the transient cause out of reach.
        let deep = anyhow!("socket hang up")
            .context("transport failed")
            .context("failed to fetch logs");
        assert!(!is_transient_rpc_error(&deep));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(&quick_policy(None), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(anyhow!("connection timed out"))
            } else {
                Ok(7u32)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_immediately_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = retry_transient(&quick_policy(None), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("execution reverted"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn respects_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = retry_transient(&quick_policy(Some(2)), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("rate limit"))
        })
        .await;

        assert!(result.is_err());
        // Initial attempt plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn delay_doubles_up_to_cap() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(3),
            max_retries: Some(4),
        };
        let mut delays = Vec::new();
        let calls = AtomicU32::new(0);
        let _: Result<u32> = retry_with_backoff(
            &policy,
            |_| true,
            |_, _, delay| delays.push(delay),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("timeout"))
            },
        )
        .await;

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1),
                Duration::from_millis(2),
                Duration::from_millis(3),
                Duration::from_millis(3),
            ]
        );
    }
}
