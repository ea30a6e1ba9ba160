//! Configuration management for the trustline indexer.
//!
//! Configuration is loaded from a TOML file. Values may reference environment
//! variables with `${VAR_NAME}` syntax, which is how the updater key stays
//! out of the file on disk. Missing optional fields fall back to defaults.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use trustline_core::ScoringConfig;

/// Main configuration for the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    pub network: NetworkConfig,

    /// Contract addresses
    pub contracts: ContractsConfig,

    /// Cycle cadence and batching
    #[serde(default)]
    pub indexer: IndexerConfig,

    /// Updater signer configuration
    pub updater: UpdaterConfig,

    /// Retry policy for transient RPC failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Scoring knobs passed through to the engine
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Ethereum RPC URL
    pub rpc_url: String,
}

/// Contract addresses configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Reputation registry address (FeedbackPosted / NewFeedback events)
    pub reputation_registry: Address,

    /// TrustScore contract address (batchUpdateScores target)
    pub trust_score: Address,
}

/// Cycle cadence and batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// First block the registry could have emitted feedback in
    #[serde(default)]
    pub start_block: u64,

    /// Maximum agents recomputed per cycle
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Milliseconds between cycle starts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Path of the checkpoint file
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            max_batch_size: default_max_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

/// Updater signer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Private key for the updater account (hex string, 0x prefix optional)
    pub private_key: String,
}

/// Retry policy for transient RPC failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Cap on the doubled delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum retries per operation; absent means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_max_batch_size() -> usize {
    100
}

fn default_poll_interval_ms() -> u64 {
    15 * 60 * 1000
}

fn default_checkpoint_path() -> String {
    "trustline-checkpoint.json".to_string()
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR_NAME}`
    /// references against the environment first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = expand_env_vars(&contents)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            anyhow::bail!("Network RPC URL cannot be empty");
        }

        if self.contracts.reputation_registry.is_zero() {
            anyhow::bail!("Contracts reputation_registry must be a non-zero address");
        }
        if self.contracts.trust_score.is_zero() {
            anyhow::bail!("Contracts trust_score must be a non-zero address");
        }

        if self.indexer.max_batch_size == 0 {
            anyhow::bail!("Indexer max_batch_size must be > 0");
        }
        if self.indexer.poll_interval_ms == 0 {
            anyhow::bail!("Indexer poll_interval_ms must be > 0");
        }
        if self.indexer.checkpoint_path.trim().is_empty() {
            anyhow::bail!("Indexer checkpoint_path cannot be empty");
        }

        if self.updater.private_key.is_empty() {
            anyhow::bail!("Updater private_key cannot be empty");
        }
        let key = self.updater.private_key.trim_start_matches("0x");
        if key.len() != 64 {
            anyhow::bail!(
                "Updater private_key must be 64 hex characters (got {})",
                key.len()
            );
        }
        if !key.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Updater private_key must be a valid hex string");
        }

        if self.retry.initial_delay_ms == 0 {
            anyhow::bail!("Retry initial_delay_ms must be > 0");
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            anyhow::bail!(
                "Retry max_delay_ms ({}) cannot be below initial_delay_ms ({})",
                self.retry.max_delay_ms,
                self.retry.initial_delay_ms
            );
        }

        if self.scoring.max_score == 0 {
            anyhow::bail!("Scoring max_score must be > 0");
        }
        if self.scoring.older_feedback_weight == 0 && self.scoring.recent_feedback_weight == 0 {
            anyhow::bail!("Scoring weights cannot both be zero");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }

    /// The updater private key with a 0x prefix.
    pub fn updater_private_key_with_prefix(&self) -> String {
        let key = self.updater.private_key.trim_start_matches("0x");
        format!("0x{}", key)
    }
}

/// Expand `${VAR_NAME}` placeholders against the environment.
///
/// Every placeholder must name a set variable; an unset variable is an error
/// rather than a silently empty value. `$` without a following `{` passes
/// through untouched.
fn expand_env_vars(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            anyhow::bail!("Unclosed environment variable placeholder");
        };
        let name = &after[..end];
        if name.is_empty() {
            anyhow::bail!("Empty environment variable name");
        }
        let value = std::env::var(name)
            .with_context(|| format!("Environment variable '{}' is not set", name))?;
        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}
