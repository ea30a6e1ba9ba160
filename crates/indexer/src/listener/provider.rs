//! RPC provider wrapper for querying the reputation registry.

use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockNumberOrTag, BlockTransactionsKind, Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result};
use async_trait::async_trait;

use super::events::{normalize_events, FeedbackEvent, FeedbackPosted, NewFeedback};
use crate::cycle::ChainSource;

/// HTTP RPC provider scoped to one reputation registry deployment.
#[derive(Clone)]
pub struct RpcProvider {
    provider: RootProvider<Http<Client>>,
    registry_address: Address,
}

impl RpcProvider {
    /// Create a new RPC provider.
    pub fn new(rpc_url: &str, registry_address: Address) -> Result<Self> {
        let url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;

        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            registry_address,
        })
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context("Failed to get block number")
    }

    /// Fetch feedback events for `[from_block, to_block]`, accepting both
    /// event signatures, deduplicated and ordered by emission position.
    ///
    /// With `agent` set, only that agent's events are returned (per-agent
    /// scan); without it, all agents in range (global scan).
    pub async fn get_feedback_events(
        &self,
        from_block: u64,
        to_block: u64,
        agent: Option<U256>,
    ) -> Result<Vec<FeedbackEvent>> {
        anyhow::ensure!(
            from_block <= to_block,
            "Invalid block range: {from_block} > {to_block}"
        );

        let mut filter = Filter::new()
            .address(self.registry_address)
            .event_signature(vec![
                FeedbackPosted::SIGNATURE_HASH,
                NewFeedback::SIGNATURE_HASH,
            ])
            .from_block(from_block)
            .to_block(to_block);

        if let Some(agent_id) = agent {
            filter = filter.topic1(B256::from(agent_id));
        }

        let logs: Vec<Log> = self
            .provider
            .get_logs(&filter)
            .await
            .context("Failed to fetch logs from RPC")?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            let parsed = match log.topic0() {
                Some(topic) if *topic == FeedbackPosted::SIGNATURE_HASH => {
                    FeedbackEvent::from_posted_log(log)
                }
                Some(topic) if *topic == NewFeedback::SIGNATURE_HASH => {
                    FeedbackEvent::from_new_feedback_log(log)
                }
                _ => continue,
            };
            match parsed {
                Ok(event) => events.push(event),
                Err(e) => {
                    // Log parsing error but continue processing other events
                    tracing::warn!("Failed to parse feedback event: {}", e);
                }
            }
        }

        Ok(normalize_events(events))
    }

    /// Fetch a block's timestamp in milliseconds. A missing block is a fatal
    /// error: feedback cannot be timed without it.
    pub async fn get_block_timestamp_ms(&self, block_number: u64) -> Result<i64> {
        let block = self
            .provider
            .get_block_by_number(
                BlockNumberOrTag::Number(block_number),
                BlockTransactionsKind::Hashes,
            )
            .await
            .with_context(|| format!("Failed to fetch block {block_number}"))?
            .with_context(|| format!("Block {block_number} not found"))?;

        let seconds = i64::try_from(block.header.timestamp)
            .with_context(|| format!("Block {block_number} timestamp out of range"))?;
        Ok(seconds * 1000)
    }
}

#[async_trait]
impl ChainSource for RpcProvider {
    async fn latest_block(&self) -> Result<u64> {
        self.get_block_number().await
    }

    async fn feedback_events(
        &self,
        from: u64,
        to: u64,
        agent: Option<U256>,
    ) -> Result<Vec<FeedbackEvent>> {
        self.get_feedback_events(from, to, agent).await
    }

    async fn block_timestamp_ms(&self, block: u64) -> Result<i64> {
        self.get_block_timestamp_ms(block).await
    }
}
