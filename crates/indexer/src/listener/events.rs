//! Feedback event definitions and normalization.
//!
//! The reputation registry emits one of two event signatures with identical
//! payloads (`FeedbackPosted` is canonical, `NewFeedback` a deployed synonym).
//! Both are accepted, deduplicated by their full payload identity, and ordered
//! by emission position.

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};
use std::collections::HashSet;

sol! {
    /// Canonical ERC-8004 feedback event.
    #[derive(Debug, PartialEq, Eq)]
    event FeedbackPosted(
        uint256 indexed agentId,
        address indexed clientAddress,
        uint64 feedbackIndex,
        int128 value,
        uint8 valueDecimals,
        string indexed indexedTag1,
        string tag1,
        string tag2,
        string endpoint,
        string feedbackURI,
        bytes32 feedbackHash
    );

    /// Synonym signature used by some registry deployments.
    #[derive(Debug, PartialEq, Eq)]
    event NewFeedback(
        uint256 indexed agentId,
        address indexed clientAddress,
        uint64 feedbackIndex,
        int128 value,
        uint8 valueDecimals,
        string indexed indexedTag1,
        string tag1,
        string tag2,
        string endpoint,
        string feedbackURI,
        bytes32 feedbackHash
    );
}

/// Which of the two accepted signatures a log carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackEventKind {
    /// `FeedbackPosted(...)`.
    FeedbackPosted,
    /// `NewFeedback(...)`.
    NewFeedback,
}

/// A decoded feedback event with its block coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEvent {
    /// The agent being graded.
    pub agent_id: U256,

    /// The grader.
    pub client_address: Address,

    /// Monotonic per (agent, client) counter.
    pub feedback_index: u64,

    /// Signed sentiment; strictly positive means positive.
    pub value: i128,

    /// Decimal scaling of `value` (dedup identity only).
    pub value_decimals: u8,

    /// First tag (dedup identity only).
    pub tag1: String,

    /// Second tag (dedup identity only).
    pub tag2: String,

    /// Endpoint label (dedup identity only).
    pub endpoint: String,

    /// Off-chain feedback URI (dedup identity only).
    pub feedback_uri: String,

    /// Hash of the off-chain feedback payload (dedup identity only).
    pub feedback_hash: B256,

    /// Block number where the event occurred.
    pub block_number: u64,

    /// Log index within the block.
    pub log_index: u64,

    /// Transaction hash.
    pub tx_hash: B256,

    /// Which signature emitted this event.
    pub kind: FeedbackEventKind,
}

/// The composite dedup identity: full payload plus block number and tx hash.
/// Two logs with equal keys are the same event. The log index is deliberately
/// absent so a migration emitting both signatures for one event collapses
/// them when every payload field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedbackKey {
    agent_id: U256,
    client_address: Address,
    feedback_index: u64,
    value: i128,
    value_decimals: u8,
    tag1: String,
    tag2: String,
    endpoint: String,
    feedback_uri: String,
    feedback_hash: B256,
    block_number: u64,
    tx_hash: B256,
}

impl FeedbackEvent {
    /// Parse a `FeedbackPosted` log.
    pub fn from_posted_log(log: &Log) -> Result<Self> {
        let decoded = FeedbackPosted::decode_log(log.as_ref(), true)
            .context("Failed to decode FeedbackPosted event")?;
        Self::from_parts(
            log,
            FeedbackEventKind::FeedbackPosted,
            decoded.agentId,
            decoded.clientAddress,
            decoded.feedbackIndex,
            decoded.value,
            decoded.valueDecimals,
            decoded.tag1.clone(),
            decoded.tag2.clone(),
            decoded.endpoint.clone(),
            decoded.feedbackURI.clone(),
            decoded.feedbackHash,
        )
    }

    /// Parse a `NewFeedback` log.
    pub fn from_new_feedback_log(log: &Log) -> Result<Self> {
        let decoded = NewFeedback::decode_log(log.as_ref(), true)
            .context("Failed to decode NewFeedback event")?;
        Self::from_parts(
            log,
            FeedbackEventKind::NewFeedback,
            decoded.agentId,
            decoded.clientAddress,
            decoded.feedbackIndex,
            decoded.value,
            decoded.valueDecimals,
            decoded.tag1.clone(),
            decoded.tag2.clone(),
            decoded.endpoint.clone(),
            decoded.feedbackURI.clone(),
            decoded.feedbackHash,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        log: &Log,
        kind: FeedbackEventKind,
        agent_id: U256,
        client_address: Address,
        feedback_index: u64,
        value: i128,
        value_decimals: u8,
        tag1: String,
        tag2: String,
        endpoint: String,
        feedback_uri: String,
        feedback_hash: B256,
    ) -> Result<Self> {
        let block_number = log.block_number.context("Log missing block_number")?;
        let log_index = log.log_index.context("Log missing log_index")?;
        let tx_hash = log
            .transaction_hash
            .context("Log missing transaction_hash")?;

        Ok(Self {
            agent_id,
            client_address,
            feedback_index,
            value,
            value_decimals,
            tag1,
            tag2,
            endpoint,
            feedback_uri,
            feedback_hash,
            block_number,
            log_index,
            tx_hash,
            kind,
        })
    }

    /// Sentiment of this event: `value > 0` is positive, zero and negative
    /// are negative.
    pub fn is_positive(&self) -> bool {
        self.value > 0
    }

    /// The composite dedup identity for this event.
    pub fn dedup_key(&self) -> FeedbackKey {
        FeedbackKey {
            agent_id: self.agent_id,
            client_address: self.client_address,
            feedback_index: self.feedback_index,
            value: self.value,
            value_decimals: self.value_decimals,
            tag1: self.tag1.clone(),
            tag2: self.tag2.clone(),
            endpoint: self.endpoint.clone(),
            feedback_uri: self.feedback_uri.clone(),
            feedback_hash: self.feedback_hash,
            block_number: self.block_number,
            tx_hash: self.tx_hash,
        }
    }
}

/// Order events by `(block_number, log_index)` ascending and drop duplicates,
/// keeping the earliest occurrence of each dedup key.
pub fn normalize_events(mut events: Vec<FeedbackEvent>) -> Vec<FeedbackEvent> {
    events.sort_by_key(|event| (event.block_number, event.log_index));
    let mut seen = HashSet::with_capacity(events.len());
    events.retain(|event| seen.insert(event.dedup_key()));
    events
}
