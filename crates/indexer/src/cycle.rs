//! The indexer cycle: one transactional pass from checkpoint to checkpoint.
//!
//! A cycle loads the checkpoint, scans new blocks for dirty agents, merges in
//! agents deferred by a prior cycle, recomputes each agent's score from its
//! full event history, commits a single batch transaction, and only then
//! advances the checkpoint. A failure anywhere before the commit leaves the
//! checkpoint untouched; a failure between commit and persist re-submits the
//! same overwrite-idempotent batch next cycle.

use alloy::primitives::{B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use trustline_core::ScoringConfig;
use trustline_engine::{score_feedback, FeedbackEntry};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::contract::ScoreUpdate;
use crate::listener::{FeedbackEvent, FeedbackEventKind};
use crate::retry::{retry_transient, RetryPolicy};

/// Read access to the chain, as the cycle needs it.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Current chain head.
    async fn latest_block(&self) -> Result<u64>;

    /// Feedback events in `[from, to]`, for one agent or globally.
    async fn feedback_events(
        &self,
        from: u64,
        to: u64,
        agent: Option<U256>,
    ) -> Result<Vec<FeedbackEvent>>;

    /// A block's timestamp in milliseconds. Missing block is fatal.
    async fn block_timestamp_ms(&self, block: u64) -> Result<i64>;
}

/// Write access to the score contract.
#[async_trait]
pub trait ScoreSink: Send + Sync {
    /// Submit one batch of score updates and wait for inclusion.
    async fn submit_batch(&self, updates: &[ScoreUpdate]) -> Result<B256>;
}

/// Cycle cadence and batching knobs.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// First block the registry could have emitted feedback in.
    pub start_block: u64,

    /// Maximum agents recomputed per cycle; the rest are queued.
    pub max_batch_size: usize,

    /// Time between cycle starts.
    pub poll_interval: Duration,

    /// Scoring knobs passed through to the engine.
    pub scoring: ScoringConfig,

    /// Backoff policy for transient RPC failures inside a cycle.
    pub retry: RetryPolicy,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            start_block: 0,
            max_batch_size: 100,
            poll_interval: Duration::from_secs(15 * 60),
            scoring: ScoringConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Agents recomputed and committed this cycle.
    pub processed_agent_count: usize,

    /// Agents deferred to the next cycle by the batch cap.
    pub queued_agent_count: usize,

    /// The chain head this cycle folded in.
    pub latest_block: u64,

    /// Hash of the batch transaction, when one was submitted.
    pub tx_hash: Option<B256>,

    /// Both event signatures were observed in this cycle.
    pub signature_overlap: bool,
}

/// The serial indexer. One cycle in flight at any time; the updater signer's
/// nonce depends on it.
pub struct Indexer {
    chain: Arc<dyn ChainSource>,
    sink: Arc<dyn ScoreSink>,
    store: CheckpointStore,
    settings: CycleSettings,
}

impl Indexer {
    /// Assemble an indexer from its collaborators.
    pub fn new(
        chain: Arc<dyn ChainSource>,
        sink: Arc<dyn ScoreSink>,
        store: CheckpointStore,
        settings: CycleSettings,
    ) -> Self {
        Self {
            chain,
            sink,
            store,
            settings,
        }
    }

    /// Run cycles forever, spaced by the poll interval. A failed cycle is
    /// logged and the loop continues on the next tick.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Indexer starting: poll interval {:?}, max batch {}",
            self.settings.poll_interval, self.settings.max_batch_size
        );

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        "Cycle complete: processed={} queued={} latest_block={} tx={}",
                        report.processed_agent_count,
                        report.queued_agent_count,
                        report.latest_block,
                        report
                            .tx_hash
                            .map(|h| h.to_string())
                            .unwrap_or_else(|| "none".to_string())
                    );
                }
                Err(e) => {
                    warn!("Indexer cycle failed: {e:#}");
                }
            }
        }
    }

    /// Run exactly one cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let checkpoint = self.store.load().await?;
        let baseline = checkpoint
            .last_processed_block
            .unwrap_or_else(|| self.settings.start_block.saturating_sub(1));
        let from = baseline + 1;

        let latest = retry_transient(&self.settings.retry, "latest_block", || {
            self.chain.latest_block()
        })
        .await?;

        let mut dirty: BTreeSet<U256> = checkpoint
            .pending_agents()
            .iter()
            .map(|agent| agent.value())
            .collect();
        let mut kinds_seen: HashSet<FeedbackEventKind> = HashSet::new();

        if from <= latest {
            let events = retry_transient(&self.settings.retry, "global_scan", || {
                self.chain.feedback_events(from, latest, None)
            })
            .await?;
            for event in &events {
                kinds_seen.insert(event.kind);
                dirty.insert(event.agent_id);
            }
        }

        // BTreeSet iteration is numeric-ascending, which fixes both the
        // processing order and the overflow split.
        let ordered: Vec<U256> = dirty.into_iter().collect();
        let split = ordered.len().min(self.settings.max_batch_size);
        let (to_process, to_queue) = ordered.split_at(split);

        let now_ms = Utc::now().timestamp_millis();
        // Block timestamps are memoized for this cycle only; reorgs would
        // invalidate anything longer-lived.
        let mut block_timestamps: HashMap<u64, i64> = HashMap::new();
        let mut updates: Vec<ScoreUpdate> = Vec::with_capacity(to_process.len());

        for &agent_id in to_process {
            let events = if self.settings.start_block <= latest {
                retry_transient(&self.settings.retry, "agent_scan", || {
                    self.chain
                        .feedback_events(self.settings.start_block, latest, Some(agent_id))
                })
                .await?
            } else {
                Vec::new()
            };

            let mut entries = Vec::with_capacity(events.len());
            for event in &events {
                kinds_seen.insert(event.kind);
                let timestamp_ms = match block_timestamps.get(&event.block_number) {
                    Some(&cached) => cached,
                    None => {
                        let fetched =
                            retry_transient(&self.settings.retry, "block_timestamp", || {
                                self.chain.block_timestamp_ms(event.block_number)
                            })
                            .await?;
                        block_timestamps.insert(event.block_number, fetched);
                        fetched
                    }
                };
                entries.push(FeedbackEntry::from_chain(event.is_positive(), timestamp_ms));
            }

            let result = score_feedback(&entries, &self.settings.scoring, now_ms)?;
            updates.push(ScoreUpdate {
                agent_id,
                score: result.score,
                total_feedback: result.total_feedback,
                positive_feedback: result.positive_feedback,
            });
        }

        let tx_hash = if updates.is_empty() {
            None
        } else {
            Some(self.sink.submit_batch(&updates).await?)
        };

        let next = Checkpoint {
            last_processed_block: Some(latest),
            pending_agent_ids: to_queue.iter().map(U256::to_string).collect(),
        };
        self.store.save(&next).await?;

        let signature_overlap = kinds_seen.len() > 1;
        if signature_overlap {
            warn!("Observed both FeedbackPosted and NewFeedback signatures in one cycle");
        }

        Ok(CycleReport {
            processed_agent_count: to_process.len(),
            queued_agent_count: to_queue.len(),
            latest_block: latest,
            tx_hash,
            signature_overlap,
        })
    }
}
