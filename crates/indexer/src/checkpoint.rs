//! Durable cycle checkpoints.
//!
//! The checkpoint records the highest block whose events have been folded in
//! and the agents deferred by the batch-size cap. It is the only state the
//! indexer persists, written atomically (sibling temp file, then rename) so a
//! reader always sees a complete prior or complete new version.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use trustline_core::AgentId;

/// Persisted indexer state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Checkpoint {
    /// Highest block number whose events have been folded in. `None` before
    /// the first completed cycle.
    pub last_processed_block: Option<u64>,

    /// Agents deferred from a prior cycle, in first-seen order, as canonical
    /// decimal strings.
    pub pending_agent_ids: Vec<String>,
}

impl Checkpoint {
    /// Drop pending entries that are not valid agent IDs and collapse
    /// duplicates to their first occurrence. Digit strings are canonicalized,
    /// so `"007"` and `"7"` are the same entry.
    pub fn sanitize(&mut self) {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(self.pending_agent_ids.len());
        for raw in self.pending_agent_ids.drain(..) {
            let Ok(id) = AgentId::parse(&raw) else {
                continue;
            };
            let canonical = id.to_decimal();
            if seen.insert(canonical.clone()) {
                kept.push(canonical);
            }
        }
        self.pending_agent_ids = kept;
    }

    /// Pending IDs as parsed agent identifiers.
    pub fn pending_agents(&self) -> Vec<AgentId> {
        self.pending_agent_ids
            .iter()
            .filter_map(|raw| AgentId::parse(raw).ok())
            .collect()
    }
}

/// File-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store backed by the given file path.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint. A missing file yields the zero checkpoint;
    /// pending IDs are sanitized on the way in.
    pub async fn load(&self) -> Result<Checkpoint> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Checkpoint::default());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read checkpoint file: {}", self.path.display())
                });
            }
        };

        let mut checkpoint: Checkpoint = serde_json::from_str(&contents).with_context(|| {
            format!("Failed to parse checkpoint file: {}", self.path.display())
        })?;
        checkpoint.sanitize();
        Ok(checkpoint)
    }

    /// Persist the checkpoint atomically: write a sibling temp file, then
    /// rename it over the target.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create checkpoint directory: {}", parent.display())
                })?;
            }
        }

        let mut body = serde_json::to_string_pretty(checkpoint)
            .context("Failed to serialize checkpoint")?;
        body.push('\n');

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, body.as_bytes())
            .await
            .with_context(|| {
                format!("Failed to write checkpoint temp file: {}", temp_path.display())
            })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| {
                format!("Failed to move checkpoint into place: {}", self.path.display())
            })?;

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
