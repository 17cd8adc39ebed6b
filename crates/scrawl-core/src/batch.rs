//! Batch commit coordinator
//!
//! Accumulates a pending-write counter persisted to `.batch_counter`
//! and folds accumulated writes into a single commit once the
//! configured threshold is reached. Batching trades history resolution
//! for far fewer git operations during bulk writes; with batching
//! disabled every write flushes immediately.
//!
//! The counter file is the coordinator's only state, so a process
//! restart resumes a partially-filled batch instead of dropping it.

use std::fs;
use std::path::PathBuf;

use crate::error::{StoreError, StoreResult};
use crate::vcs::{CommitId, GitAdapter};

/// Outcome of one recorded write
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// The flush commit, when this write triggered one
    pub committed: Option<CommitId>,
    /// Writes still pending after this one
    pub pending: u32,
}

/// Coordinates deferred commits around a disk-backed counter
#[derive(Debug)]
pub struct BatchCoordinator {
    enabled: bool,
    threshold: u32,
    counter_file: PathBuf,
}

impl BatchCoordinator {
    /// `threshold` below 1 is treated as 1
    pub fn new(counter_file: PathBuf, enabled: bool, threshold: u32) -> Self {
        Self {
            enabled,
            threshold: threshold.max(1),
            counter_file,
        }
    }

    /// Writes recorded since the last flush
    ///
    /// An unreadable counter file counts as zero.
    pub fn pending(&self) -> u32 {
        fs::read_to_string(&self.counter_file)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record one write, flushing synchronously at the threshold
    ///
    /// The counter is persisted before the flush decision so a crash
    /// mid-batch never loses the count.
    pub fn record_write(&mut self, vcs: &GitAdapter) -> StoreResult<BatchOutcome> {
        let count = self.pending() + 1;
        self.write_counter(count)?;

        if !self.enabled || count >= self.threshold {
            let reason = if self.enabled {
                "threshold reached"
            } else {
                "immediate"
            };
            let committed = self.flush(vcs, reason)?;
            Ok(BatchOutcome {
                committed,
                pending: 0,
            })
        } else {
            Ok(BatchOutcome {
                committed: None,
                pending: count,
            })
        }
    }

    /// Stage everything and commit the pending batch
    ///
    /// Resets the counter on success. Returns `None` when there was
    /// nothing pending or nothing left to commit (e.g. the daemon
    /// already swept the changes up).
    pub fn flush(&mut self, vcs: &GitAdapter, reason: &str) -> StoreResult<Option<CommitId>> {
        let count = self.pending();
        if count == 0 {
            return Ok(None);
        }
        vcs.stage_all()?;
        let noun = if count == 1 { "record" } else { "records" };
        let message = format!("Batch commit: {count} {noun} ({reason})");
        let committed = vcs.commit(&message)?;
        self.write_counter(0)?;
        if let Some(id) = &committed {
            tracing::info!(commit = id.short(), count, "flushed batch");
        }
        Ok(committed)
    }

    fn write_counter(&self, count: u32) -> StoreResult<()> {
        fs::write(&self.counter_file, count.to_string()).map_err(|source| {
            StoreError::WriteError {
                path: self.counter_file.clone(),
                source,
            }
        })
    }
}
