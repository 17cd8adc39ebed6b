//! Conflict resolution strategy and audit log

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// How the daemon resolves a file whose local edit races its own
/// pending commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Keep whichever side was modified later
    ///
    /// Compares the file's mtime against the sync cursor's commit time.
    /// This is a heuristic: clock skew or coarse filesystem mtime
    /// granularity can pick the wrong side. When it cannot decide, the
    /// local edit is kept.
    #[default]
    Timestamp,
    /// Always keep the local edit
    Ours,
    /// Always restore the daemon-expected content
    Theirs,
    /// Never resolve automatically; wait for the user
    Manual,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictStrategy::Timestamp => "timestamp",
            ConflictStrategy::Ours => "ours",
            ConflictStrategy::Theirs => "theirs",
            ConflictStrategy::Manual => "manual",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timestamp" => Ok(ConflictStrategy::Timestamp),
            "ours" => Ok(ConflictStrategy::Ours),
            "theirs" => Ok(ConflictStrategy::Theirs),
            "manual" => Ok(ConflictStrategy::Manual),
            other => Err(format!(
                "unknown conflict strategy '{other}' (expected timestamp, ours, theirs, or manual)"
            )),
        }
    }
}

/// Append-only audit trail of conflict resolutions
///
/// One line per resolution: `<timestamp> | <strategy> | <path>`.
/// Readable without the system running; never pruned by scrawl.
#[derive(Debug, Clone)]
pub struct ConflictLog {
    path: PathBuf,
}

impl ConflictLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, strategy: ConflictStrategy, file: &Path) -> StoreResult<()> {
        let line = format!(
            "{} | {} | {}\n",
            Utc::now().to_rfc3339(),
            strategy,
            file.display()
        );
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| StoreError::WriteError {
                path: self.path.clone(),
                source,
            })?;
        log.write_all(line.as_bytes())
            .map_err(|source| StoreError::WriteError {
                path: self.path.clone(),
                source,
            })
    }

    /// Number of entries, for status reporting and tests
    pub fn entry_count(&self) -> usize {
        std::fs::read_to_string(&self.path)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}
