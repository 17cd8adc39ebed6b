//! Scrawl Core Library
//!
//! This crate provides the core functionality for Scrawl, a local-first
//! store for text records backed by a plain git repository.
//!
//! # Architecture
//!
//! - **Git**: Source of truth for history; every record lives as plain
//!   files in the working tree, so the repository stays usable with
//!   ordinary git tooling
//!
//! Records are file pairs (content plus a metadata document), the tag
//! index is a rebuildable cache over the metadata, and commits are
//! batched through a disk-persisted counter.
//!
//! # Quick Start
//!
//! ```text
//! let mut store = Store::open()?;
//!
//! // Save a record
//! let saved = store.save(RecordDraft {
//!     name: Some("greeting".into()),
//!     content: "hello".into(),
//!     tags: vec!["demo".into()],
//!     ..Default::default()
//! })?;
//!
//! // Query by tag
//! let ids = store.query(&["demo".into()], false)?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `record`: Record model and filesystem storage
//! - `index`: Inverted tag index
//! - `batch`: Batch commit coordinator
//! - `vcs`: Git adapter
//! - `daemon`: Auto-sync daemon and conflict resolution
//! - `config`: Application configuration

pub mod batch;
pub mod config;
pub mod daemon;
pub mod error;
pub mod index;
pub mod record;
pub mod store;
pub mod vcs;

#[cfg(test)]
mod testutil;

pub use batch::{BatchCoordinator, BatchOutcome};
pub use config::Config;
pub use daemon::{
    AutoSyncDaemon, ConflictLog, ConflictStrategy, CycleOutcome, DaemonCommand, DaemonHandle,
    DaemonState, spawn_daemon,
};
pub use error::{AdapterError, StoreError};
pub use index::TagIndex;
pub use record::{Record, RecordDraft, RecordMeta, RecordStore, RecordSummary};
pub use store::{SaveOutcome, Store};
pub use vcs::{CommitId, GitAdapter, VcsStatus};
