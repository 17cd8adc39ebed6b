//! Error types for scrawl
//!
//! Two layers: `AdapterError` for failures of the underlying git
//! operations, and `StoreError` for everything the record store and its
//! callers can see. Foreground callers get these synchronously; the
//! daemon logs adapter errors and retries on its own schedule.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the VCS adapter (git subprocess)
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The git binary could not be run at all
    #[error("Failed to run git: {source}. Is git installed and on PATH?")]
    GitUnavailable {
        #[source]
        source: io::Error,
    },

    /// The target directory is not a git repository
    #[error("Not a git repository: '{path}'. Run 'scrawl init' first.")]
    NotARepository { path: PathBuf },

    /// A staged path does not exist and is not a pending deletion
    #[error("Cannot stage '{path}': path does not exist")]
    PathspecMissing { path: PathBuf },

    /// A git command exited non-zero
    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    /// Output of a git command could not be interpreted
    #[error("Unexpected git output from '{command}': {details}")]
    UnexpectedOutput { command: String, details: String },

    /// Generic I/O error while talking to the repository
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from record storage and the components layered on it
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record does not exist (either half of the content+metadata pair is missing)
    #[error("Record not found: '{id}'")]
    NotFound { id: String },

    /// Record id is not usable as a filename
    #[error("Invalid record id '{id}': must not contain path separators or start with '.'")]
    InvalidId { id: String },

    /// Failed to read a file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A metadata document exists but cannot be parsed
    #[error("Invalid metadata in '{path}': {details}")]
    InvalidMetadata { path: PathBuf, details: String },

    /// Underlying VCS operation failed
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;
