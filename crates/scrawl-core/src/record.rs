//! Record model and filesystem storage
//!
//! A record is a pair of files in the `records/` directory:
//! `<id>.txt` holds the content, `<id>.meta.json` holds the metadata
//! document. The pair is written content-first so that a crash between
//! the two writes can only leave an orphaned content file (detectable
//! and prunable), never a metadata document pointing at missing content.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::index::normalize_tag;

/// Metadata document stored next to a record's content file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordMeta {
    /// Record identifier (matches the file stem)
    pub id: String,
    /// When the record was first saved
    pub created_at: DateTime<Utc>,
    /// Normalized tags, kept sorted
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Free-form extension fields (description, source, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A record with its content loaded
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Record {
    pub id: String,
    pub content: String,
    pub meta: RecordMeta,
}

/// Listing entry: everything but the content
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordSummary {
    pub id: String,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for saving a record
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    /// Optional name; used as the id when present, otherwise a UUID is assigned
    pub name: Option<String>,
    /// The record text
    pub content: String,
    /// Tags to attach (normalized on save)
    pub tags: Vec<String>,
    /// Extra metadata fields
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Consistency report from a store check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsistencyReport {
    /// Content files with no matching metadata document
    pub orphaned_content: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_content.is_empty()
    }
}

/// Filesystem storage for records
///
/// Owns the `records/` directory and nothing else. Index and commit
/// bookkeeping are layered on top by [`crate::store::Store`].
#[derive(Debug, Clone)]
pub struct RecordStore {
    records_dir: PathBuf,
}

impl RecordStore {
    pub fn new(records_dir: PathBuf) -> StoreResult<Self> {
        fs::create_dir_all(&records_dir).map_err(|source| StoreError::WriteError {
            path: records_dir.clone(),
            source,
        })?;
        Ok(Self { records_dir })
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn content_path(&self, id: &str) -> PathBuf {
        self.records_dir.join(format!("{id}.txt"))
    }

    pub fn meta_path(&self, id: &str) -> PathBuf {
        self.records_dir.join(format!("{id}.meta.json"))
    }

    /// Write a record to disk, returning its metadata
    ///
    /// The id is the supplied name or a fresh UUID. Content is written
    /// before metadata.
    pub fn save(&self, draft: &RecordDraft) -> StoreResult<RecordMeta> {
        let id = match &draft.name {
            Some(name) => validate_id(name)?,
            None => Uuid::new_v4().to_string(),
        };

        let tags: BTreeSet<String> =
            draft.tags.iter().filter_map(|t| normalize_tag(t)).collect();

        let meta = RecordMeta {
            id: id.clone(),
            created_at: Utc::now(),
            tags,
            extra: draft.extra.clone(),
        };

        let content_path = self.content_path(&id);
        fs::write(&content_path, &draft.content).map_err(|source| StoreError::WriteError {
            path: content_path,
            source,
        })?;
        self.write_meta(&meta)?;

        Ok(meta)
    }

    pub fn write_meta(&self, meta: &RecordMeta) -> StoreResult<()> {
        let meta_path = self.meta_path(&meta.id);
        let json = serde_json::to_string_pretty(meta)?;
        fs::write(&meta_path, json).map_err(|source| StoreError::WriteError {
            path: meta_path,
            source,
        })
    }

    /// Load a record; `NotFound` if either half of the pair is missing
    pub fn load(&self, id: &str) -> StoreResult<Record> {
        let content_path = self.content_path(id);
        let meta_path = self.meta_path(id);

        if !content_path.exists() || !meta_path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() });
        }

        let content = fs::read_to_string(&content_path).map_err(|source| StoreError::ReadError {
            path: content_path,
            source,
        })?;
        let meta = self.load_meta(id)?;

        Ok(Record {
            id: id.to_string(),
            content,
            meta,
        })
    }

    pub fn load_meta(&self, id: &str) -> StoreResult<RecordMeta> {
        let meta_path = self.meta_path(id);
        if !meta_path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        let json = fs::read_to_string(&meta_path).map_err(|source| StoreError::ReadError {
            path: meta_path.clone(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|e| StoreError::InvalidMetadata {
            path: meta_path,
            details: e.to_string(),
        })
    }

    pub fn exists(&self, id: &str) -> bool {
        self.content_path(id).exists() && self.meta_path(id).exists()
    }

    /// Lazily iterate record summaries
    ///
    /// Metadata documents are the listing authority; an orphaned content
    /// file never appears here. Unparsable metadata is skipped with a
    /// warning rather than failing the whole listing.
    pub fn list(&self) -> StoreResult<impl Iterator<Item = RecordSummary>> {
        let entries = fs::read_dir(&self.records_dir).map_err(|source| StoreError::ReadError {
            path: self.records_dir.clone(),
            source,
        })?;

        Ok(entries.filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_str()?;
            let id = name.strip_suffix(".meta.json")?;
            match fs::read_to_string(&path)
                .ok()
                .and_then(|json| serde_json::from_str::<RecordMeta>(&json).ok())
            {
                Some(meta) => Some(RecordSummary {
                    id: id.to_string(),
                    tags: meta.tags,
                    created_at: meta.created_at,
                }),
                None => {
                    tracing::warn!(path = %path.display(), "skipping unreadable metadata");
                    None
                }
            }
        }))
    }

    /// Remove both halves of a record
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let content_path = self.content_path(id);
        if !content_path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        fs::remove_file(&content_path).map_err(|source| StoreError::WriteError {
            path: content_path,
            source,
        })?;
        let meta_path = self.meta_path(id);
        if meta_path.exists() {
            fs::remove_file(&meta_path).map_err(|source| StoreError::WriteError {
                path: meta_path,
                source,
            })?;
        }
        Ok(())
    }

    /// Find content files with no metadata document
    pub fn check(&self) -> StoreResult<ConsistencyReport> {
        let entries = fs::read_dir(&self.records_dir).map_err(|source| StoreError::ReadError {
            path: self.records_dir.clone(),
            source,
        })?;

        let mut orphans = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::ReadError {
                    path: self.records_dir.clone(),
                    source,
                })?
                .path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(id) = name.strip_suffix(".txt") {
                if !self.meta_path(id).exists() {
                    orphans.push(id.to_string());
                }
            }
        }
        orphans.sort();
        Ok(ConsistencyReport {
            orphaned_content: orphans,
        })
    }

    /// Remove orphaned content files found by [`check`](Self::check)
    pub fn prune_orphans(&self) -> StoreResult<Vec<String>> {
        let report = self.check()?;
        for id in &report.orphaned_content {
            let path = self.content_path(id);
            fs::remove_file(&path).map_err(|source| StoreError::WriteError { path, source })?;
            tracing::info!(id = %id, "pruned orphaned content file");
        }
        Ok(report.orphaned_content)
    }
}

fn validate_id(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return Err(StoreError::InvalidId {
            id: name.to_string(),
        });
    }
    Ok(name.to_string())
}
