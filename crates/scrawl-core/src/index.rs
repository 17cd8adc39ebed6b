//! Tag index
//!
//! Inverted map from normalized tag to the set of record ids carrying
//! it, persisted as a single JSON document. The index is a derived
//! projection of the metadata documents, never a source of truth: when
//! the document is missing or unparsable the index flips to
//! `NeedsRebuild` and reconstructs itself by scanning `records/`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::record::RecordStore;

/// Normalize a tag: trim whitespace and lowercase
///
/// Returns `None` for tags that are empty after trimming. Normalization
/// happens on every write path so queries over the stored map are
/// case-insensitive by construction.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

type TagMap = BTreeMap<String, BTreeSet<String>>;

/// Index validity state
///
/// `NeedsRebuild` is entered when the persisted document fails to parse;
/// the next operation rebuilds from the metadata documents.
#[derive(Debug)]
enum IndexState {
    Valid(TagMap),
    NeedsRebuild,
}

/// The tag index document plus its on-disk location
#[derive(Debug)]
pub struct TagIndex {
    path: PathBuf,
    state: IndexState,
}

impl TagIndex {
    /// Open the index, rebuilding from `records` if missing or corrupt
    pub fn open(path: PathBuf, records: &RecordStore) -> StoreResult<Self> {
        let state = match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<TagMap>(&json) {
                Ok(map) => IndexState::Valid(map),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "tag index unparsable, scheduling rebuild"
                    );
                    IndexState::NeedsRebuild
                }
            },
            Err(_) => IndexState::NeedsRebuild,
        };

        let mut index = Self { path, state };
        if matches!(index.state, IndexState::NeedsRebuild) {
            index.rebuild(records)?;
        }
        Ok(index)
    }

    /// Rebuild the whole map by scanning every metadata document
    pub fn rebuild(&mut self, records: &RecordStore) -> StoreResult<()> {
        let mut map = TagMap::new();
        for summary in records.list()? {
            for tag in &summary.tags {
                if let Some(tag) = normalize_tag(tag) {
                    map.entry(tag).or_default().insert(summary.id.clone());
                }
            }
        }
        self.state = IndexState::Valid(map);
        self.persist()
    }

    /// Add `tags` for `id` and persist
    pub fn add(&mut self, id: &str, tags: &[String], records: &RecordStore) -> StoreResult<()> {
        let map = self.map_mut(records)?;
        for tag in tags.iter().filter_map(|t| normalize_tag(t)) {
            map.entry(tag).or_default().insert(id.to_string());
        }
        self.persist()
    }

    /// Remove `tags` for `id`, dropping empty entries, and persist
    pub fn remove(&mut self, id: &str, tags: &[String], records: &RecordStore) -> StoreResult<()> {
        let map = self.map_mut(records)?;
        for tag in tags.iter().filter_map(|t| normalize_tag(t)) {
            if let Some(ids) = map.get_mut(&tag) {
                ids.remove(id);
                if ids.is_empty() {
                    map.remove(&tag);
                }
            }
        }
        self.persist()
    }

    /// Drop every entry for `id` (used on record deletion) and persist
    pub fn remove_record(&mut self, id: &str, records: &RecordStore) -> StoreResult<()> {
        let map = self.map_mut(records)?;
        map.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
        self.persist()
    }

    /// Query record ids by tags
    ///
    /// `match_all = false` unions the per-tag sets; `match_all = true`
    /// intersects them, short-circuiting to empty as soon as any tag has
    /// no records. Intersection starts from the smallest set so its cost
    /// is bounded by the rarest tag.
    pub fn query(
        &mut self,
        tags: &[String],
        match_all: bool,
        records: &RecordStore,
    ) -> StoreResult<BTreeSet<String>> {
        let map = self.map_mut(records)?;
        let normalized: Vec<String> = tags.iter().filter_map(|t| normalize_tag(t)).collect();
        if normalized.is_empty() {
            return Ok(BTreeSet::new());
        }

        if match_all {
            let mut sets = Vec::with_capacity(normalized.len());
            for tag in &normalized {
                match map.get(tag) {
                    Some(ids) if !ids.is_empty() => sets.push(ids),
                    _ => return Ok(BTreeSet::new()),
                }
            }
            sets.sort_by_key(|s| s.len());
            let mut result = sets[0].clone();
            for ids in &sets[1..] {
                result.retain(|id| ids.contains(id));
                if result.is_empty() {
                    break;
                }
            }
            Ok(result)
        } else {
            let mut result = BTreeSet::new();
            for tag in &normalized {
                if let Some(ids) = map.get(tag) {
                    result.extend(ids.iter().cloned());
                }
            }
            Ok(result)
        }
    }

    /// All tags with the number of records carrying each
    pub fn tags_with_counts(
        &mut self,
        records: &RecordStore,
    ) -> StoreResult<BTreeMap<String, usize>> {
        let map = self.map_mut(records)?;
        Ok(map.iter().map(|(t, ids)| (t.clone(), ids.len())).collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map_mut(&mut self, records: &RecordStore) -> StoreResult<&mut TagMap> {
        if matches!(self.state, IndexState::NeedsRebuild) {
            self.rebuild(records)?;
        }
        match &mut self.state {
            IndexState::Valid(map) => Ok(map),
            IndexState::NeedsRebuild => unreachable!("rebuild always leaves a valid map"),
        }
    }

    fn persist(&self) -> StoreResult<()> {
        let IndexState::Valid(map) = &self.state else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, json).map_err(|source| StoreError::WriteError {
            path: self.path.clone(),
            source,
        })
    }
}
