//! Unified storage interface
//!
//! The `Store` ties the components together for foreground writers:
//! record files, the tag index, and the batch commit coordinator, all
//! rooted in one git-backed repository.
//!
//! Every mutation funnels through here so the write path stays
//! serialized within a process: persist record, update index, update
//! counter, in that order, under one `&mut self` section. Across
//! processes there is deliberately no lock; the auto-sync daemon's
//! conflict resolution reconciles divergent on-disk state instead.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open()?;
//!
//! let saved = store.save(RecordDraft {
//!     name: Some("greeting".into()),
//!     content: "hello".into(),
//!     tags: vec!["demo".into()],
//!     ..Default::default()
//! })?;
//!
//! let record = store.load(&saved.id)?;
//! ```

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context;

use crate::batch::BatchCoordinator;
use crate::config::Config;
use crate::error::StoreResult;
use crate::index::TagIndex;
use crate::record::{ConsistencyReport, Record, RecordDraft, RecordStore, RecordSummary};
use crate::vcs::{CommitId, GitAdapter, VcsStatus};

/// Result of saving one record
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// The assigned record id
    pub id: String,
    /// The flush commit, when this write triggered one
    pub committed: Option<CommitId>,
    /// Writes still pending in the current batch
    pub pending: u32,
}

/// Storage facade over records, tag index, batching, and the VCS
pub struct Store {
    config: Config,
    records: RecordStore,
    index: TagIndex,
    batch: BatchCoordinator,
    vcs: GitAdapter,
}

impl Store {
    /// Open the store using the default configuration
    pub fn open() -> anyhow::Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Ok(Self::open_with_config(config)?)
    }

    /// Open the store with a specific configuration
    ///
    /// Creates the records directory if needed and opens (or rebuilds)
    /// the tag index. Git operations fail with `NotARepository` until
    /// the repository has been initialized.
    pub fn open_with_config(config: Config) -> StoreResult<Self> {
        let records = RecordStore::new(config.records_dir())?;
        let index = TagIndex::open(config.index_path(), &records)?;
        let batch = BatchCoordinator::new(
            config.counter_path(),
            config.batch.enabled,
            config.batch.threshold,
        );
        let vcs = GitAdapter::new(config.repo_path.clone());
        Ok(Self {
            config,
            records,
            index,
            batch,
            vcs,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vcs(&self) -> &GitAdapter {
        &self.vcs
    }

    /// Save a record, update the index, and notify the coordinator
    pub fn save(&mut self, draft: RecordDraft) -> StoreResult<SaveOutcome> {
        let meta = self.records.save(&draft)?;
        let tags: Vec<String> = meta.tags.iter().cloned().collect();
        self.index.add(&meta.id, &tags, &self.records)?;
        let outcome = self.batch.record_write(&self.vcs)?;
        tracing::debug!(id = %meta.id, pending = outcome.pending, "saved record");
        Ok(SaveOutcome {
            id: meta.id,
            committed: outcome.committed,
            pending: outcome.pending,
        })
    }

    /// Save a record and commit it immediately, bypassing batching
    ///
    /// The commit message names the record. Any writes already pending
    /// in the batch get swept into the same commit; the counter is left
    /// alone and the next flush becomes a no-op for them.
    pub fn save_now(&mut self, draft: RecordDraft) -> StoreResult<SaveOutcome> {
        let meta = self.records.save(&draft)?;
        let tags: Vec<String> = meta.tags.iter().cloned().collect();
        self.index.add(&meta.id, &tags, &self.records)?;
        let message = format!("Save record: {}", meta.id);
        let committed = self.commit_now(&message)?;
        Ok(SaveOutcome {
            id: meta.id,
            committed,
            pending: self.batch.pending(),
        })
    }

    pub fn load(&self, id: &str) -> StoreResult<Record> {
        self.records.load(id)
    }

    /// Lazy record summaries; never loads content
    pub fn list(&self) -> StoreResult<impl Iterator<Item = RecordSummary>> {
        self.records.list()
    }

    /// Delete a record and its index entries; counts as a write
    pub fn delete(&mut self, id: &str) -> StoreResult<SaveOutcome> {
        self.records.delete(id)?;
        self.index.remove_record(id, &self.records)?;
        let outcome = self.batch.record_write(&self.vcs)?;
        Ok(SaveOutcome {
            id: id.to_string(),
            committed: outcome.committed,
            pending: outcome.pending,
        })
    }

    /// Add tags to an existing record, returning its full tag set
    pub fn add_tags(&mut self, id: &str, tags: &[String]) -> StoreResult<BTreeSet<String>> {
        let mut meta = self.records.load_meta(id)?;
        meta.tags
            .extend(tags.iter().filter_map(|t| crate::index::normalize_tag(t)));
        self.records.write_meta(&meta)?;
        self.index.add(id, tags, &self.records)?;
        Ok(meta.tags)
    }

    /// Remove tags from an existing record, returning its full tag set
    pub fn remove_tags(&mut self, id: &str, tags: &[String]) -> StoreResult<BTreeSet<String>> {
        let mut meta = self.records.load_meta(id)?;
        for tag in tags.iter().filter_map(|t| crate::index::normalize_tag(t)) {
            meta.tags.remove(&tag);
        }
        self.records.write_meta(&meta)?;
        self.index.remove(id, tags, &self.records)?;
        Ok(meta.tags)
    }

    pub fn get_tags(&self, id: &str) -> StoreResult<BTreeSet<String>> {
        Ok(self.records.load_meta(id)?.tags)
    }

    /// Query record ids by tags (union, or intersection with `match_all`)
    pub fn query(&mut self, tags: &[String], match_all: bool) -> StoreResult<BTreeSet<String>> {
        self.index.query(tags, match_all, &self.records)
    }

    pub fn tags_with_counts(&mut self) -> StoreResult<BTreeMap<String, usize>> {
        self.index.tags_with_counts(&self.records)
    }

    /// Force a full index rebuild from the metadata documents
    pub fn rebuild_index(&mut self) -> StoreResult<()> {
        self.index.rebuild(&self.records)
    }

    pub fn vcs_status(&self) -> StoreResult<VcsStatus> {
        Ok(self.vcs.status()?)
    }

    pub fn diff(&self, staged: bool) -> StoreResult<String> {
        Ok(self.vcs.diff(staged)?)
    }

    /// Writes pending in the current batch
    pub fn pending_writes(&self) -> u32 {
        self.batch.pending()
    }

    /// Stage everything and commit immediately, bypassing batching
    pub fn commit_now(&self, message: &str) -> StoreResult<Option<CommitId>> {
        self.vcs.stage_all()?;
        Ok(self.vcs.commit(message)?)
    }

    /// Flush any pending batch with an explicit reason
    pub fn flush(&mut self, reason: &str) -> StoreResult<Option<CommitId>> {
        self.batch.flush(&self.vcs, reason)
    }

    /// Consistency pass: find content files with no metadata document
    pub fn check(&self) -> StoreResult<ConsistencyReport> {
        self.records.check()
    }

    /// Remove orphaned content files, returning the pruned ids
    pub fn prune_orphans(&self) -> StoreResult<Vec<String>> {
        self.records.prune_orphans()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchSettings;
    use crate::error::StoreError;
    use crate::testutil::init_repo;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir, enabled: bool, threshold: u32) -> Store {
        init_repo(dir.path());
        let config = Config {
            repo_path: dir.path().to_path_buf(),
            batch: BatchSettings { enabled, threshold },
            ..Config::default()
        };
        Store::open_with_config(config).unwrap()
    }

    fn draft(name: &str, content: &str, tags: &[&str]) -> RecordDraft {
        RecordDraft {
            name: Some(name.to_string()),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_save_load_round_trip_preserves_content_and_tags() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, false, 1);

        let saved = store.save(draft("a", "x", &["p", "q"])).unwrap();
        assert_eq!(saved.id, "a");
        // Batching disabled: committed immediately
        assert!(saved.committed.is_some());

        let record = store.load("a").unwrap();
        assert_eq!(record.content, "x");
        assert_eq!(
            record.meta.tags,
            BTreeSet::from(["p".to_string(), "q".to_string()])
        );
    }

    #[test]
    fn test_query_scenarios() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, false, 1);
        store.save(draft("A", "x", &["p", "q"])).unwrap();

        let hits = store.query(&tags(&["p"]), false).unwrap();
        assert_eq!(hits, BTreeSet::from(["A".to_string()]));

        let hits = store.query(&tags(&["p", "z"]), true).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_threshold_three_saves_one_commit() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, true, 3);
        let base = store.vcs().head().unwrap().unwrap();

        let first = store.save(draft("r1", "one", &[])).unwrap();
        assert!(first.committed.is_none());
        assert_eq!(first.pending, 1);
        let second = store.save(draft("r2", "two", &[])).unwrap();
        assert!(second.committed.is_none());
        let third = store.save(draft("r3", "three", &[])).unwrap();
        assert!(third.committed.is_some());
        assert_eq!(third.pending, 0);

        let range = format!("{base}..{}", third.committed.unwrap());
        let commits = crate::testutil::git(dir.path(), &["rev-list", "--count", &range]);
        assert_eq!(commits, "1");
        assert!(store.vcs_status().unwrap().is_clean());

        // Fourth save starts a fresh batch of one
        let fourth = store.save(draft("r4", "four", &[])).unwrap();
        assert!(fourth.committed.is_none());
        assert_eq!(fourth.pending, 1);
        assert_eq!(store.pending_writes(), 1);
    }

    #[test]
    fn test_save_now_bypasses_batching() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, true, 100);

        let saved = store.save_now(draft("urgent", "x", &[])).unwrap();
        assert!(saved.committed.is_some());
        assert!(store.vcs_status().unwrap().is_clean());
        let subject = crate::testutil::git(dir.path(), &["log", "-1", "--format=%s"]);
        assert_eq!(subject, "Save record: urgent");
    }

    #[test]
    fn test_delete_removes_index_entries() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, false, 1);
        store.save(draft("a", "x", &["p"])).unwrap();
        store.save(draft("b", "y", &["p"])).unwrap();

        store.delete("a").unwrap();
        let hits = store.query(&tags(&["p"]), false).unwrap();
        assert_eq!(hits, BTreeSet::from(["b".to_string()]));
        assert!(matches!(
            store.load("a"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_tag_updates_persist_to_metadata() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, false, 1);
        store.save(draft("a", "x", &["start"])).unwrap();

        let tags_now = store.add_tags("a", &tags(&["Extra", "more"])).unwrap();
        assert!(tags_now.contains("extra"));
        // Visible through a fresh metadata read
        assert_eq!(store.get_tags("a").unwrap(), tags_now);

        let tags_now = store.remove_tags("a", &tags(&["start"])).unwrap();
        assert!(!tags_now.contains("start"));
        let hits = store.query(&tags(&["start"]), false).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_tagging_missing_record_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, false, 1);
        let err = store.add_tags("ghost", &tags(&["t"])).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_list_reports_summaries_only() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, true, 100);
        store.save(draft("a", "x", &["p"])).unwrap();
        store.save(draft("b", "y", &[])).unwrap();

        let mut ids: Vec<String> = store.list().unwrap().map(|s| s.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_rebuild_index_recovers_deleted_document() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, true, 100);
        store.save(draft("a", "x", &["p"])).unwrap();

        std::fs::remove_file(store.config().index_path()).unwrap();
        store.rebuild_index().unwrap();
        let hits = store.query(&tags(&["p"]), false).unwrap();
        assert_eq!(hits, BTreeSet::from(["a".to_string()]));
    }

    #[test]
    fn test_explicit_flush_commits_pending_batch() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, true, 100);
        store.save(draft("a", "x", &[])).unwrap();
        assert_eq!(store.pending_writes(), 1);

        let commit = store.flush("manual flush").unwrap();
        assert!(commit.is_some());
        assert_eq!(store.pending_writes(), 0);
        assert!(store.vcs_status().unwrap().is_clean());
    }
}
