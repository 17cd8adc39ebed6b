//! Auto-sync daemon
//!
//! Watches the repository on a fixed interval, sweeping uncommitted
//! changes into auto-commits and reconciling local edits that race its
//! own pending writes. One pass of the state machine lives in
//! [`AutoSyncDaemon::tick`], independent of what schedules it, so the
//! interval loop in [`spawn_daemon`] could be replaced by a filesystem
//! watcher without touching the cycle itself.
//!
//! States: Idle -> Scanning -> {Committing | Resolving} -> Idle, with
//! Resolving -> {Committing | WaitingForUser}. A failed cycle never
//! advances the sync cursor and never takes the process down; the next
//! tick retries.

mod conflict;
mod message;

pub use conflict::{ConflictLog, ConflictStrategy};
pub use message::{DisabledGenerator, LlmMessageGenerator, MessageGenerator};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::vcs::{CommitId, GitAdapter};

/// Where the daemon is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Scanning,
    Committing,
    Resolving,
    /// A conflict under the `manual` strategy awaits outside resolution
    WaitingForUser,
}

/// Result of one daemon cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing to do
    Clean,
    /// Changes were committed
    Committed { commit: CommitId, files: usize },
    /// Conflicts await manual resolution
    Waiting { conflicts: usize },
    /// The cycle failed and will be retried on the next tick
    Failed,
}

/// Last commit the daemon has reconciled, persisted across restarts
///
/// Distinguishes daemon-authored changes from concurrent external
/// edits: anything newer than the cursor was not the daemon's doing.
#[derive(Debug)]
pub struct SyncCursor {
    path: PathBuf,
    current: Option<CommitId>,
}

impl SyncCursor {
    pub fn load(path: PathBuf) -> Self {
        let current = fs::read_to_string(&path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(CommitId::new);
        Self { path, current }
    }

    pub fn get(&self) -> Option<&CommitId> {
        self.current.as_ref()
    }

    pub fn advance(&mut self, commit: CommitId) -> StoreResult<()> {
        fs::write(&self.path, commit.as_str()).map_err(|source| StoreError::WriteError {
            path: self.path.clone(),
            source,
        })?;
        self.current = Some(commit);
        Ok(())
    }
}

/// The auto-commit daemon's state machine
pub struct AutoSyncDaemon {
    vcs: GitAdapter,
    strategy: ConflictStrategy,
    generator: Box<dyn MessageGenerator>,
    cursor: SyncCursor,
    log: ConflictLog,
    state: DaemonState,
    waiting: Vec<PathBuf>,
}

impl AutoSyncDaemon {
    pub fn new(config: &Config) -> Self {
        Self {
            vcs: GitAdapter::new(config.repo_path.clone()),
            strategy: config.daemon.conflict_strategy,
            generator: message::from_settings(&config.daemon.llm),
            cursor: SyncCursor::load(config.cursor_path()),
            log: ConflictLog::new(config.conflict_log_path()),
            state: DaemonState::Idle,
            waiting: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn MessageGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    /// Run one cycle, swallowing errors
    ///
    /// Adapter failures are logged and reported as `Failed`; the cursor
    /// is not advanced, so the next tick retries from the same state.
    pub fn tick(&mut self) -> CycleOutcome {
        match self.run_cycle() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "daemon cycle failed, retrying next interval");
                if self.state != DaemonState::WaitingForUser {
                    self.state = DaemonState::Idle;
                }
                CycleOutcome::Failed
            }
        }
    }

    fn run_cycle(&mut self) -> StoreResult<CycleOutcome> {
        // A standing manual conflict blocks everything until it clears
        if self.state == DaemonState::WaitingForUser && !self.check_waiting()? {
            return Ok(CycleOutcome::Waiting {
                conflicts: self.waiting.len(),
            });
        }

        self.state = DaemonState::Scanning;
        let status = self.vcs.status()?;
        if status.is_clean() {
            self.state = DaemonState::Idle;
            return Ok(CycleOutcome::Clean);
        }

        let conflicts = self.vcs.conflicts()?;
        if !conflicts.is_empty() {
            self.state = DaemonState::Resolving;
            if self.strategy == ConflictStrategy::Manual {
                tracing::warn!(
                    count = conflicts.len(),
                    "conflicts require manual resolution; daemon is waiting"
                );
                for path in &conflicts {
                    tracing::warn!(path = %path.display(), "resolve and stage this file to continue");
                }
                self.waiting = conflicts;
                self.state = DaemonState::WaitingForUser;
                return Ok(CycleOutcome::Waiting {
                    conflicts: self.waiting.len(),
                });
            }
            for path in &conflicts {
                self.resolve(path)?;
            }
        }

        self.state = DaemonState::Committing;
        let changed = match self.cursor.get() {
            Some(cursor) => self
                .vcs
                .changed_files_since(cursor)
                .unwrap_or_else(|_| status.all_paths()),
            None => status.all_paths(),
        };
        self.vcs.stage_all()?;
        let fallback = format!("Auto-commit: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        let message = self.generator.generate(&changed, &fallback);

        let outcome = match self.vcs.commit(&message)? {
            Some(commit) => {
                self.cursor.advance(commit.clone())?;
                tracing::info!(commit = commit.short(), files = changed.len(), "auto-committed");
                CycleOutcome::Committed {
                    commit,
                    files: changed.len(),
                }
            }
            // Another writer got there first; nothing left to commit
            None => CycleOutcome::Clean,
        };
        self.state = DaemonState::Idle;
        Ok(outcome)
    }

    /// Re-check paths awaiting manual resolution
    ///
    /// Paths that no longer conflict get their log entry; returns true
    /// once the waiting list is empty and the cycle may proceed.
    fn check_waiting(&mut self) -> StoreResult<bool> {
        let current = self.vcs.conflicts()?;
        let mut still_waiting = Vec::new();
        for path in std::mem::take(&mut self.waiting) {
            if current.contains(&path) {
                still_waiting.push(path);
            } else {
                tracing::info!(path = %path.display(), "conflict resolved manually");
                self.log.append(ConflictStrategy::Manual, &path)?;
            }
        }
        if still_waiting.is_empty() {
            Ok(true)
        } else {
            tracing::warn!(
                count = still_waiting.len(),
                "still waiting for manual conflict resolution"
            );
            self.waiting = still_waiting;
            Ok(false)
        }
    }

    fn resolve(&mut self, path: &Path) -> StoreResult<()> {
        match self.strategy {
            ConflictStrategy::Ours => self.vcs.checkout_ours(path)?,
            ConflictStrategy::Theirs => self.vcs.checkout_theirs(path)?,
            ConflictStrategy::Timestamp => {
                if self.local_is_newer(path)? {
                    tracing::info!(path = %path.display(), "local version is newer, keeping it");
                    self.vcs.checkout_ours(path)?;
                } else {
                    tracing::info!(path = %path.display(), "committed version is newer, restoring it");
                    self.vcs.checkout_theirs(path)?;
                }
            }
            ConflictStrategy::Manual => unreachable!("manual conflicts never reach resolve()"),
        }
        self.log.append(self.strategy, path)?;
        Ok(())
    }

    /// Timestamp heuristic: file mtime vs the cursor's commit time
    ///
    /// Falls back to the path's last commit time when no cursor exists,
    /// and keeps the local side when no comparison is possible at all.
    fn local_is_newer(&self, path: &Path) -> StoreResult<bool> {
        let Some(mtime) = self.vcs.file_mtime(path) else {
            return Ok(true);
        };
        let reference = match self.cursor.get() {
            // The cursor commit can vanish under an external rebase or
            // reset; fall back to the path's own history instead of
            // failing every cycle
            Some(cursor) => match self.vcs.commit_time(cursor) {
                Ok(committed) => Some(committed),
                Err(e) => {
                    tracing::warn!(
                        cursor = cursor.short(),
                        error = %e,
                        "sync cursor commit unreadable, using path history"
                    );
                    self.vcs.last_commit_time_for(path)?
                }
            },
            None => self.vcs.last_commit_time_for(path)?,
        };
        Ok(match reference {
            Some(committed) => mtime > committed,
            None => true,
        })
    }
}

/// Commands accepted by a running daemon task
#[derive(Debug, Clone, Copy)]
pub enum DaemonCommand {
    /// Trigger a cycle outside the normal interval
    RunNow,
    /// Stop after the current cycle completes
    Shutdown,
}

/// Handle to a spawned daemon task
pub struct DaemonHandle {
    pub command_tx: mpsc::Sender<DaemonCommand>,
    pub status_rx: watch::Receiver<DaemonState>,
    pub task: JoinHandle<()>,
}

/// Run the daemon on a fixed interval as a background task
///
/// The first cycle runs immediately. Shutdown takes effect between
/// cycles only; a cycle in flight always completes (or fails) first.
/// Each cycle runs on the blocking pool since git work is
/// filesystem-bound.
pub fn spawn_daemon(daemon: AutoSyncDaemon, interval: Duration) -> DaemonHandle {
    let (command_tx, mut command_rx) = mpsc::channel(16);
    let (status_tx, status_rx) = watch::channel(DaemonState::Idle);

    let task = tokio::spawn(async move {
        let mut daemon = daemon;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match run_one_cycle(daemon, &status_tx).await {
                        Some(d) => daemon = d,
                        None => break,
                    }
                }
                cmd = command_rx.recv() => match cmd {
                    Some(DaemonCommand::RunNow) => {
                        match run_one_cycle(daemon, &status_tx).await {
                            Some(d) => daemon = d,
                            None => break,
                        }
                    }
                    Some(DaemonCommand::Shutdown) | None => {
                        tracing::info!("daemon stopping");
                        break;
                    }
                }
            }
        }
    });

    DaemonHandle {
        command_tx,
        status_rx,
        task,
    }
}

async fn run_one_cycle(
    mut daemon: AutoSyncDaemon,
    status_tx: &watch::Sender<DaemonState>,
) -> Option<AutoSyncDaemon> {
    match tokio::task::spawn_blocking(move || {
        let _ = daemon.tick();
        daemon
    })
    .await
    {
        Ok(daemon) => {
            let _ = status_tx.send(daemon.state());
            Some(daemon)
        }
        Err(e) => {
            tracing::error!(error = %e, "daemon cycle task aborted");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{git, git_env, init_repo, make_conflict};
    use tempfile::TempDir;

    fn daemon_for(dir: &TempDir, strategy: ConflictStrategy) -> AutoSyncDaemon {
        let config = Config {
            repo_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        AutoSyncDaemon::new(&config).with_strategy(strategy)
    }

    #[test]
    fn test_clean_tree_is_a_noop_cycle() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let mut daemon = daemon_for(&dir, ConflictStrategy::Timestamp);

        assert_eq!(daemon.tick(), CycleOutcome::Clean);
        assert_eq!(daemon.state(), DaemonState::Idle);
    }

    #[test]
    fn test_cycle_commits_changes_and_advances_cursor() {
        let dir = TempDir::new().unwrap();
        let vcs = init_repo(dir.path());
        let mut daemon = daemon_for(&dir, ConflictStrategy::Timestamp);

        std::fs::write(dir.path().join("records/note.txt"), "fresh").unwrap();
        let outcome = daemon.tick();
        let CycleOutcome::Committed { commit, files } = outcome else {
            panic!("expected a commit, got {outcome:?}");
        };
        assert_eq!(files, 1);
        assert_eq!(vcs.head().unwrap().unwrap(), commit);
        assert!(vcs.status().unwrap().is_clean());

        // Cursor persisted for the next process
        let cursor = std::fs::read_to_string(dir.path().join(".sync_cursor")).unwrap();
        assert_eq!(cursor.trim(), commit.as_str());

        // Default message template
        let subject = git(dir.path(), &["log", "-1", "--format=%s"]);
        assert!(subject.starts_with("Auto-commit: "), "subject: {subject}");
    }

    #[test]
    fn test_generated_message_is_used() {
        struct Fixed;
        impl MessageGenerator for Fixed {
            fn generate(&self, _files: &[PathBuf], _fallback: &str) -> String {
                "Summarized change".to_string()
            }
        }

        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let mut daemon =
            daemon_for(&dir, ConflictStrategy::Timestamp).with_generator(Box::new(Fixed));

        std::fs::write(dir.path().join("records/note.txt"), "fresh").unwrap();
        assert!(matches!(daemon.tick(), CycleOutcome::Committed { .. }));
        let subject = git(dir.path(), &["log", "-1", "--format=%s"]);
        assert_eq!(subject, "Summarized change");
    }

    #[test]
    fn test_ours_strategy_keeps_local_edit() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        make_conflict(dir.path(), "records/clash.txt", "local edit", "daemon side");
        let mut daemon = daemon_for(&dir, ConflictStrategy::Ours);

        assert!(matches!(daemon.tick(), CycleOutcome::Committed { .. }));
        let content = std::fs::read_to_string(dir.path().join("records/clash.txt")).unwrap();
        assert_eq!(content, "local edit");
        assert_eq!(daemon.log.entry_count(), 1);
    }

    #[test]
    fn test_theirs_strategy_restores_daemon_side() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        make_conflict(dir.path(), "records/clash.txt", "local edit", "daemon side");
        let mut daemon = daemon_for(&dir, ConflictStrategy::Theirs);

        assert!(matches!(daemon.tick(), CycleOutcome::Committed { .. }));
        let content = std::fs::read_to_string(dir.path().join("records/clash.txt")).unwrap();
        assert_eq!(content, "daemon side");
        assert_eq!(daemon.log.entry_count(), 1);
    }

    #[test]
    fn test_timestamp_strategy_prefers_newer_local_file() {
        let dir = TempDir::new().unwrap();
        let vcs = init_repo(dir.path());
        make_conflict(dir.path(), "records/clash.txt", "local edit", "daemon side");

        // Cursor points at the pre-conflict head; bump the file's mtime
        // past that commit's timestamp
        let head = vcs.head().unwrap().unwrap();
        std::fs::write(dir.path().join(".sync_cursor"), head.as_str()).unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        std::fs::write(dir.path().join("records/clash.txt"), "local edit").unwrap();

        let mut daemon = daemon_for(&dir, ConflictStrategy::Timestamp);
        assert!(matches!(daemon.tick(), CycleOutcome::Committed { .. }));
        let content = std::fs::read_to_string(dir.path().join("records/clash.txt")).unwrap();
        assert_eq!(content, "local edit");
        assert_eq!(daemon.log.entry_count(), 1);
    }

    #[test]
    fn test_timestamp_strategy_prefers_newer_commit() {
        let dir = TempDir::new().unwrap();
        let vcs = init_repo(dir.path());

        // Build a conflict whose final local commit is dated in the far
        // future, so the cursor's commit time beats any file mtime
        let file = dir.path().join("records/clash.txt");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "base\n").unwrap();
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-m", "base"]);
        let branch = git(dir.path(), &["symbolic-ref", "--short", "HEAD"]);
        git(dir.path(), &["checkout", "-b", "incoming"]);
        std::fs::write(&file, "daemon side").unwrap();
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-m", "incoming change"]);
        git(dir.path(), &["checkout", &branch]);
        std::fs::write(&file, "local edit").unwrap();
        git(dir.path(), &["add", "-A"]);
        git_env(
            dir.path(),
            &["commit", "-m", "local change"],
            &[("GIT_COMMITTER_DATE", "2099-01-01T00:00:00 +0000")],
        );
        let merge = std::process::Command::new("git")
            .arg("-C")
            .arg(dir.path())
            .args(["merge", "incoming"])
            .output()
            .unwrap();
        assert!(!merge.status.success());

        let head = vcs.head().unwrap().unwrap();
        std::fs::write(dir.path().join(".sync_cursor"), head.as_str()).unwrap();

        let mut daemon = daemon_for(&dir, ConflictStrategy::Timestamp);
        assert!(matches!(daemon.tick(), CycleOutcome::Committed { .. }));
        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(content, "daemon side");
    }

    #[test]
    fn test_timestamp_with_vanished_cursor_commit_still_resolves() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        make_conflict(dir.path(), "records/clash.txt", "local edit", "daemon side");

        // Cursor left pointing at a commit that no longer exists
        std::fs::write(
            dir.path().join(".sync_cursor"),
            "0123456789abcdef0123456789abcdef01234567",
        )
        .unwrap();

        let mut daemon = daemon_for(&dir, ConflictStrategy::Timestamp);
        let outcome = daemon.tick();
        assert!(matches!(outcome, CycleOutcome::Committed { .. }), "{outcome:?}");
        assert_eq!(daemon.state(), DaemonState::Idle);
        assert_eq!(daemon.log.entry_count(), 1);
    }

    #[test]
    fn test_manual_strategy_waits_across_cycles() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        make_conflict(dir.path(), "records/clash.txt", "local edit", "daemon side");
        let mut daemon = daemon_for(&dir, ConflictStrategy::Manual);

        assert_eq!(daemon.tick(), CycleOutcome::Waiting { conflicts: 1 });
        assert_eq!(daemon.state(), DaemonState::WaitingForUser);
        assert_eq!(daemon.log.entry_count(), 0);

        // Still unresolved on the next cycle
        assert_eq!(daemon.tick(), CycleOutcome::Waiting { conflicts: 1 });
        assert_eq!(daemon.state(), DaemonState::WaitingForUser);

        // User resolves outside the daemon
        git(dir.path(), &["checkout", "--ours", "--", "records/clash.txt"]);
        git(dir.path(), &["add", "records/clash.txt"]);

        let outcome = daemon.tick();
        assert!(matches!(outcome, CycleOutcome::Committed { .. }), "{outcome:?}");
        assert_eq!(daemon.state(), DaemonState::Idle);
        // Exactly one entry, written when the conflict cleared
        assert_eq!(daemon.log.entry_count(), 1);
    }

    #[test]
    fn test_adapter_failure_is_contained() {
        let dir = TempDir::new().unwrap();
        // No repository here at all
        let config = Config {
            repo_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        let mut daemon = AutoSyncDaemon::new(&config);

        assert_eq!(daemon.tick(), CycleOutcome::Failed);
        assert_eq!(daemon.state(), DaemonState::Idle);
        assert!(daemon.cursor.get().is_none());
    }

    #[tokio::test]
    async fn test_spawned_daemon_shuts_down_between_cycles() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let config = Config {
            repo_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        let daemon = AutoSyncDaemon::new(&config);

        let handle = spawn_daemon(daemon, Duration::from_secs(3600));
        handle
            .command_tx
            .send(DaemonCommand::Shutdown)
            .await
            .unwrap();
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_now_triggers_a_cycle() {
        let dir = TempDir::new().unwrap();
        let vcs = init_repo(dir.path());
        let base = vcs.head().unwrap().unwrap();
        let config = Config {
            repo_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        let daemon = AutoSyncDaemon::new(&config);

        std::fs::write(dir.path().join("records/new.txt"), "x").unwrap();
        let handle = spawn_daemon(daemon, Duration::from_secs(3600));
        handle.command_tx.send(DaemonCommand::RunNow).await.unwrap();
        handle
            .command_tx
            .send(DaemonCommand::Shutdown)
            .await
            .unwrap();
        handle.task.await.unwrap();

        assert_ne!(vcs.head().unwrap().unwrap(), base);
        assert!(vcs.status().unwrap().is_clean());
    }
}
