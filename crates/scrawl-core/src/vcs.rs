//! VCS adapter
//!
//! Wraps the external git repository by shelling out to the `git`
//! binary. Shelling out keeps behavior identical to what a user sees on
//! the command line and makes failures debuggable; the records involved
//! are small text files, so subprocess overhead is irrelevant here.
//!
//! No business logic lives in this module: it stages, commits, reports
//! status, and resolves file-level conflicts, nothing more.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AdapterError, AdapterResult};

/// An immutable commit reference (full sha)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated sha for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Working-tree status as three disjoint sets
///
/// A path appears in exactly one set; a file that is both staged and
/// modified again is reported as staged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VcsStatus {
    /// Tracked files changed but not staged
    pub modified: Vec<PathBuf>,
    /// Files git does not know about yet
    pub untracked: Vec<PathBuf>,
    /// Files staged for the next commit
    pub staged: Vec<PathBuf>,
}

impl VcsStatus {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.untracked.is_empty() && self.staged.is_empty()
    }

    /// All paths in one list, for commit-message context
    pub fn all_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        paths.extend(self.staged.iter().cloned());
        paths.extend(self.modified.iter().cloned());
        paths.extend(self.untracked.iter().cloned());
        paths
    }
}

/// Adapter over a git repository rooted at `repo_path`
#[derive(Debug, Clone)]
pub struct GitAdapter {
    repo_path: PathBuf,
}

impl GitAdapter {
    pub fn new(repo_path: PathBuf) -> Self {
        Self { repo_path }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Whether `repo_path` is inside a git repository
    pub fn is_initialized(&self) -> bool {
        self.run(&["rev-parse", "--git-dir"]).is_ok()
    }

    /// Initialize the repository and seed its structure
    ///
    /// Creates the directory, runs `git init`, writes a `.gitignore`
    /// covering scrawl's local-only state files and a README, then makes
    /// the initial commit. Safe to call on an existing repository.
    pub fn init(&self) -> AdapterResult<()> {
        fs::create_dir_all(&self.repo_path)?;
        if !self.is_initialized() {
            self.run(&["init"])?;
        }
        fs::create_dir_all(self.repo_path.join("records"))?;

        let gitignore = self.repo_path.join(".gitignore");
        if !gitignore.exists() {
            fs::write(
                &gitignore,
                "# scrawl local state\n.batch_counter\n.sync_cursor\n*.tmp\n.DS_Store\n",
            )?;
        }
        let readme = self.repo_path.join("README.md");
        if !readme.exists() {
            fs::write(
                &readme,
                "# scrawl repository\n\nThis repository stores text records managed by scrawl.\n",
            )?;
        }

        self.stage(&[".gitignore", "README.md"])?;
        self.commit("Initial commit")?;
        Ok(())
    }

    /// Stage specific paths (relative to the repository root)
    ///
    /// Fails with `PathspecMissing` when a path neither exists on disk
    /// nor is a tracked file pending deletion.
    pub fn stage<P: AsRef<Path>>(&self, paths: &[P]) -> AdapterResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<String> = vec!["add".to_string(), "--".to_string()];
        for path in paths {
            let path = path.as_ref();
            if !self.repo_path.join(path).exists() && !self.is_tracked(path)? {
                return Err(AdapterError::PathspecMissing {
                    path: path.to_path_buf(),
                });
            }
            args.push(path.to_string_lossy().into_owned());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;
        Ok(())
    }

    /// Stage everything, deletions included
    pub fn stage_all(&self) -> AdapterResult<()> {
        self.run(&["add", "-A"])?;
        Ok(())
    }

    /// Commit staged changes
    ///
    /// Returns `None` without committing when nothing is staged, so
    /// callers racing each other degrade to a no-op rather than an
    /// error. A pending merge is always committed, even when every
    /// conflict was resolved back to the HEAD content.
    pub fn commit(&self, message: &str) -> AdapterResult<Option<CommitId>> {
        if !self.has_staged()? && !self.merge_in_progress()? {
            return Ok(None);
        }
        self.run(&["commit", "-m", message])?;
        self.head()
    }

    /// Whether an unconcluded merge is pending
    pub fn merge_in_progress(&self) -> AdapterResult<bool> {
        let output = self.output(&["rev-parse", "-q", "--verify", "MERGE_HEAD"])?;
        Ok(output.status.success())
    }

    /// Current working-tree status, parsed from `git status --porcelain`
    pub fn status(&self) -> AdapterResult<VcsStatus> {
        let out = self.run(&["status", "--porcelain"])?;
        let mut status = VcsStatus::default();
        for line in out.lines() {
            if line.len() < 4 {
                continue;
            }
            let (flags, rest) = line.split_at(2);
            let path = parse_porcelain_path(&rest[1..]);
            if flags == "??" {
                status.untracked.push(path);
            } else if !flags.starts_with(' ') {
                status.staged.push(path);
            } else {
                status.modified.push(path);
            }
        }
        Ok(status)
    }

    /// Whether anything is uncommitted (modified, untracked, or staged)
    pub fn has_changes(&self) -> AdapterResult<bool> {
        Ok(!self.status()?.is_clean())
    }

    /// Human-readable patch of unstaged (or staged) changes
    pub fn diff(&self, staged: bool) -> AdapterResult<String> {
        if staged {
            self.run(&["diff", "--cached"])
        } else {
            self.run(&["diff"])
        }
    }

    /// Paths touched between `since` and the current working state
    ///
    /// Committed-or-modified paths come from `git diff --name-only`;
    /// untracked files are appended from status. Lets the daemon see
    /// what changed without rescanning the whole tree.
    pub fn changed_files_since(&self, since: &CommitId) -> AdapterResult<Vec<PathBuf>> {
        let out = self.run(&["diff", "--name-only", since.as_str()])?;
        let mut paths: Vec<PathBuf> = out.lines().map(PathBuf::from).collect();
        for path in self.status()?.untracked {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Paths with an unresolved merge conflict
    pub fn conflicts(&self) -> AdapterResult<Vec<PathBuf>> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(out.lines().map(PathBuf::from).collect())
    }

    /// Resolve a conflicted path by keeping the local (working) side
    ///
    /// No-op when the path has no pending conflict.
    pub fn checkout_ours(&self, path: &Path) -> AdapterResult<()> {
        self.checkout_side(path, "--ours")
    }

    /// Resolve a conflicted path by restoring the incoming side
    ///
    /// No-op when the path has no pending conflict.
    pub fn checkout_theirs(&self, path: &Path) -> AdapterResult<()> {
        self.checkout_side(path, "--theirs")
    }

    /// Current HEAD commit, `None` on an unborn branch
    ///
    /// Only the unborn-branch failure maps to `None`; any other
    /// rev-parse failure means the repository is damaged and surfaces
    /// as an error.
    pub fn head(&self) -> AdapterResult<Option<CommitId>> {
        match self.run(&["rev-parse", "--verify", "HEAD"]) {
            Ok(sha) => Ok(Some(CommitId::new(sha))),
            Err(AdapterError::Command { stderr, .. })
                if stderr.contains("Needed a single revision")
                    || stderr.contains("unknown revision")
                    || stderr.contains("ambiguous argument") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Committer timestamp of a commit
    pub fn commit_time(&self, id: &CommitId) -> AdapterResult<DateTime<Utc>> {
        let out = self.run(&["show", "-s", "--format=%ct", id.as_str()])?;
        parse_unix_time(&out).ok_or_else(|| AdapterError::UnexpectedOutput {
            command: format!("show -s --format=%ct {id}"),
            details: out,
        })
    }

    /// Committer timestamp of the last commit touching `path`
    pub fn last_commit_time_for(&self, path: &Path) -> AdapterResult<Option<DateTime<Utc>>> {
        let out = self.run(&[
            "log",
            "-1",
            "--format=%ct",
            "--",
            &path.to_string_lossy(),
        ])?;
        Ok(parse_unix_time(&out))
    }

    /// Filesystem mtime of a path inside the repository
    pub fn file_mtime(&self, path: &Path) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(self.repo_path.join(path)).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    fn checkout_side(&self, path: &Path, side: &str) -> AdapterResult<()> {
        if !self.conflicts()?.iter().any(|p| p == path) {
            return Ok(());
        }
        let path_str = path.to_string_lossy();
        self.run(&["checkout", side, "--", &path_str])?;
        self.run(&["add", "--", &path_str])?;
        Ok(())
    }

    fn is_tracked(&self, path: &Path) -> AdapterResult<bool> {
        let out = self.run(&["ls-files", "--", &path.to_string_lossy()])?;
        Ok(!out.is_empty())
    }

    fn has_staged(&self) -> AdapterResult<bool> {
        // Exit code 1 means the staged tree differs from HEAD
        let output = self.output(&["diff", "--cached", "--quiet"])?;
        Ok(!output.status.success())
    }

    fn run(&self, args: &[&str]) -> AdapterResult<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("not a git repository") {
                return Err(AdapterError::NotARepository {
                    path: self.repo_path.clone(),
                });
            }
            return Err(AdapterError::Command {
                command: args.join(" "),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn output(&self, args: &[&str]) -> AdapterResult<Output> {
        Command::new("git")
            .arg("-C")
            .arg(&self.repo_path)
            .args(args)
            .output()
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => AdapterError::GitUnavailable { source },
                _ => AdapterError::Io(source),
            })
    }
}

/// Strip porcelain quoting and rename arrows from a status path
fn parse_porcelain_path(raw: &str) -> PathBuf {
    let raw = match raw.split_once(" -> ") {
        Some((_, new)) => new,
        None => raw,
    };
    let raw = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')).unwrap_or(raw);
    PathBuf::from(raw)
}

fn parse_unix_time(out: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = out.trim().parse().ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0)
}
