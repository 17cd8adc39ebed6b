//! Shared helpers for tests that need a real git repository

use std::path::Path;
use std::process::Command;

use crate::vcs::GitAdapter;

/// Run a git command in `dir`, panicking on failure
pub(crate) fn git(dir: &Path, args: &[&str]) -> String {
    git_env(dir, args, &[])
}

/// Run a git command with extra environment variables set
pub(crate) fn git_env(dir: &Path, args: &[&str], envs: &[(&str, &str)]) -> String {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(dir).args(args);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    let output = cmd.output().expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialize a repository with a committer identity usable in CI
pub(crate) fn init_repo(dir: &Path) -> GitAdapter {
    // Commits in tests must not depend on the host's git config
    std::env::set_var("GIT_AUTHOR_NAME", "scrawl tests");
    std::env::set_var("GIT_AUTHOR_EMAIL", "tests@scrawl.invalid");
    std::env::set_var("GIT_COMMITTER_NAME", "scrawl tests");
    std::env::set_var("GIT_COMMITTER_EMAIL", "tests@scrawl.invalid");

    let adapter = GitAdapter::new(dir.to_path_buf());
    adapter.init().expect("init test repo");
    adapter
}

/// Leave `file` in an unresolved merge-conflict state
///
/// The working tree ends up mid-merge: the local branch holds `ours`,
/// the merged-in branch holds `theirs`, and `git status` reports the
/// path as unmerged.
pub(crate) fn make_conflict(dir: &Path, file: &str, ours: &str, theirs: &str) {
    if let Some(parent) = Path::new(file).parent() {
        std::fs::create_dir_all(dir.join(parent)).unwrap();
    }
    std::fs::write(dir.join(file), "base\n").unwrap();
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-m", "base"]);

    let branch = git(dir, &["symbolic-ref", "--short", "HEAD"]);
    git(dir, &["checkout", "-b", "incoming"]);
    std::fs::write(dir.join(file), theirs).unwrap();
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-m", "incoming change"]);

    git(dir, &["checkout", &branch]);
    std::fs::write(dir.join(file), ours).unwrap();
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-m", "local change"]);

    // Merge is expected to fail with a conflict
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["merge", "incoming"])
        .output()
        .expect("failed to run git merge");
    assert!(!status.status.success(), "merge unexpectedly succeeded");
    // checkout --ours/--theirs needs the working copy, not the markers
    std::fs::write(dir.join(file), ours).unwrap();
}
