//! Status and diff command handlers

use anyhow::Result;

use scrawl_core::Store;

use crate::output::{Output, OutputFormat};

/// Show repository status and batch state
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let status = store.vcs_status()?;
    let head = store.vcs().head()?;
    let pending = store.pending_writes();
    let config = store.config();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "repo": config.repo_path,
                    "head": head.as_ref().map(|c| c.as_str()),
                    "clean": status.is_clean(),
                    "modified": status.modified,
                    "untracked": status.untracked,
                    "staged": status.staged,
                    "batch": {
                        "enabled": config.batch.enabled,
                        "threshold": config.batch.threshold,
                        "pending_writes": pending
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            for path in status.all_paths() {
                println!("{}", path.display());
            }
        }
        OutputFormat::Human => {
            println!("Scrawl Status");
            println!("=============");
            println!();
            println!("Repository: {}", config.repo_path.display());
            if let Some(head) = &head {
                println!("Head:       {}", head.short());
            }
            println!();
            if status.is_clean() {
                println!("Working tree clean.");
            } else {
                print_paths("Staged", &status.staged);
                print_paths("Modified", &status.modified);
                print_paths("Untracked", &status.untracked);
            }
            println!();
            if config.batch.enabled {
                println!(
                    "Batching: enabled ({} pending, commits every {})",
                    pending, config.batch.threshold
                );
            } else {
                println!("Batching: disabled (every write commits)");
            }
        }
    }

    Ok(())
}

/// Show uncommitted changes
pub fn diff(store: &Store, staged: bool, output: &Output) -> Result<()> {
    let text = store.diff(staged)?;
    if text.trim().is_empty() {
        output.message("No changes.");
    } else {
        print!("{text}");
    }
    Ok(())
}

fn print_paths(label: &str, paths: &[std::path::PathBuf]) {
    if paths.is_empty() {
        return;
    }
    println!("{} ({}):", label, paths.len());
    for path in paths {
        println!("  {}", path.display());
    }
}
