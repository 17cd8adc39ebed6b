//! Doctor command handler

use anyhow::Result;

use scrawl_core::Store;

use crate::output::{Output, OutputFormat};

/// Run a consistency pass over the repository
pub fn run(store: &Store, prune: bool, output: &Output) -> Result<()> {
    let initialized = store.vcs().is_initialized();
    let report = store.check()?;
    let pending = store.pending_writes();

    if output.format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::json!({
                "repository_initialized": initialized,
                "orphaned_content": report.orphaned_content,
                "pending_writes": pending,
                "clean": initialized && report.is_clean()
            })
        );
    } else {
        if initialized {
            output.message("Repository: ok");
        } else {
            output.message("Repository: NOT initialized (run `scrawl init`)");
        }
        if report.is_clean() {
            output.message("Records: every content file has a metadata document");
        } else {
            output.message(&format!(
                "Records: {} orphaned content file(s) with no metadata:",
                report.orphaned_content.len()
            ));
            for id in &report.orphaned_content {
                output.message(&format!("  {id}"));
            }
        }
        if pending > 0 {
            output.message(&format!("Batch: {pending} write(s) awaiting commit"));
        }
    }

    if prune && !report.is_clean() {
        let pruned = store.prune_orphans()?;
        output.success(&format!("Pruned {} orphaned file(s)", pruned.len()));
    }

    Ok(())
}
