//! Daemon command handler

use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use scrawl_core::daemon::{spawn_daemon, AutoSyncDaemon, DaemonCommand};
use scrawl_core::{Config, GitAdapter};

use crate::output::Output;

/// Run the auto-sync daemon until Ctrl-C
///
/// Shutdown is clean: a cycle in flight always finishes before the task
/// stops, so the repository is never left mid-resolution.
pub async fn run(
    mut config: Config,
    interval: Option<u64>,
    strategy: Option<String>,
    llm: bool,
    llm_model: Option<String>,
    output: &Output,
) -> Result<()> {
    if let Some(secs) = interval {
        config.daemon.interval_secs = secs.max(1);
    }
    if let Some(name) = strategy {
        config.daemon.conflict_strategy = name.parse().map_err(|e: String| anyhow!(e))?;
    }
    if llm {
        config.daemon.llm.enabled = true;
    }
    if let Some(model) = llm_model {
        config.daemon.llm.model = model;
    }

    let vcs = GitAdapter::new(config.repo_path.clone());
    if !vcs.is_initialized() {
        bail!(
            "No repository at {}. Run `scrawl init` first.",
            config.repo_path.display()
        );
    }

    output.message(&format!(
        "Auto-sync daemon running every {}s ({} strategy). Ctrl-C to stop.",
        config.daemon.interval_secs, config.daemon.conflict_strategy
    ));

    let daemon = AutoSyncDaemon::new(&config);
    let handle = spawn_daemon(
        daemon,
        Duration::from_secs(config.daemon.interval_secs),
    );

    tokio::signal::ctrl_c().await?;
    output.message("Stopping after the current cycle...");
    let _ = handle.command_tx.send(DaemonCommand::Shutdown).await;
    handle.task.await?;
    output.success("Daemon stopped");
    Ok(())
}
