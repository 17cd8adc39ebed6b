//! Init command handler

use anyhow::{Context, Result};

use scrawl_core::{Config, GitAdapter};

use crate::output::Output;

/// Initialize the record repository
pub fn run(config: &Config, output: &Output) -> Result<()> {
    let vcs = GitAdapter::new(config.repo_path.clone());

    if vcs.is_initialized() {
        output.message(&format!(
            "Repository already initialized at {}",
            config.repo_path.display()
        ));
        return Ok(());
    }

    vcs.init().with_context(|| {
        format!(
            "Failed to initialize repository at {}",
            config.repo_path.display()
        )
    })?;

    output.success(&format!(
        "Initialized record repository at {}",
        config.repo_path.display()
    ));
    Ok(())
}
