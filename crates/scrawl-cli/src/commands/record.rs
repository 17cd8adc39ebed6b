//! Record command handlers

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use scrawl_core::{RecordDraft, Store};

use crate::output::Output;

/// Save a record from an inline message, a file, or stdin
#[allow(clippy::too_many_arguments)]
pub fn save(
    store: &mut Store,
    name: Option<String>,
    tags: Vec<String>,
    file: Option<PathBuf>,
    message: Option<String>,
    description: Option<String>,
    no_batch: bool,
    output: &Output,
) -> Result<()> {
    let content = match (message, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => {
            if atty::is(atty::Stream::Stdin) {
                bail!("No content given; pass --message, --file, or pipe stdin");
            }
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };
    if content.trim().is_empty() {
        bail!("Refusing to save an empty record");
    }

    let mut extra = serde_json::Map::new();
    if let Some(description) = description {
        extra.insert(
            "description".to_string(),
            serde_json::Value::String(description),
        );
    }

    let draft = RecordDraft {
        name,
        content,
        tags,
        extra,
    };

    let saved = if no_batch {
        store.save_now(draft)?
    } else {
        store.save(draft)?
    };

    match &saved.committed {
        Some(commit) => output.success(&format!(
            "Saved record {} (committed as {})",
            saved.id,
            commit.short()
        )),
        None => output.success(&format!(
            "Saved record {} ({} write(s) pending in batch)",
            saved.id, saved.pending
        )),
    }
    if output.format == crate::output::OutputFormat::Quiet {
        println!("{}", saved.id);
    }
    Ok(())
}

/// Show a single record
pub fn show(store: &Store, id: &str, output: &Output) -> Result<()> {
    let record = store
        .load(id)
        .with_context(|| format!("Failed to load record: {id}"))?;
    output.print_record(&record);
    Ok(())
}

/// List records, optionally filtered by tags
pub fn list(store: &mut Store, tags: Vec<String>, all_tags: bool, output: &Output) -> Result<()> {
    let mut summaries: Vec<_> = if tags.is_empty() {
        store.list()?.collect()
    } else {
        let ids = store.query(&tags, all_tags)?;
        store.list()?.filter(|s| ids.contains(&s.id)).collect()
    };
    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    output.print_summaries(&summaries);
    Ok(())
}

/// Delete a record
pub fn delete(store: &mut Store, id: &str, output: &Output) -> Result<()> {
    let outcome = store
        .delete(id)
        .with_context(|| format!("Failed to delete record: {id}"))?;
    match outcome.committed {
        Some(commit) => output.success(&format!(
            "Deleted record {id} (committed as {})",
            commit.short()
        )),
        None => output.success(&format!(
            "Deleted record {id} ({} write(s) pending in batch)",
            outcome.pending
        )),
    }
    Ok(())
}
