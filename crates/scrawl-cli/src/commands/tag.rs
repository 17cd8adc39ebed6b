//! Tag command handlers

use anyhow::{Context, Result};

use scrawl_core::Store;

use crate::output::Output;

/// Add tags to a record
pub fn add(
    store: &mut Store,
    id: &str,
    tags: Vec<String>,
    no_commit: bool,
    output: &Output,
) -> Result<()> {
    let all = store
        .add_tags(id, &tags)
        .with_context(|| format!("Failed to tag record: {id}"))?;
    if !no_commit {
        let message = format!("Add tags to {id}: {}", tags.join(", "));
        store.commit_now(&message)?;
    }
    output.success(&format!(
        "Tags for {id}: {}",
        all.into_iter().collect::<Vec<_>>().join(", ")
    ));
    Ok(())
}

/// Remove tags from a record
pub fn remove(
    store: &mut Store,
    id: &str,
    tags: Vec<String>,
    no_commit: bool,
    output: &Output,
) -> Result<()> {
    let all = store
        .remove_tags(id, &tags)
        .with_context(|| format!("Failed to untag record: {id}"))?;
    if !no_commit {
        let message = format!("Remove tags from {id}: {}", tags.join(", "));
        store.commit_now(&message)?;
    }
    let remaining = all.into_iter().collect::<Vec<_>>().join(", ");
    if remaining.is_empty() {
        output.success(&format!("Record {id} has no tags left"));
    } else {
        output.success(&format!("Tags for {id}: {remaining}"));
    }
    Ok(())
}

/// List all tags with usage counts, or one record's tags
pub fn list(store: &mut Store, id: Option<String>, output: &Output) -> Result<()> {
    match id {
        Some(id) => {
            let tags = store
                .get_tags(&id)
                .with_context(|| format!("Failed to load record: {id}"))?;
            match output.format {
                crate::output::OutputFormat::Json => {
                    let list: Vec<_> = tags.iter().collect();
                    println!("{}", serde_json::to_string_pretty(&list)?);
                }
                _ => {
                    for tag in &tags {
                        println!("{tag}");
                    }
                }
            }
        }
        None => {
            let counts: Vec<(String, usize)> = store.tags_with_counts()?.into_iter().collect();
            output.print_tags(&counts);
        }
    }
    Ok(())
}

/// List record ids carrying the given tags
pub fn filter(store: &mut Store, tags: Vec<String>, all: bool, output: &Output) -> Result<()> {
    let ids = store.query(&tags, all)?;
    output.print_ids(&ids);
    Ok(())
}
