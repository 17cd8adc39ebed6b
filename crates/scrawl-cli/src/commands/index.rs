//! Index maintenance command handler

use anyhow::Result;

use scrawl_core::Store;

use crate::output::Output;

/// Rebuild the tag index from the metadata documents
pub fn rebuild(store: &mut Store, output: &Output) -> Result<()> {
    store.rebuild_index()?;
    let tags = store.tags_with_counts()?;
    output.success(&format!("Rebuilt tag index ({} tag(s))", tags.len()));
    Ok(())
}
