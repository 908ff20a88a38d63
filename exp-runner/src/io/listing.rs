//! Instance directory listing.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Return the name of every entry in `dir`, in whatever order the filesystem yields.
///
/// Fails if `dir` is missing or unreadable. Names that are not valid UTF-8 can
/// never match an allow-list entry and are dropped.
pub fn list_entry_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => debug!(name = ?raw, "skipping non-utf8 entry"),
        }
    }
    Ok(names)
}
