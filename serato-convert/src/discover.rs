//! Crate file discovery

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};
use walkdir::WalkDir;

use serato_core::crate_file::CRATE_EXTENSION;

/// All `.crate` files under the Serato library folder, ordered by file name
///
/// An unreadable library root is an error; unreadable subfolders are
/// skipped with a warning.
pub fn find_crates(serato_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut crates = Vec::new();

    for entry in WalkDir::new(serato_dir)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_crate(entry.path()) {
            debug!("Found crate: {:?}", entry.path());
            crates.push(entry.into_path());
        }
    }

    // Walk order is per directory; flatten to a global file name order
    crates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(crates)
}

fn is_crate(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(CRATE_EXTENSION))
        .unwrap_or(false)
}
