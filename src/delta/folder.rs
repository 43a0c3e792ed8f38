//! Delta folder discovery.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::error::{IndexerError, Result};
use crate::model::delta::DeltaFile;

/// List the files of `root` that are ready for processing.
///
/// Non-recursive. A file qualifies when it is writable by this process (so it
/// can be deleted once delivered) and was last modified more than `min_age`
/// ago, which skips files the archiver may still be writing.
///
/// # Errors
///
/// Fails only if `root` itself cannot be listed.
pub fn discover(root: &Path, min_age: Duration) -> Result<Vec<DeltaFile>> {
    info!(folder = %root.display(), "Reading folder");
    let entries = std::fs::read_dir(root).map_err(|e| IndexerError::io(root, e))?;
    let now = SystemTime::now();

    let mut checked = 0usize;
    let mut files: Vec<DeltaFile> = entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            if !metadata.is_file() {
                return None;
            }
            checked += 1;
            if !is_writable(&entry.path()) {
                debug!(file = %entry.path().display(), "Skipping file not writable");
                return None;
            }
            let modified = metadata.modified().ok()?;
            let age = now.duration_since(modified).unwrap_or_default();
            (age > min_age).then(|| DeltaFile::new(entry.path(), modified))
        })
        .collect();

    // Deterministic submission order
    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!(checked, ready = files.len(), "Checked files");
    Ok(files)
}

/// Whether this process may write `path`.
///
/// Asks the OS by opening for write (no truncation, no data written), so
/// ownership, group bits and root privileges are all taken into account.
fn is_writable(path: &Path) -> bool {
    std::fs::OpenOptions::new().write(true).open(path).is_ok()
}
