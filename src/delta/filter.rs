//! Active-list filtering of discovered delta files.

use tracing::{error, info, warn};

use crate::config::ActiveLists;
use crate::delta::filename;
use crate::model::delta::DeltaFile;

/// Keep files whose mailing list is active.
///
/// - Name decodes and its key is active: kept.
/// - Name decodes but the list is not active: the file is deleted.
/// - Name does not decode: dropped from the batch but left on disk.
pub fn filter(files: Vec<DeltaFile>, active: &ActiveLists) -> Vec<DeltaFile> {
    let total = files.len();
    let mut kept = Vec::with_capacity(total);

    for file in files {
        let name = file.name();
        let info = match filename::decode(&name) {
            Ok(info) => info,
            Err(e) => {
                error!(file = %name, error = %e, "Cannot extract info from file name, skipping this file");
                continue;
            }
        };

        if active.contains(&info.active_key()) {
            kept.push(file);
        } else if let Err(e) = std::fs::remove_file(file.path()) {
            warn!(
                file = %name,
                exists = file.path().exists(),
                error = %e,
                "Could not delete filtered file"
            );
        }
    }

    info!(filtered = total - kept.len(), kept = kept.len(), "Filtered files out in total");
    kept
}
