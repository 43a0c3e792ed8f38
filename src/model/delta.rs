//! Drop-folder entries and the routing metadata encoded in their names.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A file found in the delta folder, eligible for processing.
///
/// Created by the upstream archiver; read and deleted only by this tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaFile {
    /// Full path of the file.
    pub path: PathBuf,
    /// Last modification time at discovery.
    pub modified: SystemTime,
}

impl DeltaFile {
    /// Wrap a path, recording `modified` as given.
    pub fn new(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bare file name, lossily converted to UTF-8.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Information decoded from a delta file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaInfo {
    /// Archive URL of the message (e.g. a pipermail `.html` page).
    pub source_url: String,
    /// Project name, the list name up to the first `-`.
    pub project: String,
    /// List type, the rest of the list name (`dev`, `users`, ...).
    pub list_type: Option<String>,
}

impl DeltaInfo {
    /// Lookup key in the active list set: `project` or `project-listType`.
    pub fn active_key(&self) -> String {
        match &self.list_type {
            Some(list_type) => format!("{}-{}", self.project, list_type),
            None => self.project.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_key_with_list_type() {
        let info = DeltaInfo {
            source_url: String::new(),
            project: "hibernate".into(),
            list_type: Some("dev".into()),
        };
        assert_eq!(info.active_key(), "hibernate-dev");
    }

    #[test]
    fn test_active_key_without_list_type() {
        let info = DeltaInfo {
            source_url: String::new(),
            project: "aerogear".into(),
            list_type: None,
        };
        assert_eq!(info.active_key(), "aerogear");
    }

    #[test]
    fn test_delta_file_name() {
        let file = DeltaFile::new("/tmp/delta/aGVsbG8=", SystemTime::UNIX_EPOCH);
        assert_eq!(file.name(), "aGVsbG8=");
    }
}
