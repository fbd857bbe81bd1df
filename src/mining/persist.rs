//! JSON record writer for per-block partials and the final stylebook.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::types::MiningError;

/// Writes per-block analysis records into a directory, one file per block index.
#[derive(Debug, Clone)]
pub struct PartialStore {
    directory: PathBuf,
}

impl PartialStore {
    /// Store records under `directory`, created on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Deterministic location of the record for a 1-based block index.
    pub fn path_for(&self, index: usize) -> PathBuf {
        self.directory
            .join(format!("stylebook_partial_{index:02}.json"))
    }

    /// Serialize `record` to the file owned by `index`, replacing any previous content.
    pub fn write<T: Serialize>(&self, index: usize, record: &T) -> Result<PathBuf, MiningError> {
        let path = self.path_for(index);
        write_json(&path, record)?;
        Ok(path)
    }
}

/// Pretty-print `record` as UTF-8 JSON at `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, record: &T) -> Result<(), MiningError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| MiningError::io(parent, source))?;
    }
    let body = serde_json::to_string_pretty(record)?;
    std::fs::write(path, body).map_err(|source| MiningError::io(path, source))
}
