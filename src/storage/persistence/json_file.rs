//! Single-file JSON persistence backend.
//!
//! The whole knowledge base lives in one JSON document. Writes go to a
//! sibling temporary file which is then renamed over the target, so a crash
//! mid-write leaves either the old or the new document on disk, never a
//! truncated one.

use crate::storage::traits::PersistenceBackend;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum size of the knowledge file (64MB).
/// Prevents memory exhaustion from a runaway or hostile file.
const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Filesystem-based persistence backend storing one JSON file.
pub struct JsonFileBackend {
    /// Path of the knowledge file.
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a new backend for the given file path.
    ///
    /// The file and its parent directories are created lazily on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the knowledge file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the temporary path used for atomic replacement.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PersistenceBackend for JsonFileBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let metadata = fs::metadata(&self.path).map_err(|e| Error::PersistenceFailure {
            operation: "read_file_metadata".to_string(),
            cause: e.to_string(),
        })?;

        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::PersistenceFailure {
                operation: "read_knowledge_file".to_string(),
                cause: format!(
                    "{} exceeds maximum size of {MAX_FILE_SIZE} bytes",
                    self.path.display()
                ),
            });
        }

        fs::read(&self.path)
            .map(Some)
            .map_err(|e| Error::PersistenceFailure {
                operation: "read_knowledge_file".to_string(),
                cause: e.to_string(),
            })
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::PersistenceFailure {
                operation: "create_data_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let temp = self.temp_path();
        fs::write(&temp, contents).map_err(|e| Error::PersistenceFailure {
            operation: "write_knowledge_file".to_string(),
            cause: e.to_string(),
        })?;

        fs::rename(&temp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::PersistenceFailure {
                operation: "replace_knowledge_file".to_string(),
                cause: e.to_string(),
            }
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
