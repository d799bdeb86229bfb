//! In-memory persistence backend.
//!
//! Useful for tests and for embedding the store where durability is handled
//! elsewhere. Writes can be made to fail on demand to exercise the
//! persistence-failure path.

use crate::storage::traits::PersistenceBackend;
use crate::{Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Persistence backend keeping the document in memory.
#[derive(Default)]
pub struct MemoryBackend {
    document: Mutex<Option<String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-loaded with a document.
    #[must_use]
    pub fn with_document(contents: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(contents.into())),
            ..Self::default()
        }
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns the current document.
    #[must_use]
    pub fn document(&self) -> Option<String> {
        self.document.lock().ok().and_then(|doc| doc.clone())
    }
}

impl PersistenceBackend for MemoryBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        let doc = self.document.lock().map_err(|e| Error::PersistenceFailure {
            operation: "read_memory_document".to_string(),
            cause: e.to_string(),
        })?;
        Ok(doc.clone().map(String::into_bytes))
    }

    fn write(&self, contents: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::PersistenceFailure {
                operation: "write_memory_document".to_string(),
                cause: "writes disabled".to_string(),
            });
        }

        let mut doc = self.document.lock().map_err(|e| Error::PersistenceFailure {
            operation: "write_memory_document".to_string(),
            cause: e.to_string(),
        })?;
        *doc = Some(contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
