//! Persistence backend trait.

use crate::Result;

/// Trait for persistence layer backends.
///
/// A backend holds one opaque document: the serialized knowledge base.
/// Every save replaces the whole document; there are no partial writes.
pub trait PersistenceBackend: Send + Sync {
    /// Reads the stored document as raw bytes.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet. Bytes are handed
    /// on unchanged; decoding and validation belong to the loader.
    fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replaces the stored document.
    fn write(&self, contents: &str) -> Result<()>;

    /// Human-readable location used in log output.
    fn location(&self) -> String;

    /// Checks if a document exists.
    fn exists(&self) -> Result<bool> {
        Ok(self.read()?.is_some())
    }
}
