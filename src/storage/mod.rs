//! Storage layer.
//!
//! - **Backends** hold the serialized document (`JsonFileBackend`, `MemoryBackend`)
//! - **Schema** classifies and normalizes whatever shape is on disk
//! - **Migrations** promote the pre-versioned flat format
//! - **Store** ties them together into load / save of a [`crate::KnowledgeBase`]

pub mod migrations;
pub mod persistence;
pub mod schema;
pub mod store;
pub mod traits;

pub use migrations::{MigrationStats, adopt_legacy, migrate_legacy};
pub use persistence::{JsonFileBackend, MemoryBackend};
pub use schema::{NormalizationReport, StoredFormat};
pub use store::{KnowledgeStore, LoadOutcome};
pub use traits::PersistenceBackend;
