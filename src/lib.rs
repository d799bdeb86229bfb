//! # Guildlore
//!
//! A guild-scoped keyword/response knowledge store for chat bots.
//!
//! Users teach the bot phrases and responses inside a community ("guild");
//! the bot recalls them later on an exact keyword match, attributing each
//! response to the user who taught it.
//!
//! ## Features
//!
//! - Single JSON file persistence with write-through on every mutation
//! - Automatic migration of the pre-versioned flat file format
//! - Self-healing load: malformed entries are dropped, never fatal
//! - Teacher-grouped aggregation for paging through what was taught
//! - Two-phase (select, confirm) deletion controller for front-ends
//!
//! ## Example
//!
//! ```rust,ignore
//! use guildlore::{GuildloreConfig, KnowledgeService};
//! use guildlore::storage::JsonFileBackend;
//! use std::sync::Arc;
//!
//! let config = GuildloreConfig::load_default();
//! let backend = Arc::new(JsonFileBackend::new(&config.data_file));
//! let service = KnowledgeService::open(backend, config.policy.clone())?;
//!
//! service.teach(Some("1234"), "sky", "blue", "alice")?;
//! let groups = service.lookup(Some("1234"), "sky")?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod browse;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use browse::{BrowseSession, BrowseState, ConfirmOutcome, DeleteOutcome, PageView};
pub use config::{GuildloreConfig, KnowledgePolicy};
pub use models::{
    Entry, GuildMap, KnowledgeBase, LEGACY_GUILD_ID, RecallReply, Record, TeacherGroup,
};
pub use services::{KnowledgeService, RecallService, StoreStatus};
pub use storage::{JsonFileBackend, MemoryBackend, PersistenceBackend};

/// Error type for guildlore operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `ProtectedKeyword` | Teaching a keyword that belongs to the default knowledge |
/// | `NoGuildContext` | A guild-scoped operation is called without a guild |
/// | `PermissionDenied` | Deleting someone else's record without privileges, or driving another user's view |
/// | `NotFound` | The record to delete is already gone |
/// | `InvalidInput` | Empty keyword/response, empty delete set, reserved guild id |
/// | `InvalidState` | A view action that the current view state does not accept |
/// | `PersistenceFailure` | Reading or writing the backing file fails |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The keyword is reserved and cannot be taught.
    #[error("keyword '{keyword}' is protected and cannot be taught")]
    ProtectedKeyword {
        /// The rejected keyword.
        keyword: String,
    },

    /// The operation needs a guild but none was supplied.
    #[error("this operation requires a guild context")]
    NoGuildContext,

    /// The caller may not act on this record or view.
    ///
    /// Raised when:
    /// - A delete is requested by neither the teacher nor a privileged user
    /// - A view is driven by someone other than the user who opened it
    #[error("'{requester}' is not allowed to act on records taught by '{teacher}'")]
    PermissionDenied {
        /// The user attempting the action.
        requester: String,
        /// The owner of the record or view.
        teacher: String,
    },

    /// The delete target no longer exists.
    #[error("no matching record for '{keyword}' by '{teacher}' in guild {guild_id}")]
    NotFound {
        /// Guild the lookup ran in.
        guild_id: String,
        /// Keyword that was searched.
        keyword: String,
        /// Teacher whose records were searched.
        teacher: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The view cannot perform this action in its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Reading or writing persistent storage failed.
    ///
    /// The in-progress mutation is aborted; in-memory state is left as it was
    /// before the call.
    #[error("operation '{operation}' failed: {cause}")]
    PersistenceFailure {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for guildlore operations.
pub type Result<T> = std::result::Result<T, Error>;
