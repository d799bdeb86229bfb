//! Data models for guildlore.
//!
//! This module contains the knowledge index and the derived view records
//! built from it.

mod entry;
mod knowledge;

pub use entry::{Entry, RecallReply, TeacherGroup};
pub use knowledge::{GuildMap, KnowledgeBase, LEGACY_GUILD_ID, Record, UNKNOWN_TEACHER};
