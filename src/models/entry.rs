//! Derived view records.

use serde::Serialize;

/// Everything one teacher taught for one keyword in one guild.
///
/// Not persisted; built by the aggregation service for display and paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Guild the records live in.
    pub guild_id: String,
    /// Trigger keyword.
    pub keyword: String,
    /// Teacher the responses are grouped under.
    pub teacher: String,
    /// Responses in record insertion order.
    pub responses: Vec<String>,
}

impl Entry {
    /// Returns true if the entry refers to the same (guild, keyword, teacher).
    #[must_use]
    pub fn same_group(&self, other: &Self) -> bool {
        self.guild_id == other.guild_id
            && self.keyword == other.keyword
            && self.teacher == other.teacher
    }
}

/// Responses for a keyword grouped under one teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherGroup {
    /// The teacher.
    pub teacher: String,
    /// Responses in record insertion order.
    pub responses: Vec<String>,
}

/// A reply chosen for a recall trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecallReply {
    /// Text to send back.
    pub response: String,
    /// Who taught it; `None` for built-in default knowledge.
    pub teacher: Option<String>,
}
