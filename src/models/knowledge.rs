//! The in-memory knowledge index.
//!
//! Layout is guild id, then keyword, then an ordered list of [`Record`]s.
//! Guilds and keywords are kept in ordered maps so iteration (and therefore
//! paging order) is lexicographic and reproducible.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Reserved guild id holding records recovered from the pre-versioned file
/// until a real guild claims them.
pub const LEGACY_GUILD_ID: &str = "___LEGACY___";

/// Teacher assigned to records whose origin is unknown.
pub const UNKNOWN_TEACHER: &str = "unknown";

/// One taught response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// What the bot answers with.
    pub response: String,
    /// Username of the user who taught it.
    pub teacher: String,
}

impl Record {
    /// Creates a new record.
    #[must_use]
    pub fn new(response: impl Into<String>, teacher: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            teacher: teacher.into(),
        }
    }

    /// Returns true if this record was taught by `teacher` with `response`.
    #[must_use]
    pub fn matches(&self, teacher: &str, response: &str) -> bool {
        self.teacher == teacher && self.response == response
    }
}

/// Keyword to records mapping for a single guild.
pub type GuildMap = BTreeMap<String, Vec<Record>>;

/// Guild id to [`GuildMap`] mapping; the whole persisted knowledge.
///
/// Mutating methods keep two invariants: a keyword never maps to an empty
/// record list, and a guild never maps to an empty [`GuildMap`]. The one
/// exception is the legacy bucket, which may be empty right after migration;
/// serialization skips empty maps regardless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    guilds: BTreeMap<String, GuildMap>,
}

impl KnowledgeBase {
    /// Creates an empty knowledge base.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            guilds: BTreeMap::new(),
        }
    }

    /// Returns true if no guild holds any record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guilds.values().all(BTreeMap::is_empty)
    }

    /// Returns the keyword map of a guild.
    #[must_use]
    pub fn guild(&self, guild_id: &str) -> Option<&GuildMap> {
        self.guilds.get(guild_id)
    }

    /// Returns true if the guild id is present, even with an empty map.
    #[must_use]
    pub fn contains_guild(&self, guild_id: &str) -> bool {
        self.guilds.contains_key(guild_id)
    }

    /// Iterates guilds in id order.
    pub fn guilds(&self) -> impl Iterator<Item = (&str, &GuildMap)> {
        self.guilds.iter().map(|(id, map)| (id.as_str(), map))
    }

    /// Number of guild ids present.
    #[must_use]
    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    /// Total number of records across all guilds.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.guilds
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Returns the records stored under a keyword.
    #[must_use]
    pub fn records(&self, guild_id: &str, keyword: &str) -> &[Record] {
        self.guilds
            .get(guild_id)
            .and_then(|map| map.get(keyword))
            .map_or(&[], Vec::as_slice)
    }

    /// Appends a record under `keyword` in `guild_id`.
    pub fn append(&mut self, guild_id: &str, keyword: &str, record: Record) {
        self.extend(guild_id, keyword, std::iter::once(record));
    }

    /// Appends records under `keyword`; never replaces existing ones.
    ///
    /// Nothing is created when `records` is empty.
    pub fn extend(
        &mut self,
        guild_id: &str,
        keyword: &str,
        records: impl IntoIterator<Item = Record>,
    ) {
        let mut records = records.into_iter().peekable();
        if records.peek().is_none() {
            return;
        }
        self.guilds
            .entry(guild_id.to_string())
            .or_default()
            .entry(keyword.to_string())
            .or_default()
            .extend(records);
    }

    /// Ensures a guild id exists, possibly with an empty map.
    pub(crate) fn ensure_guild(&mut self, guild_id: &str) {
        self.guilds.entry(guild_id.to_string()).or_default();
    }

    /// Removes every record under `keyword` for which `predicate` holds.
    ///
    /// Prunes the keyword when its list becomes empty and the guild when its
    /// map becomes empty. Returns how many records were removed.
    pub fn remove_where(
        &mut self,
        guild_id: &str,
        keyword: &str,
        mut predicate: impl FnMut(&Record) -> bool,
    ) -> usize {
        let Some(map) = self.guilds.get_mut(guild_id) else {
            return 0;
        };
        let Some(records) = map.get_mut(keyword) else {
            return 0;
        };

        let before = records.len();
        records.retain(|record| !predicate(record));
        let removed = before - records.len();

        if records.is_empty() {
            map.remove(keyword);
        }
        if map.is_empty() {
            self.guilds.remove(guild_id);
        }
        removed
    }

    /// Removes a guild and returns its map.
    pub fn take_guild(&mut self, guild_id: &str) -> Option<GuildMap> {
        self.guilds.remove(guild_id)
    }
}

impl Serialize for KnowledgeBase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let live = self.guilds.iter().filter(|(_, map)| !map.is_empty());
        let mut out = serializer.serialize_map(None)?;
        for (guild_id, map) in live {
            let keywords: BTreeMap<&String, &Vec<Record>> = map
                .iter()
                .filter(|(_, records)| !records.is_empty())
                .collect();
            if !keywords.is_empty() {
                out.serialize_entry(guild_id, &keywords)?;
            }
        }
        out.end()
    }
}
