//! On-disk schema detection and normalization.
//!
//! Stored values are loosely typed: older writers emitted bare strings,
//! single objects or lists of either. Every value is first classified into
//! [`RawValue`] and then normalized into canonical [`Record`]s. Anything that
//! cannot become a record is dropped and counted in a
//! [`NormalizationReport`]; malformed data never surfaces as an error.

use crate::models::{KnowledgeBase, Record, UNKNOWN_TEACHER};
use serde_json::{Map, Value};

/// Shape of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredFormat {
    /// Guild id to keyword map (the current format).
    Versioned,
    /// Flat keyword map from before guild scoping.
    Legacy,
    /// Not a UTF-8 JSON object; treated as empty.
    Unreadable,
}

impl StoredFormat {
    /// Returns the format name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Versioned => "versioned",
            Self::Legacy => "legacy",
            Self::Unreadable => "unreadable",
        }
    }
}

/// A parsed stored document.
#[derive(Debug, Clone)]
pub enum StoredDocument {
    /// Versioned document, still unnormalized.
    Versioned(Map<String, Value>),
    /// Legacy flat document, to be migrated.
    Legacy(Map<String, Value>),
    /// Unparseable content.
    Unreadable,
}

impl StoredDocument {
    /// Parses raw document bytes and detects the format.
    ///
    /// An object with no entries, or whose first value is itself an object,
    /// is versioned. Any other object is legacy. Anything else, including
    /// invalid JSON and invalid UTF-8 anywhere in the input, is unreadable.
    #[must_use]
    pub fn parse(contents: impl AsRef<[u8]>) -> Self {
        match serde_json::from_slice::<Value>(contents.as_ref()) {
            Ok(Value::Object(map)) => {
                let versioned = map.values().next().is_none_or(Value::is_object);
                if versioned {
                    Self::Versioned(map)
                } else {
                    Self::Legacy(map)
                }
            },
            Ok(_) | Err(_) => Self::Unreadable,
        }
    }

    /// Returns the detected format.
    #[must_use]
    pub const fn format(&self) -> StoredFormat {
        match self {
            Self::Versioned(_) => StoredFormat::Versioned,
            Self::Legacy(_) => StoredFormat::Legacy,
            Self::Unreadable => StoredFormat::Unreadable,
        }
    }
}

/// Counts of what normalization kept, coerced and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Records that made it into the knowledge base.
    pub kept: usize,
    /// Values that were not already a list of records (bare strings, lone objects).
    pub coerced: usize,
    /// Values or items that could not become a record.
    pub dropped: usize,
    /// Guild entries whose value was not a keyword map.
    pub dropped_guilds: usize,
}

impl NormalizationReport {
    /// Returns true if anything was dropped.
    #[must_use]
    pub const fn has_malformed(&self) -> bool {
        self.dropped > 0 || self.dropped_guilds > 0
    }

    /// Total number of discarded values.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        self.dropped + self.dropped_guilds
    }
}

/// A stored object that may describe a record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    response: Option<Value>,
    teacher: Option<Value>,
}

impl RawRecord {
    fn from_map(mut map: Map<String, Value>) -> Self {
        Self {
            response: map.remove("response"),
            teacher: map.remove("teacher"),
        }
    }

    /// Converts into a record; requires a non-empty string response.
    ///
    /// A missing or non-string teacher falls back to `default_teacher`.
    fn into_record(self, default_teacher: &str) -> Option<Record> {
        let response = match self.response {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return None,
        };
        let teacher = match self.teacher {
            Some(Value::String(t)) => t,
            _ => default_teacher.to_string(),
        };
        Some(Record { response, teacher })
    }
}

/// One element of a stored list.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    /// A bare response string.
    Text(String),
    /// An object with `response` / `teacher` fields.
    Record(RawRecord),
    /// Anything else.
    Unrecognized(Value),
}

impl From<Value> for RawItem {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Object(map) => Self::Record(RawRecord::from_map(map)),
            other => Self::Unrecognized(other),
        }
    }
}

impl RawItem {
    fn into_record(self, default_teacher: &str) -> Option<Record> {
        match self {
            Self::Text(response) => Some(Record::new(response, default_teacher)),
            Self::Record(raw) => raw.into_record(default_teacher),
            Self::Unrecognized(_) => None,
        }
    }
}

/// A value stored under a keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A list of items (the canonical shape when all items are records).
    List(Vec<RawItem>),
    /// A single object.
    Record(RawRecord),
    /// A bare response string.
    Text(String),
    /// Anything else.
    Unrecognized(Value),
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items.into_iter().map(RawItem::from).collect()),
            Value::Object(map) => Self::Record(RawRecord::from_map(map)),
            Value::String(s) => Self::Text(s),
            other => Self::Unrecognized(other),
        }
    }
}

impl RawValue {
    /// Normalizes into records, updating `report`.
    pub fn into_records(
        self,
        default_teacher: &str,
        report: &mut NormalizationReport,
    ) -> Vec<Record> {
        let records: Vec<Record> = match self {
            Self::List(items) => {
                let total = items.len();
                let records: Vec<Record> = items
                    .into_iter()
                    .filter_map(|item| item.into_record(default_teacher))
                    .collect();
                report.dropped += total - records.len();
                records
            },
            Self::Record(raw) => {
                report.coerced += 1;
                let record = raw.into_record(default_teacher);
                if record.is_none() {
                    report.dropped += 1;
                }
                record.into_iter().collect()
            },
            Self::Text(response) => {
                report.coerced += 1;
                vec![Record::new(response, default_teacher)]
            },
            Self::Unrecognized(_) => {
                report.dropped += 1;
                Vec::new()
            },
        };
        report.kept += records.len();
        records
    }
}

/// Normalizes any stored keyword value into records.
pub fn normalize_value(
    value: Value,
    default_teacher: &str,
    report: &mut NormalizationReport,
) -> Vec<Record> {
    RawValue::from(value).into_records(default_teacher, report)
}

/// Normalizes a versioned document.
///
/// Guild entries that are not keyword maps are dropped; keywords whose
/// values yield no records are omitted.
#[must_use]
pub fn normalize_versioned(raw: Map<String, Value>) -> (KnowledgeBase, NormalizationReport) {
    let mut report = NormalizationReport::default();
    let mut knowledge = KnowledgeBase::new();

    for (guild_id, guild_value) in raw {
        let Value::Object(keywords) = guild_value else {
            report.dropped_guilds += 1;
            continue;
        };
        for (keyword, value) in keywords {
            let records = normalize_value(value, UNKNOWN_TEACHER, &mut report);
            knowledge.extend(&guild_id, &keyword, records);
        }
    }

    (knowledge, report)
}
