//! Legacy format migration.
//!
//! Files written before guild scoping are flat maps:
//!
//! ```json
//! { "keyword": ["response", {"response": "...", "teacher": "..."}] }
//! { "keyword::teacher": ["response", ...] }
//! ```
//!
//! Their records are promoted into the reserved [`LEGACY_GUILD_ID`] bucket.
//! The true origin guild cannot be recovered, so the bucket is handed in full
//! to the first guild that touches the store afterwards (see [`adopt_legacy`]).

use crate::models::{KnowledgeBase, LEGACY_GUILD_ID, UNKNOWN_TEACHER};
use crate::observability::metrics::LEGACY_ADOPTED_TOTAL;
use crate::storage::schema::{NormalizationReport, normalize_value};
use serde_json::{Map, Value};
use tracing::instrument;

/// Separator between keyword and teacher in legacy composite keys.
const TEACHER_KEY_SEPARATOR: &str = "::";

/// Statistics from a migration operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationStats {
    /// Number of legacy keys read.
    pub keys: usize,
    /// Keys in `keyword::teacher` form.
    pub teacher_keys: usize,
    /// Records moved into the legacy bucket.
    pub migrated: usize,
    /// Values or items that could not become records.
    pub dropped: usize,
}

/// Promotes a legacy flat map into a knowledge base holding only the legacy bucket.
///
/// Records sharing a keyword are appended, never overwritten, in key order.
/// The bucket is present even when nothing could be recovered.
#[must_use]
#[instrument(skip(raw), fields(keys = raw.len()))]
pub fn migrate_legacy(raw: Map<String, Value>) -> (KnowledgeBase, MigrationStats) {
    let mut knowledge = KnowledgeBase::new();
    knowledge.ensure_guild(LEGACY_GUILD_ID);

    let mut stats = MigrationStats {
        keys: raw.len(),
        ..MigrationStats::default()
    };
    let mut report = NormalizationReport::default();

    for (key, value) in raw {
        let composite = value
            .is_array()
            .then(|| key.split_once(TEACHER_KEY_SEPARATOR))
            .flatten();

        let (keyword, records) = match composite {
            Some((keyword, teacher)) => {
                stats.teacher_keys += 1;
                let records = normalize_value(value, teacher, &mut report);
                (keyword.to_string(), records)
            },
            None => {
                let records = normalize_value(value, UNKNOWN_TEACHER, &mut report);
                (key, records)
            },
        };

        knowledge.extend(LEGACY_GUILD_ID, &keyword, records);
    }

    stats.migrated = report.kept;
    stats.dropped = report.discarded();

    tracing::info!(
        keys = stats.keys,
        teacher_keys = stats.teacher_keys,
        migrated = stats.migrated,
        dropped = stats.dropped,
        "Migrated legacy knowledge into holding bucket"
    );

    (knowledge, stats)
}

/// Moves the legacy bucket into `guild_id`.
///
/// Keyword lists are appended to the guild's existing lists. The bucket is
/// removed afterwards. Returns `true` only if records were transferred; an
/// empty bucket is pruned silently.
#[instrument(skip(knowledge))]
pub fn adopt_legacy(knowledge: &mut KnowledgeBase, guild_id: &str) -> bool {
    if guild_id == LEGACY_GUILD_ID {
        return false;
    }
    let Some(bucket) = knowledge.take_guild(LEGACY_GUILD_ID) else {
        return false;
    };
    if bucket.is_empty() {
        tracing::debug!("Pruned empty legacy bucket");
        return false;
    }

    let mut transferred = 0;
    for (keyword, records) in bucket {
        transferred += records.len();
        knowledge.extend(guild_id, &keyword, records);
    }

    tracing::info!(
        guild_id,
        records = transferred,
        "Adopted legacy knowledge into guild"
    );
    metrics::counter!(LEGACY_ADOPTED_TOTAL).increment(1);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use serde_json::json;
    use test_case::test_case;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test input must be an object"),
        }
    }

    #[test_case(json!({"sky": "blue"}), "sky", "unknown" ; "bare string")]
    #[test_case(json!({"sky": ["blue"]}), "sky", "unknown" ; "list of strings")]
    #[test_case(json!({"sky": {"response": "blue", "teacher": "alice"}}), "sky", "alice" ; "single object")]
    #[test_case(json!({"sky": [{"response": "blue"}]}), "sky", "unknown" ; "object without teacher")]
    #[test_case(json!({"sky::alice": ["blue"]}), "sky", "alice" ; "composite key")]
    #[test_case(json!({"sky::alice": [{"response": "blue", "teacher": "bob"}]}), "sky", "bob" ; "embedded teacher wins")]
    fn test_legacy_shapes(raw: Value, keyword: &str, teacher: &str) {
        let (kb, stats) = migrate_legacy(as_map(raw));

        assert_eq!(kb.guild_count(), 1);
        assert_eq!(kb.records(LEGACY_GUILD_ID, keyword), &[Record::new("blue", teacher)]);
        assert_eq!(stats.migrated, 1);
    }

    #[test]
    fn test_composite_key_requires_list_value() {
        let (kb, stats) = migrate_legacy(as_map(json!({"a::b": "text"})));

        assert_eq!(kb.records(LEGACY_GUILD_ID, "a::b"), &[Record::new("text", "unknown")]);
        assert_eq!(stats.teacher_keys, 0);
    }

    #[test]
    fn test_merges_by_keyword() {
        let (kb, stats) = migrate_legacy(as_map(json!({
            "sky": ["blue"],
            "sky::alice": ["clear", "grey"]
        })));

        assert_eq!(
            kb.records(LEGACY_GUILD_ID, "sky"),
            &[
                Record::new("blue", "unknown"),
                Record::new("clear", "alice"),
                Record::new("grey", "alice"),
            ]
        );
        assert_eq!(stats.migrated, 3);
        assert_eq!(stats.teacher_keys, 1);
    }

    #[test]
    fn test_nothing_recoverable_leaves_empty_bucket() {
        let (kb, stats) = migrate_legacy(as_map(json!({"sky": 3, "sea": [null]})));

        assert!(kb.contains_guild(LEGACY_GUILD_ID));
        assert!(kb.is_empty());
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn test_adopt_appends_and_removes_bucket() {
        let (mut kb, _) = migrate_legacy(as_map(json!({"sky": ["blue"]})));
        kb.append("g1", "sky", Record::new("clear", "alice"));

        assert!(adopt_legacy(&mut kb, "g1"));
        assert!(!kb.contains_guild(LEGACY_GUILD_ID));
        assert_eq!(
            kb.records("g1", "sky"),
            &[Record::new("clear", "alice"), Record::new("blue", "unknown")]
        );
    }

    #[test]
    fn test_adopt_twice_is_noop() {
        let (mut kb, _) = migrate_legacy(as_map(json!({"sky": ["blue"]})));

        assert!(adopt_legacy(&mut kb, "g1"));
        let snapshot = kb.clone();
        assert!(!adopt_legacy(&mut kb, "g1"));
        assert_eq!(kb, snapshot);
    }

    #[test]
    fn test_adopt_empty_bucket_prunes_without_transfer() {
        let (mut kb, _) = migrate_legacy(Map::new());

        assert!(!adopt_legacy(&mut kb, "g1"));
        assert!(!kb.contains_guild(LEGACY_GUILD_ID));
        assert!(!kb.contains_guild("g1"));
    }

    #[test]
    fn test_adopt_into_reserved_id_is_refused() {
        let (mut kb, _) = migrate_legacy(as_map(json!({"sky": ["blue"]})));

        assert!(!adopt_legacy(&mut kb, LEGACY_GUILD_ID));
        assert_eq!(kb.records(LEGACY_GUILD_ID, "sky").len(), 1);
    }
}
