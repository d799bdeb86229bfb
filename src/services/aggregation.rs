//! Teacher-grouped projections of the knowledge base.
//!
//! All functions here are pure reads. Output order follows the knowledge
//! base: guilds and keywords lexicographically, teachers in the order their
//! first record appears, responses in record order.

use crate::models::{Entry, KnowledgeBase, Record, TeacherGroup};

/// Groups records by teacher, keeping first-seen teacher order.
#[must_use]
pub fn group_by_teacher(records: &[Record]) -> Vec<TeacherGroup> {
    let mut groups: Vec<TeacherGroup> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|g| g.teacher == record.teacher) {
            Some(group) => group.responses.push(record.response.clone()),
            None => groups.push(TeacherGroup {
                teacher: record.teacher.clone(),
                responses: vec![record.response.clone()],
            }),
        }
    }
    groups
}

/// Builds one entry per (keyword, teacher) pair in a guild.
///
/// With `teacher_filter`, only that teacher's entries are kept.
#[must_use]
pub fn aggregate_guild(
    knowledge: &KnowledgeBase,
    guild_id: &str,
    teacher_filter: Option<&str>,
) -> Vec<Entry> {
    let Some(keywords) = knowledge.guild(guild_id) else {
        return Vec::new();
    };

    keywords
        .iter()
        .flat_map(|(keyword, records)| {
            group_by_teacher(records)
                .into_iter()
                .filter(move |group| teacher_filter.is_none_or(|t| t == group.teacher))
                .map(move |group| Entry {
                    guild_id: guild_id.to_string(),
                    keyword: keyword.clone(),
                    teacher: group.teacher,
                    responses: group.responses,
                })
        })
        .collect()
}

/// Builds one entry per (guild, keyword) holding `teacher`'s responses, across all guilds.
#[must_use]
pub fn aggregate_by_teacher(knowledge: &KnowledgeBase, teacher: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    for (guild_id, keywords) in knowledge.guilds() {
        for (keyword, records) in keywords {
            let responses: Vec<String> = records
                .iter()
                .filter(|record| record.teacher == teacher)
                .map(|record| record.response.clone())
                .collect();
            if !responses.is_empty() {
                entries.push(Entry {
                    guild_id: guild_id.to_string(),
                    keyword: keyword.clone(),
                    teacher: teacher.to_string(),
                    responses,
                });
            }
        }
    }
    entries
}

/// Resolves a user-supplied teacher filter.
///
/// Accepts `name`, `@name` or a mention (`<@123>` / `<@!123>`). Mentions are
/// passed to `resolve_mention`; unresolvable mentions are kept verbatim.
/// Returns `None` when the filter is empty.
pub fn resolve_teacher_filter(
    raw: &str,
    resolve_mention: impl FnOnce(u64) -> Option<String>,
) -> Option<String> {
    let candidate = raw.trim().trim_start_matches('@');
    if candidate.is_empty() {
        return None;
    }

    if candidate.starts_with("<@") && candidate.ends_with('>') {
        let id = candidate.trim_matches(|c| matches!(c, '<' | '@' | '!' | '>'));
        if let Some(name) = id.parse::<u64>().ok().and_then(resolve_mention) {
            return Some(name);
        }
    }

    Some(candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        kb.append("g1", "sky", Record::new("blue", "alice"));
        kb.append("g1", "sky", Record::new("grey", "bob"));
        kb.append("g1", "sky", Record::new("clear", "alice"));
        kb.append("g1", "sea", Record::new("green", "alice"));
        kb.append("g2", "sky", Record::new("black", "alice"));
        kb.append("g2", "sun", Record::new("hot", "carol"));
        kb
    }

    #[test]
    fn test_group_by_teacher_first_seen_order() {
        let records = [
            Record::new("a", "bob"),
            Record::new("b", "alice"),
            Record::new("c", "bob"),
        ];
        let groups = group_by_teacher(&records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].teacher, "bob");
        assert_eq!(groups[0].responses, vec!["a", "c"]);
        assert_eq!(groups[1].teacher, "alice");
    }

    #[test]
    fn test_aggregate_guild() {
        let entries = aggregate_guild(&sample(), "g1", None);

        let summary: Vec<(&str, &str, usize)> = entries
            .iter()
            .map(|e| (e.keyword.as_str(), e.teacher.as_str(), e.responses.len()))
            .collect();
        assert_eq!(
            summary,
            vec![("sea", "alice", 1), ("sky", "alice", 2), ("sky", "bob", 1)]
        );
        assert!(entries.iter().all(|e| e.guild_id == "g1"));
    }

    #[test]
    fn test_aggregate_guild_with_filter() {
        let entries = aggregate_guild(&sample(), "g1", Some("bob"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].responses, vec!["grey"]);
    }

    #[test]
    fn test_aggregate_unknown_guild() {
        assert!(aggregate_guild(&sample(), "nope", None).is_empty());
    }

    #[test]
    fn test_aggregate_by_teacher_across_guilds() {
        let entries = aggregate_by_teacher(&sample(), "alice");

        let summary: Vec<(&str, &str, Vec<String>)> = entries
            .iter()
            .map(|e| (e.guild_id.as_str(), e.keyword.as_str(), e.responses.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("g1", "sea", vec!["green".to_string()]),
                ("g1", "sky", vec!["blue".to_string(), "clear".to_string()]),
                ("g2", "sky", vec!["black".to_string()]),
            ]
        );
    }

    #[test]
    fn test_resolve_teacher_filter() {
        let lookup = |id: u64| (id == 42).then(|| "alice".to_string());

        assert_eq!(resolve_teacher_filter("bob", lookup), Some("bob".to_string()));
        assert_eq!(resolve_teacher_filter("@bob", lookup), Some("bob".to_string()));
        assert_eq!(resolve_teacher_filter("<@42>", lookup), Some("alice".to_string()));
        assert_eq!(resolve_teacher_filter("<@!42>", lookup), Some("alice".to_string()));
        assert_eq!(resolve_teacher_filter("<@7>", lookup), Some("<@7>".to_string()));
        assert_eq!(resolve_teacher_filter("  ", lookup), None);
        assert_eq!(resolve_teacher_filter("@", lookup), None);
    }
}
