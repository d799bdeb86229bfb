//! Static knowledge policy: built-in answers and delete privileges.

use std::collections::{BTreeMap, BTreeSet};

/// Built-in knowledge shipped with the bot.
const BUILTIN_KNOWLEDGE: &[(&str, &str)] = &[("hi", "hello world")];

/// Users allowed to delete anyone's records by default.
const BUILTIN_PRIVILEGED_USERS: &[&str] = &["lover_hoshino"];

/// Default knowledge, protected keywords and privileged users.
///
/// Supplied at construction time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgePolicy {
    default_knowledge: BTreeMap<String, String>,
    privileged_users: BTreeSet<String>,
    protected_keywords: BTreeSet<String>,
}

impl Default for KnowledgePolicy {
    fn default() -> Self {
        Self::new(
            BUILTIN_KNOWLEDGE.iter().map(|&(k, v)| (k, v)),
            BUILTIN_PRIVILEGED_USERS.iter().copied(),
        )
    }
}

impl KnowledgePolicy {
    /// Creates a policy from a default knowledge table and privileged users.
    pub fn new<K, V, U>(
        default_knowledge: impl IntoIterator<Item = (K, V)>,
        privileged_users: impl IntoIterator<Item = U>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        U: Into<String>,
    {
        Self {
            default_knowledge: default_knowledge
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            privileged_users: privileged_users.into_iter().map(Into::into).collect(),
            protected_keywords: BTreeSet::new(),
        }
    }

    /// Adds keywords that cannot be taught even without a canned answer.
    #[must_use]
    pub fn with_protected_keywords(
        mut self,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.protected_keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Returns the canned response for a default knowledge keyword.
    #[must_use]
    pub fn default_response(&self, keyword: &str) -> Option<&str> {
        self.default_knowledge.get(keyword).map(String::as_str)
    }

    /// The full default knowledge table.
    #[must_use]
    pub const fn default_knowledge(&self) -> &BTreeMap<String, String> {
        &self.default_knowledge
    }

    /// Iterates privileged usernames.
    pub fn privileged_users(&self) -> impl Iterator<Item = &String> {
        self.privileged_users.iter()
    }

    /// Returns true if `keyword` can never be taught, overwritten or deleted.
    #[must_use]
    pub fn is_protected(&self, keyword: &str) -> bool {
        self.default_knowledge.contains_key(keyword) || self.protected_keywords.contains(keyword)
    }

    /// Returns true if `username` may delete any teacher's records.
    #[must_use]
    pub fn is_privileged(&self, username: &str) -> bool {
        self.privileged_users.contains(username)
    }

    /// Returns true if `requester` may delete records taught by `teacher`.
    #[must_use]
    pub fn may_delete(&self, requester: &str, teacher: &str) -> bool {
        requester == teacher || self.is_privileged(requester)
    }
}
