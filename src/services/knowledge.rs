//! Knowledge service: teach, delete, list and look up taught responses.
//!
//! # Concurrency
//!
//! The knowledge base sits behind a single `RwLock`. Every mutation (teach,
//! delete, legacy adoption, reload) holds the write lock across both the
//! in-memory change and the full-file save, so two racing mutations can never
//! lose each other's updates. Reads hold the read lock for the whole
//! projection and therefore see a consistent snapshot.
//!
//! Mutations are applied to a copy which is saved first and swapped in only
//! if the save succeeded. A failed save aborts the mutation and leaves the
//! in-memory state exactly as before.

use crate::config::KnowledgePolicy;
use crate::models::{Entry, KnowledgeBase, LEGACY_GUILD_ID, Record, TeacherGroup};
use crate::observability::metrics::{DELETE_TOTAL, TEACH_TOTAL};
use crate::services::aggregation::{aggregate_by_teacher, aggregate_guild, group_by_teacher};
use crate::storage::migrations::adopt_legacy;
use crate::storage::{KnowledgeStore, LoadOutcome, PersistenceBackend};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

/// Summary counts of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    /// Backend location.
    pub location: String,
    /// Real guilds holding at least one record; the legacy bucket is not counted.
    pub guilds: usize,
    /// Distinct (guild, keyword) pairs.
    pub keywords: usize,
    /// Total records.
    pub records: usize,
    /// Records still waiting in the legacy bucket.
    pub pending_legacy: usize,
}

/// The mutation and query surface over the shared knowledge base.
pub struct KnowledgeService {
    store: KnowledgeStore,
    policy: KnowledgePolicy,
    knowledge: RwLock<KnowledgeBase>,
}

impl KnowledgeService {
    /// Opens the service, loading and normalizing the backing store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersistenceFailure`] if the store cannot be read or healed.
    pub fn open(backend: Arc<dyn PersistenceBackend>, policy: KnowledgePolicy) -> Result<Self> {
        let store = KnowledgeStore::new(backend);
        let outcome = store.load()?;
        Ok(Self {
            store,
            policy,
            knowledge: RwLock::new(outcome.knowledge),
        })
    }

    /// Returns the policy in force.
    #[must_use]
    pub const fn policy(&self) -> &KnowledgePolicy {
        &self.policy
    }

    /// Returns a copy of the current knowledge base.
    #[must_use]
    pub fn snapshot(&self) -> KnowledgeBase {
        self.read().clone()
    }

    /// Re-loads and re-normalizes the store, replacing in-memory state.
    ///
    /// Front-ends call this when their connection becomes ready again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersistenceFailure`] if the store cannot be read; the
    /// previous in-memory state is kept in that case.
    #[instrument(skip(self))]
    pub fn reload(&self) -> Result<LoadOutcome> {
        let mut guard = self.write();
        let outcome = self.store.load()?;
        *guard = outcome.knowledge.clone();
        tracing::info!(
            format = outcome.format.as_str(),
            records = outcome.knowledge.record_count(),
            "Reloaded knowledge"
        );
        Ok(outcome)
    }

    /// Teaches `response` for `keyword` in a guild.
    ///
    /// Duplicates are kept: teaching the same response twice stores two records.
    ///
    /// # Errors
    ///
    /// - [`Error::ProtectedKeyword`] if the keyword is protected
    /// - [`Error::NoGuildContext`] without a guild
    /// - [`Error::InvalidInput`] for an empty keyword, response or teacher, or the reserved guild id
    /// - [`Error::PersistenceFailure`] if saving fails
    #[instrument(skip(self, response), fields(response_len = response.len()))]
    pub fn teach(
        &self,
        guild_id: Option<&str>,
        keyword: &str,
        response: &str,
        teacher: &str,
    ) -> Result<()> {
        if self.policy.is_protected(keyword) {
            return Err(Error::ProtectedKeyword {
                keyword: keyword.to_string(),
            });
        }
        let guild_id = require_guild(guild_id)?;
        if keyword.is_empty() || response.is_empty() || teacher.is_empty() {
            return Err(Error::InvalidInput(
                "keyword, response and teacher must not be empty".to_string(),
            ));
        }

        self.mutate(|knowledge| {
            adopt_legacy(knowledge, guild_id);
            knowledge.append(guild_id, keyword, Record::new(response, teacher));
            Ok(())
        })?;

        tracing::info!(guild_id, keyword, teacher, "Taught response");
        metrics::counter!(TEACH_TOTAL).increment(1);
        Ok(())
    }

    /// Deletes `teacher`'s records equal to `response` under `keyword`.
    ///
    /// Identical duplicates are removed together. Returns the number removed.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] unless `requester` is the teacher or privileged
    /// - [`Error::NotFound`] if nothing matched
    /// - [`Error::PersistenceFailure`] if saving fails
    #[instrument(skip(self, response))]
    pub fn delete_one(
        &self,
        requester: &str,
        guild_id: &str,
        keyword: &str,
        teacher: &str,
        response: &str,
    ) -> Result<usize> {
        self.delete_where(requester, guild_id, keyword, teacher, |record| {
            record.response == response
        })
    }

    /// Deletes every record by `teacher` under `keyword` whose response is in `responses`.
    ///
    /// Persists once for the whole batch. Returns the number removed.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] unless `requester` is the teacher or privileged
    /// - [`Error::InvalidInput`] for an empty response set
    /// - [`Error::NotFound`] if nothing matched
    /// - [`Error::PersistenceFailure`] if saving fails
    #[instrument(skip(self, responses), fields(selected = responses.len()))]
    pub fn delete_many(
        &self,
        requester: &str,
        guild_id: &str,
        keyword: &str,
        teacher: &str,
        responses: &BTreeSet<String>,
    ) -> Result<usize> {
        if responses.is_empty() {
            self.authorize(requester, teacher)?;
            return Err(Error::InvalidInput(
                "select at least one response to delete".to_string(),
            ));
        }
        self.delete_where(requester, guild_id, keyword, teacher, |record| {
            responses.contains(&record.response)
        })
    }

    fn delete_where(
        &self,
        requester: &str,
        guild_id: &str,
        keyword: &str,
        teacher: &str,
        matches: impl Fn(&Record) -> bool,
    ) -> Result<usize> {
        self.authorize(requester, teacher)?;

        let removed = self.mutate(|knowledge| {
            let removed =
                knowledge.remove_where(guild_id, keyword, |r| r.teacher == teacher && matches(r));
            if removed == 0 {
                return Err(Error::NotFound {
                    guild_id: guild_id.to_string(),
                    keyword: keyword.to_string(),
                    teacher: teacher.to_string(),
                });
            }
            Ok(removed)
        })?;

        tracing::info!(guild_id, keyword, teacher, requester, removed, "Deleted responses");
        metrics::counter!(DELETE_TOTAL).increment(removed as u64);
        Ok(removed)
    }

    /// Lists a guild's entries, optionally for one teacher only.
    ///
    /// Claims the legacy bucket for this guild first if one is pending.
    ///
    /// # Errors
    ///
    /// - [`Error::NoGuildContext`] without a guild
    /// - [`Error::PersistenceFailure`] if a legacy adoption cannot be saved
    pub fn list_guild(
        &self,
        guild_id: Option<&str>,
        teacher_filter: Option<&str>,
    ) -> Result<Vec<Entry>> {
        let guild_id = require_guild(guild_id)?;
        self.adopt_pending_legacy(guild_id)?;
        Ok(aggregate_guild(&self.read(), guild_id, teacher_filter))
    }

    /// Lists one teacher's entries across every guild.
    #[must_use]
    pub fn list_by_teacher(&self, teacher: &str) -> Vec<Entry> {
        aggregate_by_teacher(&self.read(), teacher)
    }

    /// Lists what was taught, the way the knowledge listing command does.
    ///
    /// With a teacher filter this spans all guilds; without one it lists the
    /// current guild.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_guild`] when no filter is given.
    pub fn list_knowledge(
        &self,
        guild_id: Option<&str>,
        teacher_filter: Option<&str>,
    ) -> Result<Vec<Entry>> {
        match teacher_filter.filter(|t| !t.is_empty()) {
            Some(teacher) => Ok(self.list_by_teacher(teacher)),
            None => self.list_guild(guild_id, None),
        }
    }

    /// Returns the responses stored for an exact keyword, grouped by teacher.
    ///
    /// # Errors
    ///
    /// - [`Error::NoGuildContext`] without a guild
    /// - [`Error::PersistenceFailure`] if a legacy adoption cannot be saved
    pub fn lookup(&self, guild_id: Option<&str>, keyword: &str) -> Result<Vec<TeacherGroup>> {
        let guild_id = require_guild(guild_id)?;
        self.adopt_pending_legacy(guild_id)?;
        let groups = group_by_teacher(self.read().records(guild_id, keyword));
        tracing::debug!(guild_id, keyword, teachers = groups.len(), "Looked up keyword");
        Ok(groups)
    }

    /// Moves the legacy bucket into `guild_id` if one is pending.
    ///
    /// Returns whether records were transferred.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersistenceFailure`] if the result cannot be saved.
    pub fn adopt_pending_legacy(&self, guild_id: &str) -> Result<bool> {
        if guild_id == LEGACY_GUILD_ID || !self.read().contains_guild(LEGACY_GUILD_ID) {
            return Ok(false);
        }
        self.mutate(|knowledge| Ok(adopt_legacy(knowledge, guild_id)))
    }

    /// Returns true if legacy records are waiting for a guild.
    #[must_use]
    pub fn has_pending_legacy(&self) -> bool {
        self.read()
            .guild(LEGACY_GUILD_ID)
            .is_some_and(|bucket| !bucket.is_empty())
    }

    /// Returns summary counts.
    #[must_use]
    pub fn status(&self) -> StoreStatus {
        let knowledge = self.read();
        StoreStatus {
            location: self.store.location(),
            guilds: knowledge
                .guilds()
                .filter(|(id, map)| *id != LEGACY_GUILD_ID && !map.is_empty())
                .count(),
            keywords: knowledge.guilds().map(|(_, map)| map.len()).sum(),
            records: knowledge.record_count(),
            pending_legacy: knowledge
                .guild(LEGACY_GUILD_ID)
                .map_or(0, |bucket| bucket.values().map(Vec::len).sum()),
        }
    }

    fn authorize(&self, requester: &str, teacher: &str) -> Result<()> {
        if self.policy.may_delete(requester, teacher) {
            return Ok(());
        }
        tracing::warn!(requester, teacher, "Rejected delete by non-owner");
        Err(Error::PermissionDenied {
            requester: requester.to_string(),
            teacher: teacher.to_string(),
        })
    }

    /// Applies `change` to a copy, saves it, then swaps it in.
    fn mutate<T>(&self, change: impl FnOnce(&mut KnowledgeBase) -> Result<T>) -> Result<T> {
        let mut guard = self.write();
        let mut next = guard.clone();
        let value = change(&mut next)?;
        self.store.save(&next)?;
        *guard = next;
        Ok(value)
    }

    // Mutations never leave a half-applied state behind (see `mutate`), so a
    // poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, KnowledgeBase> {
        self.knowledge.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, KnowledgeBase> {
        self.knowledge.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Validates a guild id for guild-scoped operations.
///
/// Ids are opaque and used exactly as given, the same way deletes address
/// them. A blank id means there is no guild.
fn require_guild(guild_id: Option<&str>) -> Result<&str> {
    match guild_id {
        Some(LEGACY_GUILD_ID) => Err(Error::InvalidInput(format!(
            "guild id '{LEGACY_GUILD_ID}' is reserved"
        ))),
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(Error::NoGuildContext),
    }
}
