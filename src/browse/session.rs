//! Browse session state machine.

use crate::config::DEFAULT_SELECTION_TIMEOUT;
use crate::models::Entry;
use crate::services::KnowledgeService;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseState {
    /// Paging through entries.
    Browsing,
    /// A multi-response entry is awaiting select / confirm.
    SelectingForDelete,
    /// Closed; every action is rejected.
    Terminal,
}

/// The page currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageView<'a> {
    /// Zero-based position.
    pub index: usize,
    /// Number of entries in the view.
    pub total: usize,
    /// The entry at `index`.
    pub entry: &'a Entry,
}

/// Result of pressing delete on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The single response was deleted and the entry left the view.
    Deleted {
        /// Guild the entry lived in.
        guild_id: String,
        /// The entry's keyword.
        keyword: String,
        /// Records removed from the store.
        removed: usize,
    },
    /// The records were already gone; the entry left the view.
    Stale,
    /// The entry has several responses; pick which to delete.
    SelectionOpened {
        /// Distinct responses available for selection.
        options: Vec<String>,
    },
}

/// Result of confirming a multi-response delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmOutcome {
    /// Guild the entry lived in.
    pub guild_id: String,
    /// The entry's keyword.
    pub keyword: String,
    /// Records removed from the store; zero if they were already gone.
    pub removed: usize,
}

#[derive(Debug)]
struct PendingDelete {
    actor: String,
    entry: Entry,
    options: Vec<String>,
    staged: BTreeSet<String>,
    last_activity: Instant,
}

/// One user's paged listing of entries, with delete controls.
pub struct BrowseSession {
    service: Arc<KnowledgeService>,
    requester: String,
    entries: Vec<Entry>,
    index: usize,
    pending: Option<PendingDelete>,
    closed: bool,
    selection_timeout: Duration,
}

impl BrowseSession {
    /// Opens a session for `requester` over `entries`, starting at the first page.
    #[must_use]
    pub fn new(
        service: Arc<KnowledgeService>,
        requester: impl Into<String>,
        entries: Vec<Entry>,
    ) -> Self {
        Self {
            service,
            requester: requester.into(),
            entries,
            index: 0,
            pending: None,
            closed: false,
            selection_timeout: DEFAULT_SELECTION_TIMEOUT,
        }
    }

    /// Sets how long a pending selection may sit idle before it is discarded.
    #[must_use]
    pub const fn with_selection_timeout(mut self, timeout: Duration) -> Self {
        self.selection_timeout = timeout;
        self
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> BrowseState {
        if self.closed {
            BrowseState::Terminal
        } else if self.pending.is_some() {
            BrowseState::SelectingForDelete
        } else {
            BrowseState::Browsing
        }
    }

    /// Returns the user who opened the session.
    #[must_use]
    pub fn requester(&self) -> &str {
        &self.requester
    }

    /// Returns the entries still in view.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the current index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Returns the current page, or `None` when nothing is left to show.
    #[must_use]
    pub fn page(&self) -> Option<PageView<'_>> {
        self.entries.get(self.index).map(|entry| PageView {
            index: self.index,
            total: self.entries.len(),
            entry,
        })
    }

    /// Returns true if there is a page before the current one.
    #[must_use]
    pub const fn can_go_previous(&self) -> bool {
        self.index > 0
    }

    /// Returns true if there is a page after the current one.
    #[must_use]
    pub const fn can_go_next(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Moves to the previous page; stays put on the first page.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] if `actor` did not open the session
    /// - [`Error::InvalidState`] unless browsing
    pub fn previous(&mut self, actor: &str) -> Result<()> {
        self.navigable_by(actor)?;
        self.index = self.index.saturating_sub(1);
        Ok(())
    }

    /// Moves to the next page; stays put on the last page.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] if `actor` did not open the session
    /// - [`Error::InvalidState`] unless browsing
    pub fn next(&mut self, actor: &str) -> Result<()> {
        self.navigable_by(actor)?;
        if self.can_go_next() {
            self.index += 1;
        }
        Ok(())
    }

    /// Deletes the entry on the current page.
    ///
    /// A single-response entry is deleted immediately. An entry with several
    /// responses opens a selection owned by `actor` instead.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless browsing, or when the view is empty
    /// - [`Error::PermissionDenied`] unless `actor` taught the entry or is privileged
    /// - [`Error::PersistenceFailure`] if the delete cannot be saved
    #[instrument(skip(self), fields(index = self.index))]
    pub fn delete_current(&mut self, actor: &str) -> Result<DeleteOutcome> {
        self.require_state(BrowseState::Browsing)?;
        let entry = self
            .entries
            .get(self.index)
            .cloned()
            .ok_or_else(|| Error::InvalidState("nothing to delete".to_string()))?;

        if !self.service.policy().may_delete(actor, &entry.teacher) {
            return Err(Error::PermissionDenied {
                requester: actor.to_string(),
                teacher: entry.teacher,
            });
        }

        if let [response] = entry.responses.as_slice() {
            let deleted = self.service.delete_one(
                actor,
                &entry.guild_id,
                &entry.keyword,
                &entry.teacher,
                response,
            );
            return match deleted {
                Ok(removed) => {
                    self.drop_entry(&entry);
                    Ok(DeleteOutcome::Deleted {
                        guild_id: entry.guild_id,
                        keyword: entry.keyword,
                        removed,
                    })
                },
                Err(Error::NotFound { .. }) => {
                    tracing::debug!(keyword = %entry.keyword, "Entry already deleted");
                    self.drop_entry(&entry);
                    Ok(DeleteOutcome::Stale)
                },
                Err(e) => Err(e),
            };
        }

        let mut options: Vec<String> = Vec::with_capacity(entry.responses.len());
        for response in &entry.responses {
            if !options.contains(response) {
                options.push(response.clone());
            }
        }
        self.pending = Some(PendingDelete {
            actor: actor.to_string(),
            entry,
            options: options.clone(),
            staged: BTreeSet::new(),
            last_activity: Instant::now(),
        });
        Ok(DeleteOutcome::SelectionOpened { options })
    }

    /// Returns the responses offered by the open selection.
    #[must_use]
    pub fn selection_options(&self) -> Option<&[String]> {
        self.pending.as_ref().map(|p| p.options.as_slice())
    }

    /// Returns the currently staged responses.
    #[must_use]
    pub fn staged(&self) -> Option<&BTreeSet<String>> {
        self.pending.as_ref().map(|p| &p.staged)
    }

    /// Stages `responses` for deletion, replacing any earlier selection.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] without an open selection, or if it timed out
    /// - [`Error::PermissionDenied`] if `actor` did not open the selection
    /// - [`Error::InvalidInput`] if a response is not among the options
    pub fn select<I, S>(&mut self, actor: &str, responses: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending = self.pending_for(actor)?;
        let staged: BTreeSet<String> = responses.into_iter().map(Into::into).collect();
        if let Some(unknown) = staged.iter().find(|r| !pending.options.contains(r)) {
            return Err(Error::InvalidInput(format!(
                "'{unknown}' is not one of the offered responses"
            )));
        }
        pending.staged = staged;
        pending.last_activity = Instant::now();
        Ok(())
    }

    /// Deletes the staged responses and returns to browsing.
    ///
    /// The entry leaves the view even if only some of its responses were
    /// selected; the rest show up again in the next fresh listing.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] without an open selection, or if it timed out
    /// - [`Error::PermissionDenied`] if `actor` did not open the selection
    /// - [`Error::InvalidInput`] if nothing is staged; the selection stays open
    /// - [`Error::PersistenceFailure`] if the delete cannot be saved; the selection stays open
    #[instrument(skip(self))]
    pub fn confirm(&mut self, actor: &str) -> Result<ConfirmOutcome> {
        let pending = self.pending_for(actor)?;
        if pending.staged.is_empty() {
            return Err(Error::InvalidInput(
                "select at least one response to delete".to_string(),
            ));
        }
        let staged = pending.staged.clone();
        let entry = pending.entry.clone();
        let removed = match self.service.delete_many(
            actor,
            &entry.guild_id,
            &entry.keyword,
            &entry.teacher,
            &staged,
        ) {
            Ok(removed) => removed,
            Err(Error::NotFound { .. }) => 0,
            Err(e) => return Err(e),
        };

        self.pending = None;
        self.drop_entry(&entry);
        Ok(ConfirmOutcome {
            guild_id: entry.guild_id,
            keyword: entry.keyword,
            removed,
        })
    }

    /// Discards the open selection without touching the store.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] without an open selection
    /// - [`Error::PermissionDenied`] if `actor` did not open the selection
    pub fn cancel(&mut self, actor: &str) -> Result<()> {
        self.pending_for(actor)?;
        self.pending = None;
        Ok(())
    }

    /// Discards the open selection if it has been idle past the timeout.
    ///
    /// Returns true if a selection was discarded.
    pub fn expire_idle_selection(&mut self, now: Instant) -> bool {
        let expired = self.pending.as_ref().is_some_and(|p| {
            now.saturating_duration_since(p.last_activity) >= self.selection_timeout
        });
        if expired {
            tracing::debug!("Selection timed out");
            self.pending = None;
        }
        expired
    }

    /// Closes the session. Every later action is rejected.
    pub fn close(&mut self) {
        self.pending = None;
        self.closed = true;
    }

    fn require_state(&self, expected: BrowseState) -> Result<()> {
        let state = self.state();
        if state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "expected {expected:?}, session is {state:?}"
            )))
        }
    }

    fn navigable_by(&self, actor: &str) -> Result<()> {
        if actor != self.requester {
            return Err(Error::PermissionDenied {
                requester: actor.to_string(),
                teacher: self.requester.clone(),
            });
        }
        self.require_state(BrowseState::Browsing)
    }

    fn pending_for(&mut self, actor: &str) -> Result<&mut PendingDelete> {
        self.expire_idle_selection(Instant::now());
        self.require_state(BrowseState::SelectingForDelete)?;
        match self.pending.as_mut() {
            Some(pending) if pending.actor == actor => Ok(pending),
            Some(pending) => Err(Error::PermissionDenied {
                requester: actor.to_string(),
                teacher: pending.actor.clone(),
            }),
            None => Err(Error::InvalidState("no selection in progress".to_string())),
        }
    }

    fn drop_entry(&mut self, entry: &Entry) {
        self.entries.retain(|e| !e.same_group(entry));
        self.index = self.index.min(self.entries.len().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnowledgePolicy;
    use crate::storage::MemoryBackend;

    fn seeded() -> Arc<KnowledgeService> {
        let service = KnowledgeService::open(
            Arc::new(MemoryBackend::new()),
            KnowledgePolicy::default(),
        )
        .unwrap();
        service.teach(Some("g1"), "moon", "white", "alice").unwrap();
        service.teach(Some("g1"), "sky", "blue", "alice").unwrap();
        service.teach(Some("g1"), "sky", "clear", "alice").unwrap();
        service.teach(Some("g1"), "sky", "grey", "alice").unwrap();
        service.teach(Some("g1"), "sun", "hot", "bob").unwrap();
        Arc::new(service)
    }

    fn session(service: &Arc<KnowledgeService>) -> BrowseSession {
        let entries = service.list_guild(Some("g1"), None).unwrap();
        BrowseSession::new(service.clone(), "alice", entries)
    }

    #[test]
    fn test_navigation_bounds() {
        let service = seeded();
        let mut view = session(&service);

        assert!(!view.can_go_previous());
        view.previous("alice").unwrap();
        assert_eq!(view.index(), 0);

        view.next("alice").unwrap();
        view.next("alice").unwrap();
        view.next("alice").unwrap();
        assert_eq!(view.index(), 2);
        assert!(!view.can_go_next());

        let page = view.page().unwrap();
        assert_eq!((page.index, page.total), (2, 3));
        assert_eq!(page.entry.keyword, "sun");
    }

    #[test]
    fn test_navigation_reserved_for_requester() {
        let service = seeded();
        let mut view = session(&service);

        assert!(matches!(view.next("bob"), Err(Error::PermissionDenied { .. })));
        assert_eq!(view.index(), 0);
    }

    #[test]
    fn test_single_response_delete_and_clamp() {
        let service = seeded();
        let mut view = session(&service);
        view.next("alice").unwrap();
        view.next("alice").unwrap();

        let outcome = view.delete_current("bob").unwrap();

        assert!(matches!(outcome, DeleteOutcome::Deleted { removed: 1, .. }));
        assert_eq!(view.entries().len(), 2);
        assert_eq!(view.index(), 1);
        assert_eq!(view.state(), BrowseState::Browsing);
        assert!(service.snapshot().records("g1", "sun").is_empty());
    }

    #[test]
    fn test_delete_by_stranger_is_rejected() {
        let service = seeded();
        let mut view = session(&service);

        let result = view.delete_current("mallory");
        assert!(matches!(result, Err(Error::PermissionDenied { .. })));
        assert_eq!(view.entries().len(), 3);
    }

    #[test]
    fn test_stale_entry_leaves_view() {
        let service = seeded();
        let mut view = session(&service);
        service.delete_one("alice", "g1", "moon", "alice", "white").unwrap();

        assert_eq!(view.delete_current("alice").unwrap(), DeleteOutcome::Stale);
        assert_eq!(view.entries().len(), 2);
    }

    #[test]
    fn test_multi_delete_select_confirm() {
        let service = seeded();
        let mut view = session(&service);
        view.next("alice").unwrap();

        let outcome = view.delete_current("alice").unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::SelectionOpened {
                options: vec!["blue".into(), "clear".into(), "grey".into()]
            }
        );
        assert_eq!(view.state(), BrowseState::SelectingForDelete);
        assert!(matches!(view.next("alice"), Err(Error::InvalidState(_))));

        view.select("alice", ["grey"]).unwrap();
        view.select("alice", ["blue", "clear"]).unwrap();
        let confirmed = view.confirm("alice").unwrap();

        assert_eq!(confirmed.removed, 2);
        assert_eq!(view.state(), BrowseState::Browsing);
        assert_eq!(view.entries().len(), 2);
        assert_eq!(view.index(), 1);
        let remaining: Vec<_> = service
            .snapshot()
            .records("g1", "sky")
            .iter()
            .map(|r| r.response.clone())
            .collect();
        assert_eq!(remaining, vec!["grey"]);
    }

    #[test]
    fn test_confirm_requires_staged_set() {
        let service = seeded();
        let mut view = session(&service);
        view.next("alice").unwrap();
        view.delete_current("alice").unwrap();

        assert!(matches!(view.confirm("alice"), Err(Error::InvalidInput(_))));
        assert_eq!(view.state(), BrowseState::SelectingForDelete);
    }

    #[test]
    fn test_selection_owned_by_actor() {
        let service = seeded();
        let mut view = session(&service);
        view.next("alice").unwrap();
        view.delete_current("lover_hoshino").unwrap();

        assert!(matches!(
            view.select("alice", ["blue"]),
            Err(Error::PermissionDenied { .. })
        ));
        view.select("lover_hoshino", ["blue"]).unwrap();
        assert!(matches!(
            view.select("lover_hoshino", ["purple"]),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(view.staged().map(BTreeSet::len), Some(1));
    }

    #[test]
    fn test_cancel_leaves_store_untouched() {
        let service = seeded();
        let before = service.snapshot();
        let mut view = session(&service);
        view.next("alice").unwrap();
        view.delete_current("alice").unwrap();
        view.select("alice", ["blue"]).unwrap();

        view.cancel("alice").unwrap();

        assert_eq!(view.state(), BrowseState::Browsing);
        assert_eq!(view.entries().len(), 3);
        assert_eq!(service.snapshot(), before);
    }

    #[test]
    fn test_idle_selection_expires() {
        let service = seeded();
        let mut view = session(&service).with_selection_timeout(Duration::from_secs(120));
        view.next("alice").unwrap();
        view.delete_current("alice").unwrap();

        assert!(!view.expire_idle_selection(Instant::now()));
        assert!(view.expire_idle_selection(Instant::now() + Duration::from_secs(121)));
        assert_eq!(view.state(), BrowseState::Browsing);
    }

    #[test]
    fn test_timed_out_selection_rejects_confirm() {
        let service = seeded();
        let mut view = session(&service).with_selection_timeout(Duration::ZERO);
        view.next("alice").unwrap();
        view.delete_current("alice").unwrap();

        assert!(matches!(view.confirm("alice"), Err(Error::InvalidState(_))));
        assert_eq!(service.snapshot().records("g1", "sky").len(), 3);
    }

    #[test]
    fn test_closed_session_rejects_everything() {
        let service = seeded();
        let mut view = session(&service);
        view.close();

        assert_eq!(view.state(), BrowseState::Terminal);
        assert!(matches!(view.next("alice"), Err(Error::InvalidState(_))));
        assert!(matches!(view.delete_current("alice"), Err(Error::InvalidState(_))));
        assert!(matches!(view.cancel("alice"), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_empty_view() {
        let service = seeded();
        let mut view = BrowseSession::new(service, "alice", Vec::new());

        assert!(view.page().is_none());
        assert!(!view.can_go_next());
        assert!(matches!(view.delete_current("alice"), Err(Error::InvalidState(_))));
    }
}
