//! Paging and two-phase deletion over aggregated entries.
//!
//! A [`BrowseSession`] backs one interactive listing. It is a small state
//! machine:
//!
//! ```text
//!             delete (1 response)
//!           ┌──────────────────┐
//!           ▼                  │
//!       Browsing ──────────────┘
//!        │    ▲
//! delete │    │ confirm / cancel / idle timeout
//!  (>1)  ▼    │
//!   SelectingForDelete
//!
//!   any ── close ──▶ Terminal
//! ```
//!
//! Navigation is reserved for the user who opened the listing. Deletion is
//! authorized by the knowledge policy (teacher or privileged user), and the
//! user who starts a multi-response delete is the only one who may finish it.

mod session;

pub use session::{BrowseSession, BrowseState, ConfirmOutcome, DeleteOutcome, PageView};
