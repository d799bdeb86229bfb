//! Persistent knowledge store.
//!
//! Loads the backing document into a [`KnowledgeBase`], detecting the format
//! and healing it on disk when normalization changed anything, and saves the
//! whole structure back on every change.

use crate::models::KnowledgeBase;
use crate::observability::metrics::{PERSIST_FAILURES_TOTAL, RECORDS_DROPPED_TOTAL};
use crate::storage::migrations::{MigrationStats, migrate_legacy};
use crate::storage::schema::{
    NormalizationReport, StoredDocument, StoredFormat, normalize_versioned,
};
use crate::storage::traits::PersistenceBackend;
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Result of loading the store.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// The normalized knowledge base.
    pub knowledge: KnowledgeBase,
    /// Format detected on disk.
    pub format: StoredFormat,
    /// What normalization did to versioned input.
    pub report: NormalizationReport,
    /// Present when a legacy document was migrated.
    pub migration: Option<MigrationStats>,
    /// Whether the document was rewritten during load.
    pub rewritten: bool,
}

/// Reads and writes the knowledge base through a [`PersistenceBackend`].
#[derive(Clone)]
pub struct KnowledgeStore {
    backend: Arc<dyn PersistenceBackend>,
}

impl KnowledgeStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }

    /// Returns the backend location for display.
    #[must_use]
    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Loads and normalizes the knowledge base.
    ///
    /// - A missing document is initialized to an empty versioned one.
    /// - Unparseable content is treated as empty and left untouched on disk.
    /// - Legacy content is migrated into the legacy bucket and saved.
    /// - Versioned content is normalized and saved if anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersistenceFailure`] if the backend cannot be read, or
    /// if the initial or healing write fails.
    #[instrument(skip(self), fields(location = %self.backend.location()))]
    pub fn load(&self) -> Result<LoadOutcome> {
        let Some(contents) = self.backend.read()? else {
            let knowledge = KnowledgeBase::new();
            self.save(&knowledge)?;
            tracing::info!("Initialized empty knowledge file");
            return Ok(LoadOutcome {
                knowledge,
                format: StoredFormat::Versioned,
                report: NormalizationReport::default(),
                migration: None,
                rewritten: true,
            });
        };

        let document = StoredDocument::parse(&contents);
        let format = document.format();

        let outcome = match document {
            StoredDocument::Unreadable => {
                tracing::warn!("Knowledge file is not a UTF-8 JSON object; starting empty");
                LoadOutcome {
                    knowledge: KnowledgeBase::new(),
                    format,
                    report: NormalizationReport::default(),
                    migration: None,
                    rewritten: false,
                }
            },
            StoredDocument::Legacy(raw) => {
                let (knowledge, stats) = migrate_legacy(raw);
                self.save(&knowledge)?;
                LoadOutcome {
                    knowledge,
                    format,
                    report: NormalizationReport::default(),
                    migration: Some(stats),
                    rewritten: true,
                }
            },
            StoredDocument::Versioned(raw) => {
                let original = Value::Object(raw.clone());
                let (knowledge, report) = normalize_versioned(raw);
                if report.has_malformed() {
                    tracing::warn!(
                        dropped = report.dropped,
                        dropped_guilds = report.dropped_guilds,
                        "Dropped malformed knowledge entries"
                    );
                    metrics::counter!(RECORDS_DROPPED_TOTAL)
                        .increment(report.discarded() as u64);
                }

                let rewritten = to_value(&knowledge)? != original;
                if rewritten {
                    self.save(&knowledge)?;
                    tracing::info!(coerced = report.coerced, "Healed knowledge file");
                }
                LoadOutcome {
                    knowledge,
                    format,
                    report,
                    migration: None,
                    rewritten,
                }
            },
        };

        tracing::debug!(
            format = format.as_str(),
            guilds = outcome.knowledge.guild_count(),
            records = outcome.knowledge.record_count(),
            "Loaded knowledge"
        );
        Ok(outcome)
    }

    /// Overwrites the stored document with the whole knowledge base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersistenceFailure`] if serialization or the write fails.
    pub fn save(&self, knowledge: &KnowledgeBase) -> Result<()> {
        let json = serde_json::to_string_pretty(knowledge).map_err(|e| {
            Error::PersistenceFailure {
                operation: "serialize_knowledge".to_string(),
                cause: e.to_string(),
            }
        })?;

        self.backend.write(&json).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to persist knowledge");
            metrics::counter!(PERSIST_FAILURES_TOTAL).increment(1);
        })
    }
}

fn to_value(knowledge: &KnowledgeBase) -> Result<Value> {
    serde_json::to_value(knowledge).map_err(|e| Error::PersistenceFailure {
        operation: "serialize_knowledge".to_string(),
        cause: e.to_string(),
    })
}
