//! Counter registration.
//!
//! Counters are emitted through the `metrics` facade and are no-ops until an
//! embedding application installs a recorder.

/// Records taught.
pub const TEACH_TOTAL: &str = "guildlore_teach_total";
/// Records deleted.
pub const DELETE_TOTAL: &str = "guildlore_delete_total";
/// Legacy buckets handed to a guild.
pub const LEGACY_ADOPTED_TOTAL: &str = "guildlore_legacy_adopted_total";
/// Failed saves.
pub const PERSIST_FAILURES_TOTAL: &str = "guildlore_persist_failures_total";
/// Malformed values and records dropped during load.
pub const RECORDS_DROPPED_TOTAL: &str = "guildlore_records_dropped_total";

/// Registers descriptions for every counter with the installed recorder.
pub fn describe() {
    metrics::describe_counter!(TEACH_TOTAL, "Responses taught");
    metrics::describe_counter!(DELETE_TOTAL, "Responses deleted");
    metrics::describe_counter!(
        LEGACY_ADOPTED_TOTAL,
        "Legacy knowledge buckets adopted into a guild"
    );
    metrics::describe_counter!(PERSIST_FAILURES_TOTAL, "Knowledge saves that failed");
    metrics::describe_counter!(
        RECORDS_DROPPED_TOTAL,
        "Malformed entries dropped while loading"
    );
}
