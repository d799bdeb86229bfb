//! Chaos testing for concurrent access.
//!
//! Races many mutations against each other and against readers to check that
//! no update is lost and readers never observe a half-applied change.

// Chaos tests use expect/unwrap/panic for simplicity - panics are acceptable in tests
// Excessive nesting is acceptable in concurrent test code with thread spawns
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::excessive_nesting
)]

use guildlore::{JsonFileBackend, KnowledgePolicy, KnowledgeService, LEGACY_GUILD_ID};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tempfile::TempDir;

fn file_service(dir: &TempDir) -> Arc<KnowledgeService> {
    Arc::new(
        KnowledgeService::open(
            Arc::new(JsonFileBackend::new(dir.path().join("knowledge.json"))),
            KnowledgePolicy::default(),
        )
        .unwrap(),
    )
}

fn records_on_disk(dir: &TempDir) -> usize {
    let raw = std::fs::read_to_string(dir.path().join("knowledge.json")).unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();
    value
        .as_object()
        .unwrap()
        .values()
        .flat_map(|guild| guild.as_object().unwrap().values())
        .map(|records| records.as_array().unwrap().len())
        .sum()
}

/// Test: concurrent teaches to the same keyword lose no updates.
#[test]
fn test_concurrent_teach_no_lost_updates() {
    let dir = TempDir::new().unwrap();
    let service = file_service(&dir);

    let num_threads = 8;
    let ops_per_thread = 25;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let guild = if i % 2 == 0 { "g1" } else { "g2" };
                    service
                        .teach(Some(guild), "shared", &format!("r-{t}-{i}"), &format!("user-{t}"))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("teacher thread panicked");
    }

    let expected = num_threads * ops_per_thread;
    assert_eq!(service.status().records, expected);
    assert_eq!(records_on_disk(&dir), expected);
}

/// Test: concurrent deletes and teaches interleave without losing either.
#[test]
fn test_concurrent_delete_and_teach() {
    let dir = TempDir::new().unwrap();
    let service = file_service(&dir);

    for i in 0..50 {
        service
            .teach(Some("g1"), "doomed", &format!("old-{i}"), "alice")
            .unwrap();
    }

    let deleter = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for i in 0..50 {
                service
                    .delete_one("alice", "g1", "doomed", "alice", &format!("old-{i}"))
                    .unwrap();
            }
        })
    };
    let teacher = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for i in 0..50 {
                service
                    .teach(Some("g1"), "fresh", &format!("new-{i}"), "bob")
                    .unwrap();
            }
        })
    };

    deleter.join().expect("deleter panicked");
    teacher.join().expect("teacher panicked");

    let snapshot = service.snapshot();
    assert!(snapshot.records("g1", "doomed").is_empty());
    assert_eq!(snapshot.records("g1", "fresh").len(), 50);
    assert_eq!(records_on_disk(&dir), 50);
}

/// Test: readers see whole teaches only, while writers run.
#[test]
fn test_readers_see_consistent_snapshots() {
    let dir = TempDir::new().unwrap();
    let service = file_service(&dir);
    let reads = Arc::new(AtomicUsize::new(0));

    let writer = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for i in 0..100 {
                service
                    .teach(Some("g1"), "kw", &format!("r-{i}"), "alice")
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let reads = Arc::clone(&reads);
            thread::spawn(move || {
                let mut last_seen = 0;
                for _ in 0..200 {
                    let entries = service.list_guild(Some("g1"), None).unwrap();
                    let seen = entries.first().map_or(0, |e| e.responses.len());
                    assert!(seen >= last_seen, "listing went backwards");
                    last_seen = seen;
                    reads.fetch_add(1, Ordering::SeqCst);
                    thread::yield_now();
                }
            })
        })
        .collect();

    writer.join().expect("writer panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }

    assert_eq!(reads.load(Ordering::SeqCst), 800);
    assert_eq!(service.snapshot().records("g1", "kw").len(), 100);
}

/// Test: racing guilds adopt the legacy bucket exactly once.
#[test]
fn test_legacy_adopted_by_exactly_one_guild() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("knowledge.json"),
        r#"{"sky": ["blue", "grey"], "sea": ["green"]}"#,
    )
    .unwrap();
    let service = file_service(&dir);

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service.adopt_pending_legacy(&format!("g{t}")).unwrap()
            })
        })
        .collect();

    let adopted: usize = handles
        .into_iter()
        .map(|h| usize::from(h.join().expect("adopter panicked")))
        .sum();

    assert_eq!(adopted, 1);
    let snapshot = service.snapshot();
    assert!(!snapshot.contains_guild(LEGACY_GUILD_ID));
    assert_eq!(snapshot.record_count(), 3);
    assert_eq!(snapshot.guild_count(), 1);
}
