//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of operational counters.
///
/// Shared by reference (`Arc`) between the resolver and the executors.
/// Relaxed ordering: counters are exact but not synchronized with each other.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    commands_planned: AtomicU64,
    commands_rejected: AtomicU64,
    rows_read: AtomicU64,
    rows_mutated: AtomicU64,
    cas_conflicts: AtomicU64,
    cas_retries: AtomicU64,
    rows_failed: AtomicU64,
    rows_skipped: AtomicU64,
    bulk_clears: AtomicU64,
    upserts: AtomicU64,
    inserts: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_commands_planned(&self) {
        self.commands_planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commands_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_read(&self, rows: u64) {
        self.rows_read.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_rows_mutated(&self) {
        self.rows_mutated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cas_conflicts(&self) {
        self.cas_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// A retry is a fresh read after a conflict
    pub fn increment_cas_retries(&self) {
        self.cas_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows_failed(&self) {
        self.rows_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows_skipped(&self) {
        self.rows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_bulk_clears(&self) {
        self.bulk_clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_upserts(&self) {
        self.upserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_inserts(&self, documents: u64) {
        self.inserts.fetch_add(documents, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_planned: self.commands_planned.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_mutated: self.rows_mutated.load(Ordering::Relaxed),
            cas_conflicts: self.cas_conflicts.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
            rows_failed: self.rows_failed.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            bulk_clears: self.bulk_clears.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub commands_planned: u64,
    pub commands_rejected: u64,
    pub rows_read: u64,
    pub rows_mutated: u64,
    pub cas_conflicts: u64,
    pub cas_retries: u64,
    pub rows_failed: u64,
    pub rows_skipped: u64,
    pub bulk_clears: u64,
    pub upserts: u64,
    pub inserts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_commands_planned();
        registry.increment_commands_planned();
        registry.add_rows_read(5);
        registry.increment_cas_conflicts();
        registry.increment_cas_retries();
        registry.increment_rows_failed();
        registry.add_inserts(3);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.commands_planned, 2);
        assert_eq!(snapshot.rows_read, 5);
        assert_eq!(snapshot.cas_conflicts, 1);
        assert_eq!(snapshot.cas_retries, 1);
        assert_eq!(snapshot.rows_failed, 1);
        assert_eq!(snapshot.inserts, 3);
        assert_eq!(snapshot.rows_mutated, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = MetricsRegistry::new();
        registry.increment_bulk_clears();

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["bulk_clears"], 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let reg = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    reg.increment_rows_mutated();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().rows_mutated, 1000);
    }
}
