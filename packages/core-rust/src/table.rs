//! In-memory routing table.
//!
//! The table is append-only: entries are never deduplicated or removed by
//! normal loading, so it only grows for the lifetime of the process.
//! Readers take an immutable snapshot through `ArcSwap`; writers publish a
//! new vector (copy-on-write), so a matching pass never observes a table
//! that is being appended to.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::route::RouteEntry;

/// Immutable view of the table used for one matching pass.
pub type TableSnapshot = Arc<Vec<RouteEntry>>;

/// Shared, lock-free-for-readers collection of [`RouteEntry`] values.
///
/// Used as `Arc<RoutingTable>` by the loader (writer) and the listener
/// (reader).
#[derive(Debug)]
pub struct RoutingTable {
    entries: ArcSwap<Vec<RouteEntry>>,
}

impl RoutingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Creates a table pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: Vec<RouteEntry>) -> Self {
        Self {
            entries: ArcSwap::from_pointee(entries),
        }
    }

    /// Appends `entry` without validation or deduplication.
    pub fn append(&self, entry: RouteEntry) {
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });
    }

    /// Returns a consistent view for one matching pass.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        self.entries.load_full()
    }

    /// Number of entries, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Atomically replaces the whole table.
    ///
    /// Reconciliation hook: the only way entries disappear. Matching passes
    /// that already hold a snapshot keep using the previous contents.
    pub fn replace_all(&self, entries: Vec<RouteEntry>) {
        self.entries.store(Arc::new(entries));
    }

    /// Keeps only the last entry for each `name` (last write wins).
    ///
    /// Relative order of the surviving entries is preserved. Returns the
    /// number of entries dropped.
    pub fn compact(&self) -> usize {
        let mut dropped = 0;
        self.entries.rcu(|current| {
            let mut seen = HashSet::with_capacity(current.len());
            let mut kept: Vec<RouteEntry> = current
                .iter()
                .rev()
                .filter(|entry| seen.insert(entry.name.as_str()))
                .cloned()
                .collect();
            kept.reverse();
            dropped = current.len() - kept.len();
            kept
        });
        dropped
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}
