//! Materializes route-definition records from the store into the table.
//!
//! Normal loading is append-only: `load_one` appends whatever the record
//! holds right now, so repeated loads of one key add duplicate entries and
//! deleted records are never removed. `reconcile` is the explicit rebuild
//! pass that replaces the table with the store's current content.

use std::sync::Arc;

use evrouter_core::{RouteEntry, RoutingTable};
use tracing::{debug, info, warn};

use crate::error::{LoadError, StoreError};
use crate::store::RecordStore;

/// Totals from a full scan of route-definition records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records decoded and appended (or, for reconcile, kept).
    pub loaded: usize,
    /// Records skipped because they could not be fetched or decoded.
    pub skipped: usize,
}

/// Loads route definitions stored under keys carrying the map prefix.
pub struct MapLoader {
    store: Arc<dyn RecordStore>,
    table: Arc<RoutingTable>,
    map_prefix: String,
}

impl MapLoader {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        table: Arc<RoutingTable>,
        map_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            table,
            map_prefix: map_prefix.into(),
        }
    }

    #[must_use]
    pub fn map_prefix(&self) -> &str {
        &self.map_prefix
    }

    #[must_use]
    pub fn table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    /// Fetches and decodes the route record at `key`.
    async fn fetch_entry(&self, key: &str) -> Result<RouteEntry, LoadError> {
        let fields = self.store.fetch_fields(key).await?;
        RouteEntry::from_fields(&fields).map_err(|source| LoadError::Decode {
            key: key.to_string(),
            source,
        })
    }

    /// Fetches the record at `key` and appends it to the table.
    ///
    /// Nothing is appended on error; callers log and continue.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Store`] if the fetch fails and
    /// [`LoadError::Decode`] if the record is malformed or partially populated.
    pub async fn load_one(&self, key: &str) -> Result<RouteEntry, LoadError> {
        let entry = self.fetch_entry(key).await?;
        debug!(
            key,
            name = %entry.name,
            pattern = %entry.pattern,
            target = %entry.target,
            "route loaded"
        );
        self.table.append(entry.clone());
        Ok(entry)
    }

    /// Lists every route-definition key currently in the store.
    async fn route_keys(&self) -> Result<Vec<String>, StoreError> {
        self.store.keys_with_prefix(&self.map_prefix).await
    }

    /// Loads every route-definition record into the table.
    ///
    /// Malformed records are logged and skipped; only a failure to list the
    /// keys is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the key scan fails.
    pub async fn load_all(&self) -> Result<LoadReport, StoreError> {
        let keys = self.route_keys().await?;
        let mut report = LoadReport::default();

        for key in &keys {
            match self.load_one(key).await {
                Ok(_) => report.loaded += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping route record");
                    report.skipped += 1;
                }
            }
        }

        info!(
            prefix = %self.map_prefix,
            loaded = report.loaded,
            skipped = report.skipped,
            table_len = self.table.len(),
            "routing table loaded"
        );
        Ok(report)
    }

    /// Rebuilds the table from the store and swaps it in atomically.
    ///
    /// Stale and duplicate entries disappear; malformed records are skipped.
    /// The table is left untouched if the key scan fails.
    ///
    /// The swap is not coordinated with the listener. An entry that
    /// `load_one` appends after the key scan and before the swap is
    /// overwritten. If its record still exists it comes back on the next
    /// reconcile or map update, so the table converges eventually.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the key scan fails.
    pub async fn reconcile(&self) -> Result<LoadReport, StoreError> {
        let keys = self.route_keys().await?;
        let mut entries = Vec::with_capacity(keys.len());
        let mut report = LoadReport::default();

        for key in &keys {
            match self.fetch_entry(key).await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping route record during reconcile");
                    report.skipped += 1;
                }
            }
        }

        report.loaded = entries.len();
        let previous = self.table.len();
        self.table.replace_all(entries);
        info!(
            previous,
            current = report.loaded,
            skipped = report.skipped,
            "routing table reconciled"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn route(store: &MemoryStore, key: &str, pattern: &str, target: &str) {
        store.insert_hash(
            key,
            [("name", key), ("pattern", pattern), ("lambda", target)],
        );
    }

    fn loader(store: Arc<MemoryStore>) -> MapLoader {
        MapLoader::new(store, Arc::new(RoutingTable::new()), "map:")
    }

    #[tokio::test]
    async fn load_one_appends_entry() {
        let store = Arc::new(MemoryStore::new());
        route(&store, "map:eventA", "*", "fnA");
        let loader = loader(store);

        let entry = loader.load_one("map:eventA").await.unwrap();

        assert_eq!(entry, RouteEntry::new("map:eventA", "*", "fnA"));
        assert_eq!(loader.table().len(), 1);
    }

    #[tokio::test]
    async fn repeated_load_one_appends_duplicates() {
        let store = Arc::new(MemoryStore::new());
        route(&store, "map:eventA", "*", "fnA");
        let loader = loader(store);

        loader.load_all().await.unwrap();
        loader.load_one("map:eventA").await.unwrap();
        loader.load_one("map:eventA").await.unwrap();

        assert_eq!(loader.table().len(), 3);
    }

    #[tokio::test]
    async fn malformed_record_is_not_appended() {
        let store = Arc::new(MemoryStore::new());
        store.insert_hash("map:broken", [("name", "broken"), ("pattern", "*")]);
        let loader = loader(store);

        let err = loader.load_one("map:broken").await.unwrap_err();

        assert!(matches!(err, LoadError::Decode { ref key, .. } if key == "map:broken"));
        assert!(loader.table().is_empty());
    }

    #[tokio::test]
    async fn load_all_skips_bad_records_and_ignores_other_keys() {
        let store = Arc::new(MemoryStore::new());
        route(&store, "map:a", "*", "fnA");
        route(&store, "map:b", "order:", "fnB");
        store.insert_hash("map:c", [("name", "c")]);
        route(&store, "user:1", "*", "fnX");
        let loader = loader(store);

        let report = loader.load_all().await.unwrap();

        assert_eq!(report, LoadReport { loaded: 2, skipped: 1 });
        let targets: Vec<String> = loader
            .table()
            .snapshot()
            .iter()
            .map(|e| e.target.clone())
            .collect();
        assert_eq!(targets, vec!["fnA", "fnB"]);
    }

    #[tokio::test]
    async fn reconcile_drops_stale_and_duplicate_entries() {
        let store = Arc::new(MemoryStore::new());
        route(&store, "map:a", "*", "fnA");
        route(&store, "map:b", "*", "fnB");
        let loader = loader(Arc::clone(&store));
        loader.load_all().await.unwrap();
        loader.load_one("map:a").await.unwrap();

        store.remove_hash("map:b");
        route(&store, "map:a", "user:", "fnA2");
        let report = loader.reconcile().await.unwrap();

        assert_eq!(report.loaded, 1);
        assert_eq!(
            *loader.table().snapshot(),
            vec![RouteEntry::new("map:a", "user:", "fnA2")]
        );
    }

    #[tokio::test]
    async fn reconcile_restores_entry_lost_by_an_earlier_swap() {
        let store = Arc::new(MemoryStore::new());
        route(&store, "map:a", "*", "fnA");
        let loader = loader(Arc::clone(&store));
        loader.load_all().await.unwrap();

        // A record written after the scan: its append is overwritten by the swap.
        route(&store, "map:late", "late:", "fnLate");
        loader.load_one("map:late").await.unwrap();
        loader.table().replace_all(vec![RouteEntry::new("map:a", "*", "fnA")]);

        loader.reconcile().await.unwrap();

        assert_eq!(
            *loader.table().snapshot(),
            vec![
                RouteEntry::new("map:a", "*", "fnA"),
                RouteEntry::new("map:late", "late:", "fnLate"),
            ]
        );
    }
}
