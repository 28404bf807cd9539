//! One-time startup writes against the store.

use std::path::Path;

use tracing::{info, warn};

use crate::error::StartupError;
use crate::function_config;
use crate::store::RecordStore;

/// Keyspace-notification flags enabled at startup: all events, keyevent channel.
pub const NOTIFY_KEYSPACE_EVENTS: &str = "EA";

/// Key written once the router has connected.
pub const READINESS_KEY: &str = "connected";

/// Prepares the store for routing.
///
/// Enables notification delivery, writes the readiness marker, then seeds
/// every record from the function-config file. Returns the number of
/// records seeded.
///
/// A refused notification config write is logged and tolerated; delivery
/// must then be enabled out of band.
///
/// # Errors
///
/// Returns [`StartupError`] if the readiness marker or a seeded record
/// cannot be written, or if the function-config file is unreadable or
/// malformed. All are fatal.
pub async fn initialize(store: &dyn RecordStore, function_config: &Path) -> Result<usize, StartupError> {
    if let Err(e) = store.enable_notifications(NOTIFY_KEYSPACE_EVENTS).await {
        warn!(error = %e, "could not enable keyspace notifications");
    }

    store.set_value(READINESS_KEY, "true").await?;

    let records = function_config::load(function_config).await?;
    for record in &records {
        store.write_fields(&record.name, &record.fields).await?;
    }

    info!(
        path = %function_config.display(),
        records = records.len(),
        "function config seeded"
    );
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::ConfigError;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn initialize_enables_notifications_marks_ready_and_seeds() {
        let store = MemoryStore::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resize | width,640,height,480").unwrap();
        writeln!(file, "notify | channel,ops").unwrap();

        let seeded = initialize(&store, file.path()).await.unwrap();

        assert_eq!(seeded, 2);
        assert_eq!(store.notify_flags().as_deref(), Some("EA"));
        assert_eq!(store.value(READINESS_KEY).as_deref(), Some("true"));
        let resize = store.fetch_fields("resize").await.unwrap();
        assert_eq!(resize.get("height").map(String::as_str), Some("480"));
    }

    #[tokio::test]
    async fn missing_function_config_is_fatal() {
        let store = MemoryStore::new();
        let dir = tempfile::tempdir().unwrap();

        let err = initialize(&store, &dir.path().join("functionCfg"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StartupError::Config(ConfigError::Unreadable { .. })
        ));
        // The marker is written before the file is read.
        assert_eq!(store.value(READINESS_KEY).as_deref(), Some("true"));
    }
}
