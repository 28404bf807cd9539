//! Router assembly with a deferred startup lifecycle.
//!
//! `new()` wires the components together without touching the store,
//! `start()` runs the one-time bootstrap and builds the initial routing
//! table, and `serve()` runs the listener and the maintenance worker until
//! the bus closes. [`EventRouter::maintenance`] hands out the handle used to
//! request a reconcile or compaction while the router serves.

use std::sync::Arc;

use evrouter_core::{Matcher, RoutingTable};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::bootstrap;
use crate::config::RouterConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ListenError, StartupError};
use crate::invoke::{FunctionInvoker, LambdaHttpInvoker};
use crate::lifecycle::RouterLifecycle;
use crate::listener::SubscriptionListener;
use crate::loader::{LoadReport, MapLoader};
use crate::store::{NotificationBus, RecordStore, RedisBus, RedisStore};
use crate::worker::{maintenance_channel, MaintenanceHandle, MaintenanceQueue, MaintenanceWorker};

/// The assembled event router.
///
/// The table, loader, and lifecycle are shared via `Arc` so callers can
/// inspect them while the listener runs.
pub struct EventRouter {
    config: RouterConfig,
    store: Arc<dyn RecordStore>,
    table: Arc<RoutingTable>,
    loader: Arc<MapLoader>,
    lifecycle: Arc<RouterLifecycle>,
    listener: SubscriptionListener,
    maintenance: MaintenanceHandle,
    maintenance_queue: Mutex<Option<MaintenanceQueue>>,
}

impl EventRouter {
    /// Wires the router over the given collaborators. Performs no I/O.
    #[must_use]
    pub fn new(
        config: RouterConfig,
        store: Arc<dyn RecordStore>,
        bus: Arc<dyn NotificationBus>,
        invoker: Arc<dyn FunctionInvoker>,
    ) -> Self {
        let table = Arc::new(RoutingTable::new());
        let lifecycle = Arc::new(RouterLifecycle::new());
        let loader = Arc::new(MapLoader::new(
            Arc::clone(&store),
            Arc::clone(&table),
            config.map_prefix.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            invoker,
            Arc::clone(&lifecycle),
            config.max_concurrent_dispatches,
        ));
        let listener = SubscriptionListener::new(
            bus,
            config.channel_pattern.clone(),
            Arc::clone(&loader),
            Matcher::new(config.command_filter()),
            dispatcher,
            Arc::clone(&lifecycle),
        );
        let (maintenance, queue) = maintenance_channel();

        Self {
            config,
            store,
            table,
            loader,
            lifecycle,
            listener,
            maintenance,
            maintenance_queue: Mutex::new(Some(queue)),
        }
    }

    /// Connects to the production store, bus, and invoke endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the configuration is invalid, the store
    /// is unreachable, or the HTTP client cannot be built.
    pub async fn connect(config: RouterConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let store = RedisStore::connect(&config.store_host, config.store_port).await?;
        let bus = RedisBus::new(&config.store_host, config.store_port)?;
        let invoker = LambdaHttpInvoker::new(config.endpoint()?, config.invoke_connect_timeout())
            .map_err(StartupError::InvokeClient)?;
        info!(
            store_host = %config.store_host,
            store_port = config.store_port,
            endpoint = %invoker.endpoint(),
            "collaborators ready"
        );

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(bus),
            Arc::new(invoker),
        ))
    }

    #[must_use]
    pub fn table(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.table)
    }

    #[must_use]
    pub fn loader(&self) -> Arc<MapLoader> {
        Arc::clone(&self.loader)
    }

    #[must_use]
    pub fn lifecycle(&self) -> Arc<RouterLifecycle> {
        Arc::clone(&self.lifecycle)
    }

    #[must_use]
    pub fn listener(&self) -> &SubscriptionListener {
        &self.listener
    }

    /// Handle for on-demand table maintenance. Requests made before
    /// [`EventRouter::serve`] are applied once it starts.
    #[must_use]
    pub fn maintenance(&self) -> MaintenanceHandle {
        self.maintenance.clone()
    }

    /// Runs the startup writes and loads the initial routing table.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] on any bootstrap failure or if the route
    /// keys cannot be listed. All are fatal.
    pub async fn start(&self) -> Result<LoadReport, StartupError> {
        info!(
            commands = self.config.command_filter().len(),
            map_prefix = %self.config.map_prefix,
            "starting router"
        );
        bootstrap::initialize(self.store.as_ref(), &self.config.function_config).await?;
        let report = self.loader.load_all().await?;
        Ok(report)
    }

    /// Runs the listener until the bus closes.
    ///
    /// The maintenance worker runs alongside it, reconciling on the
    /// configured interval if one is set, and stops when the listener
    /// returns. Only the first call starts a worker.
    ///
    /// # Errors
    ///
    /// Returns [`ListenError`] if the subscription is not acknowledged.
    pub async fn serve(&self) -> Result<(), ListenError> {
        let interval = self.config.reconcile_interval();
        let queue = self.maintenance_queue.lock().take();
        let mut worker = match queue {
            Some(queue) => {
                if let Some(interval) = interval {
                    info!(interval_secs = interval.as_secs(), "periodic reconcile enabled");
                }
                Some(MaintenanceWorker::start(Arc::clone(&self.loader), queue, interval))
            }
            None => {
                warn!("maintenance worker already consumed; serving without it");
                None
            }
        };

        let result = self.listener.run().await;

        if let Some(worker) = worker.as_mut() {
            worker.stop().await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::error::{ConfigError, InvocationError, MaintenanceError};
    use crate::invoke::InvocationOutput;
    use crate::lifecycle::ListenerState;
    use crate::store::{MemoryBus, MemoryStore};
    use crate::worker::MaintenanceTask;

    struct NullInvoker;

    #[async_trait]
    impl FunctionInvoker for NullInvoker {
        async fn invoke(
            &self,
            _function: &str,
            _payload: Bytes,
        ) -> Result<InvocationOutput, InvocationError> {
            Ok(InvocationOutput {
                status: 200,
                payload: Bytes::new(),
            })
        }
    }

    fn config_with_file(file: &tempfile::NamedTempFile) -> RouterConfig {
        RouterConfig {
            supported_commands: "set,hset".to_string(),
            function_config: file.path().to_path_buf(),
            ..RouterConfig::default()
        }
    }

    #[tokio::test]
    async fn start_bootstraps_and_loads_existing_routes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resize | width,640").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert_hash("map:a", [("name", "a"), ("pattern", "*"), ("lambda", "fnA")]);

        let router = EventRouter::new(
            config_with_file(&file),
            store.clone(),
            Arc::new(MemoryBus::new()),
            Arc::new(NullInvoker),
        );
        let report = router.start().await.unwrap();

        assert_eq!(report.loaded, 1);
        assert_eq!(router.table().len(), 1);
        assert_eq!(store.value("connected").as_deref(), Some("true"));
        assert_eq!(router.lifecycle().state(), ListenerState::Disconnected);
    }

    #[tokio::test]
    async fn serve_returns_when_bus_closes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let bus = Arc::new(MemoryBus::new());
        let router = EventRouter::new(
            RouterConfig {
                reconcile_interval_secs: 1,
                ..config_with_file(&file)
            },
            Arc::new(MemoryStore::new()),
            bus.clone(),
            Arc::new(NullInvoker),
        );
        router.start().await.unwrap();

        bus.close();
        tokio::time::timeout(Duration::from_secs(2), router.serve())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(router.lifecycle().state(), ListenerState::Terminated);
    }

    #[tokio::test]
    async fn connect_rejects_invalid_config_before_io() {
        let config = RouterConfig {
            map_prefix: String::new(),
            ..RouterConfig::default()
        };
        assert!(matches!(
            EventRouter::connect(config).await,
            Err(StartupError::Config(_))
        ));
    }

    #[tokio::test]
    async fn connect_rejects_missing_endpoint_before_io() {
        // Port 1 is never contacted: validation fails first.
        let config = RouterConfig {
            store_port: 1,
            invoke_endpoint: None,
            ..RouterConfig::default()
        };
        assert!(matches!(
            EventRouter::connect(config).await,
            Err(StartupError::Config(ConfigError::MissingInvokeEndpoint { .. }))
        ));
    }

    #[tokio::test]
    async fn maintenance_compacts_while_serving() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert_hash("map:a", [("name", "a"), ("pattern", "*"), ("lambda", "fnA")]);
        let bus = Arc::new(MemoryBus::new());
        let router = EventRouter::new(
            config_with_file(&file),
            store,
            bus.clone(),
            Arc::new(NullInvoker),
        );
        router.start().await.unwrap();
        router.loader().load_one("map:a").await.unwrap();
        assert_eq!(router.table().len(), 2);

        let handle = router.maintenance();
        let (served, ()) = tokio::join!(router.serve(), async {
            handle.submit(MaintenanceTask::Compact).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            bus.close();
        });
        served.unwrap();

        assert_eq!(router.table().len(), 1);
        assert!(matches!(
            handle.submit(MaintenanceTask::Reconcile).await,
            Err(MaintenanceError::Stopped)
        ));
    }
}
