//! `evrouter` server: watches store change notifications, matches them
//! against a dynamically loaded routing table, and invokes external compute
//! functions concurrently.
//!
//! 1. **Bootstrap** (`bootstrap`): notification config, readiness marker, seeded records
//! 2. **Loading** (`loader`): route-definition records -> `RoutingTable`
//! 3. **Listening** (`listener`): sequential message loop, map-update vs data classification
//! 4. **Dispatch** (`dispatcher`): one fire-and-forget task per matched target
//! 5. **Maintenance** (`worker`): on-demand and periodic reconcile or compaction

pub mod bootstrap;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod function_config;
pub mod invoke;
pub mod lifecycle;
pub mod listener;
pub mod loader;
pub mod router;
pub mod store;
pub mod worker;

pub use config::{LogFormat, RouterConfig};
pub use dispatcher::Dispatcher;
pub use error::{
    ConfigError, DispatchError, InvocationError, ListenError, LoadError, MaintenanceError,
    StartupError, StoreError,
};
pub use invoke::{FunctionInvoker, InvocationOutput, LambdaHttpInvoker};
pub use lifecycle::{ListenerState, RouterLifecycle};
pub use listener::{MessageOutcome, SubscriptionListener};
pub use loader::{LoadReport, MapLoader};
pub use router::EventRouter;
pub use store::{EventStream, MemoryBus, MemoryStore, NotificationBus, RecordStore};
pub use worker::{MaintenanceHandle, MaintenanceTask};
