//! Seams to the key-value store and its publish/subscribe bus.
//!
//! - [`RecordStore`]: hash records, key scans, and the one-time startup writes
//! - [`NotificationBus`]: pattern subscription yielding an ordered
//!   [`EventStream`] of `(channel, payload)` notifications
//!
//! Implementations: [`RedisStore`]/[`RedisBus`] in production,
//! [`MemoryStore`]/[`MemoryBus`] for tests and local runs.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use evrouter_core::{FieldMap, InboundEvent};
use futures_util::stream::BoxStream;

use crate::error::StoreError;

pub use self::memory::{MemoryBus, MemoryStore};
pub use self::redis_store::{RedisBus, RedisStore};

/// Ordered notifications from the bus. Ends when the bus closes.
pub type EventStream = BoxStream<'static, InboundEvent>;

/// Record access used by the loader, the dispatcher, and bootstrap.
///
/// Used as `Arc<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read every field of the hash at `key`. A missing key yields an empty map.
    async fn fetch_fields(&self, key: &str) -> Result<FieldMap, StoreError>;

    /// List every key whose name starts with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Set the given field/value pairs on the hash at `key`.
    async fn write_fields(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;

    /// Set a plain string value.
    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Turn on keyspace-notification delivery with the given event flags.
    async fn enable_notifications(&self, flags: &str) -> Result<(), StoreError>;
}

/// Publish/subscribe transport of the store.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    /// Subscribe to channels matching `pattern`.
    ///
    /// Resolves only after the subscription is acknowledged.
    async fn subscribe(&self, pattern: &str) -> Result<EventStream, StoreError>;
}
