//! Redis-backed [`RecordStore`] and [`NotificationBus`].

use std::collections::HashMap;

use async_trait::async_trait;
use evrouter_core::{FieldMap, InboundEvent};
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, warn};

use super::{EventStream, NotificationBus, RecordStore};
use crate::error::StoreError;

/// Builds the connection URL for database 0 at `host:port`.
#[must_use]
pub fn redis_url(host: &str, port: u16) -> String {
    format!("redis://{host}:{port}/")
}

fn open_client(host: &str, port: u16) -> Result<redis::Client, StoreError> {
    redis::Client::open(redis_url(host, port)).map_err(|e| StoreError::Connection {
        addr: format!("{host}:{port}"),
        source: e.into(),
    })
}

/// Record store over a multiplexed Redis connection.
///
/// The connection is cheap to clone; every call works on its own clone so
/// concurrent dispatch tasks share one socket.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connects to the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the address is invalid or the
    /// server is unreachable.
    pub async fn connect(host: &str, port: u16) -> Result<Self, StoreError> {
        let client = open_client(host, port)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection {
                addr: format!("{host}:{port}"),
                source: e.into(),
            })?;
        debug!(host, port, "connected to store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl RecordStore for RedisStore {
    async fn fetch_fields(&self, key: &str) -> Result<FieldMap, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(key)
            .await
            .map_err(|e| StoreError::command("HGETALL", key, e))?;
        Ok(fields.into_iter().collect())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.keys(format!("{prefix}*"))
            .await
            .map_err(|e| StoreError::command("KEYS", prefix, e))
    }

    async fn write_fields(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset_multiple(key, fields)
            .await
            .map_err(|e| StoreError::command("HSET", key, e))?;
        Ok(())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(key, value)
            .await
            .map_err(|e| StoreError::command("SET", key, e))?;
        Ok(())
    }

    async fn enable_notifications(&self, flags: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg(flags)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("CONFIG SET", "notify-keyspace-events", e))?;
        Ok(())
    }
}

/// Pattern subscription over a dedicated pub/sub connection.
pub struct RedisBus {
    client: redis::Client,
    addr: String,
}

impl RedisBus {
    /// Prepares a bus client. No connection is made until [`NotificationBus::subscribe`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the address is invalid.
    pub fn new(host: &str, port: u16) -> Result<Self, StoreError> {
        Ok(Self {
            client: open_client(host, port)?,
            addr: format!("{host}:{port}"),
        })
    }
}

#[async_trait]
impl NotificationBus for RedisBus {
    async fn subscribe(&self, pattern: &str) -> Result<EventStream, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| StoreError::Connection {
                addr: self.addr.clone(),
                source: e.into(),
            })?;
        pubsub
            .psubscribe(pattern)
            .await
            .map_err(|e| StoreError::Subscribe {
                pattern: pattern.to_string(),
                source: e.into(),
            })?;

        let events = pubsub.into_on_message().filter_map(|msg| async move {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => Some(InboundEvent::new(channel, payload)),
                Err(e) => {
                    warn!(channel = %channel, error = %e, "dropping notification with non-text payload");
                    None
                }
            }
        });

        Ok(events.boxed())
    }
}
