//! In-memory [`RecordStore`] and [`NotificationBus`] implementations.
//!
//! [`MemoryStore`] keeps hashes in a [`DashMap`] and, once notifications are
//! enabled and a [`MemoryBus`] is attached, publishes a keyevent
//! notification for every write, the way the real store does.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use evrouter_core::{FieldMap, InboundEvent};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{EventStream, NotificationBus, RecordStore};
use crate::error::StoreError;

/// Database index used in generated keyevent channel names.
const KEYEVENT_CHANNEL_PREFIX: &str = "__keyevent@0__";

/// Concurrent in-memory record store.
#[derive(Default)]
pub struct MemoryStore {
    hashes: DashMap<String, FieldMap>,
    values: DashMap<String, String>,
    notify_flags: Mutex<Option<String>>,
    bus: Option<Arc<MemoryBus>>,
}

impl MemoryStore {
    /// Creates an empty store with no bus attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that publishes write notifications on `bus`.
    #[must_use]
    pub fn with_bus(bus: Arc<MemoryBus>) -> Self {
        Self {
            bus: Some(bus),
            ..Self::default()
        }
    }

    /// Inserts a hash directly, bypassing notifications.
    pub fn insert_hash<I, K, V>(&self, key: &str, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entry = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert(field.into(), value.into());
        }
    }

    /// Removes a hash directly, bypassing notifications.
    pub fn remove_hash(&self, key: &str) {
        self.hashes.remove(key);
    }

    /// Returns a plain string value, if set.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.clone())
    }

    /// Returns the notification flags last enabled, if any.
    #[must_use]
    pub fn notify_flags(&self) -> Option<String> {
        self.notify_flags.lock().clone()
    }

    fn notify(&self, command: &str, key: &str) {
        if self.notify_flags.lock().is_none() {
            return;
        }
        if let Some(bus) = &self.bus {
            bus.publish(format!("{KEYEVENT_CHANNEL_PREFIX}:{command}"), key);
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_fields(&self, key: &str) -> Result<FieldMap, StoreError> {
        Ok(self.hashes.get(key).map(|h| h.clone()).unwrap_or_default())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .hashes
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.values.iter().map(|entry| entry.key().clone()))
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn write_fields(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        self.insert_hash(key, fields.iter().cloned());
        self.notify("hset", key);
        Ok(())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        self.notify("set", key);
        Ok(())
    }

    async fn enable_notifications(&self, flags: &str) -> Result<(), StoreError> {
        *self.notify_flags.lock() = Some(flags.to_string());
        Ok(())
    }
}

/// In-process notification bus with a single subscriber.
///
/// Events published before the subscription are buffered and delivered in
/// order. [`MemoryBus::close`] ends the subscriber's stream. Channel
/// patterns may use `*` and `?`; any other glob syntax is refused at
/// subscription time.
pub struct MemoryBus {
    tx: Mutex<Option<mpsc::UnboundedSender<InboundEvent>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<InboundEvent>>>,
    reject_subscribe: bool,
}

impl MemoryBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            reject_subscribe: false,
        }
    }

    /// A bus that never acknowledges subscriptions.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            reject_subscribe: true,
            ..Self::new()
        }
    }

    /// Publishes one notification. Dropped silently once the bus is closed.
    pub fn publish(&self, channel: impl Into<String>, payload: impl Into<String>) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(InboundEvent::new(channel, payload));
        }
    }

    /// Closes the bus. The subscriber drains buffered events, then its stream ends.
    pub fn close(&self) {
        self.tx.lock().take();
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationBus for MemoryBus {
    async fn subscribe(&self, pattern: &str) -> Result<EventStream, StoreError> {
        if self.reject_subscribe {
            return Err(StoreError::Subscribe {
                pattern: pattern.to_string(),
                source: "subscription rejected".into(),
            });
        }
        if !glob_supported(pattern) {
            return Err(StoreError::Subscribe {
                pattern: pattern.to_string(),
                source: "character classes and escapes are not supported".into(),
            });
        }
        let rx = self.rx.lock().take().ok_or(StoreError::BusTaken)?;
        let pattern = pattern.to_string();

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .filter(move |event| {
            let keep = glob_match(&pattern, &event.channel);
            async move { keep }
        });

        Ok(events.boxed())
    }
}

/// Whether [`glob_match`] can honour `pattern`.
///
/// The real bus also accepts `[...]` classes and `\` escapes; those are
/// refused here rather than silently matched as literals.
fn glob_supported(pattern: &str) -> bool {
    !pattern.contains(['[', ']', '\\'])
}

/// Channel-pattern match over the subset `*` (any run) and `?` (any one
/// char). Every other character matches itself.
fn glob_match(pattern: &str, channel: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let channel: Vec<char> = channel.chars().collect();
    let (mut p, mut c) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while c < channel.len() {
        match pattern.get(p).copied() {
            Some('*') => {
                star = Some((p, c));
                p += 1;
            }
            Some(ch) if ch == '?' || ch == channel[c] => {
                p += 1;
                c += 1;
            }
            _ => match star {
                Some((star_p, star_c)) => {
                    p = star_p + 1;
                    c = star_c + 1;
                    star = Some((star_p, star_c + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&ch| ch == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_missing_key_is_empty() {
        let store = MemoryStore::new();
        assert!(store.fetch_fields("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keys_with_prefix_lists_hashes_and_values() {
        let store = MemoryStore::new();
        store.insert_hash("map:a", [("name", "a")]);
        store.insert_hash("user:1", [("name", "ada")]);
        store.set_value("map:marker", "x").await.unwrap();

        let keys = store.keys_with_prefix("map:").await.unwrap();
        assert_eq!(keys, vec!["map:a", "map:marker"]);
    }

    #[tokio::test]
    async fn writes_publish_only_after_notifications_enabled() {
        let bus = Arc::new(MemoryBus::new());
        let store = MemoryStore::with_bus(Arc::clone(&bus));
        let events = bus.subscribe("*").await.unwrap();

        store.set_value("quiet", "1").await.unwrap();
        store.enable_notifications("EA").await.unwrap();
        store
            .write_fields("user:1", &[("name".to_string(), "ada".to_string())])
            .await
            .unwrap();
        bus.close();

        let received: Vec<InboundEvent> = events.collect().await;
        assert_eq!(
            received,
            vec![InboundEvent::new("__keyevent@0__:hset", "user:1")]
        );
    }

    #[tokio::test]
    async fn subscription_filters_by_pattern() {
        let bus = MemoryBus::new();
        bus.publish("__keyevent@0__:set", "a");
        bus.publish("__keyspace@0__:a", "set");
        bus.publish("__keyevent@0__:del", "b");
        bus.close();

        let events: Vec<InboundEvent> =
            bus.subscribe("__keyevent@*__:*").await.unwrap().collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload, "a");
        assert_eq!(events[1].payload, "b");
    }

    #[tokio::test]
    async fn second_subscription_is_refused() {
        let bus = MemoryBus::new();
        let _first = bus.subscribe("*").await.unwrap();
        assert!(matches!(bus.subscribe("*").await, Err(StoreError::BusTaken)));
    }

    #[tokio::test]
    async fn rejecting_bus_fails_subscription() {
        let bus = MemoryBus::rejecting();
        assert!(matches!(
            bus.subscribe("*").await,
            Err(StoreError::Subscribe { .. })
        ));
    }

    #[test]
    fn glob_patterns() {
        assert!(glob_match("*", ""));
        assert!(glob_match("__keyevent@*__:*", "__keyevent@0__:set"));
        assert!(glob_match("__keyevent@?__:set", "__keyevent@0__:set"));
        assert!(!glob_match("__keyevent@0__:set", "__keyevent@0__:del"));
        assert!(!glob_match("__keyevent@*__:s*", "__keyspace@0__:set"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b", "axxc"));
    }

    #[tokio::test]
    async fn class_and_escape_patterns_are_refused() {
        for pattern in ["__keyevent@[01]__:*", "__keyevent@0__:\\*"] {
            let bus = MemoryBus::new();
            assert!(
                matches!(
                    bus.subscribe(pattern).await,
                    Err(StoreError::Subscribe { .. })
                ),
                "{pattern}"
            );
        }
    }
}
