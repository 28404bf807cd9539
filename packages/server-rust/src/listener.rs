//! Bus subscription and the sequential message loop.
//!
//! The listener processes notifications one at a time in bus order.
//! Map-update signals are loaded inline before the next message is read,
//! so table writes and matching passes never interleave within the loop.
//! Data events are matched against a table snapshot and handed to the
//! [`Dispatcher`], which returns without waiting for any invocation.

use std::sync::Arc;

use evrouter_core::{EventKind, InboundEvent, Matcher, RoutingTable};
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::ListenError;
use crate::lifecycle::{ListenerState, RouterLifecycle};
use crate::loader::MapLoader;
use crate::store::NotificationBus;

/// What the listener did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Route record at `key` was appended to the table.
    MapLoaded { key: String },
    /// Route record at `key` could not be loaded; nothing was appended.
    MapRejected { key: String },
    /// Command not supported; nothing to do.
    NotActionable,
    /// Command supported but no entry matched.
    NoMatch,
    /// One dispatch task spawned per target.
    Dispatched { targets: Vec<String> },
}

/// Owns the bus subscription and routes each message to the loader or the
/// matcher/dispatcher pair.
pub struct SubscriptionListener {
    bus: Arc<dyn NotificationBus>,
    channel_pattern: String,
    loader: Arc<MapLoader>,
    matcher: Matcher,
    table: Arc<RoutingTable>,
    dispatcher: Arc<Dispatcher>,
    lifecycle: Arc<RouterLifecycle>,
}

impl SubscriptionListener {
    #[must_use]
    pub fn new(
        bus: Arc<dyn NotificationBus>,
        channel_pattern: impl Into<String>,
        loader: Arc<MapLoader>,
        matcher: Matcher,
        dispatcher: Arc<Dispatcher>,
        lifecycle: Arc<RouterLifecycle>,
    ) -> Self {
        let table = Arc::clone(loader.table());
        Self {
            bus,
            channel_pattern: channel_pattern.into(),
            loader,
            matcher,
            table,
            dispatcher,
            lifecycle,
        }
    }

    /// Subscribes and processes messages until the bus closes.
    ///
    /// # Errors
    ///
    /// Returns [`ListenError::Subscribe`] if the subscription is not
    /// acknowledged. This is fatal: there is no retry.
    pub async fn run(&self) -> Result<(), ListenError> {
        self.lifecycle.transition(ListenerState::Subscribing);
        let mut events = match self.bus.subscribe(&self.channel_pattern).await {
            Ok(events) => events,
            Err(e) => {
                error!(pattern = %self.channel_pattern, error = %e, "subscription failed");
                self.lifecycle.transition(ListenerState::Terminated);
                return Err(ListenError::Subscribe(e));
            }
        };

        self.lifecycle.transition(ListenerState::Active);
        info!(pattern = %self.channel_pattern, "listening for notifications");

        while let Some(event) = events.next().await {
            self.handle(event).await;
        }

        drop(events);
        self.lifecycle.transition(ListenerState::Terminated);
        info!(
            in_flight = self.lifecycle.in_flight_count(),
            "notification bus closed"
        );
        Ok(())
    }

    /// Classifies and processes one message.
    pub async fn handle(&self, event: InboundEvent) -> MessageOutcome {
        debug!(channel = %event.channel, payload = %event.payload, "notification");

        match event.classify(self.loader.map_prefix()) {
            EventKind::MapUpdate => {
                let key = event.payload;
                match self.loader.load_one(&key).await {
                    Ok(_) => MessageOutcome::MapLoaded { key },
                    Err(e) => {
                        warn!(key = %key, error = %e, "map update ignored");
                        MessageOutcome::MapRejected { key }
                    }
                }
            }
            EventKind::Data => {
                let snapshot = self.table.snapshot();
                let outcome = self.matcher.match_event(&event, &snapshot);
                if !outcome.actionable {
                    return MessageOutcome::NotActionable;
                }
                if outcome.targets.is_empty() {
                    return MessageOutcome::NoMatch;
                }

                self.dispatcher
                    .spawn_all(&event.payload, outcome.targets.clone());
                MessageOutcome::Dispatched {
                    targets: outcome.targets,
                }
            }
        }
    }
}
