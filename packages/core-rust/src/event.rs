//! Inbound bus notifications and their classification.

/// Separator between the notification namespace and the command token in a
/// channel name, e.g. `__keyevent@0__:set`.
pub const CHANNEL_DELIMITER: char = ':';

/// One `(channel, payload)` notification received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Channel the notification arrived on; encodes the command token.
    pub channel: String,
    /// Map-update marker or the key of the changed record.
    pub payload: String,
}

/// What the listener should do with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Payload names a route-definition record to (re)load.
    MapUpdate,
    /// Payload names an ordinary data record.
    Data,
}

impl InboundEvent {
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Command token: the channel segment following the first delimiter.
    ///
    /// `__keyevent@0__:set` yields `set`. Returns `None` when the channel
    /// carries no delimiter.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.channel.split(CHANNEL_DELIMITER).nth(1)
    }

    /// Map-update iff the payload starts with `map_prefix`.
    #[must_use]
    pub fn classify(&self, map_prefix: &str) -> EventKind {
        if self.payload.starts_with(map_prefix) {
            EventKind::MapUpdate
        } else {
            EventKind::Data
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_from_keyevent_channel() {
        let event = InboundEvent::new("__keyevent@0__:set", "user:42");
        assert_eq!(event.command(), Some("set"));
    }

    #[test]
    fn command_is_segment_after_first_delimiter() {
        let event = InboundEvent::new("__keyspace@0__:user:42", "hset");
        assert_eq!(event.command(), Some("user"));
    }

    #[test]
    fn channel_without_delimiter_has_no_command() {
        let event = InboundEvent::new("plainchannel", "user:42");
        assert_eq!(event.command(), None);
    }

    #[test]
    fn classify_by_payload_prefix() {
        let update = InboundEvent::new("__keyevent@0__:hset", "map:eventA");
        let data = InboundEvent::new("__keyevent@0__:hset", "user:42");
        let almost = InboundEvent::new("__keyevent@0__:hset", "ma:eventA");

        assert_eq!(update.classify("map:"), EventKind::MapUpdate);
        assert_eq!(data.classify("map:"), EventKind::Data);
        assert_eq!(almost.classify("map:"), EventKind::Data);
    }
}
