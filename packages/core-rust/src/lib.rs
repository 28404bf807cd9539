//! `evrouter` core: route entries, the routing table, command filtering,
//! event matching, and dispatch envelopes.
//!
//! Everything here is synchronous and free of I/O; the server crate wires
//! it to the store, the notification bus, and the function invoker.

pub mod command;
pub mod envelope;
pub mod error;
pub mod event;
pub mod matcher;
pub mod route;
pub mod table;
pub mod types;

pub use command::CommandFilter;
pub use envelope::DispatchEnvelope;
pub use error::DecodeError;
pub use event::{EventKind, InboundEvent};
pub use matcher::{MatchOutcome, Matcher};
pub use route::{RouteEntry, WILDCARD};
pub use table::{RoutingTable, TableSnapshot};
pub use types::FieldMap;
