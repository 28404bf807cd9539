//! Typed error taxonomy for the router.
//!
//! Only [`StartupError`] and [`ListenError`] are fatal. Everything raised
//! while processing a single message or dispatch is logged and isolated to
//! that message or dispatch.

use std::path::PathBuf;

use evrouter_core::DecodeError;

/// Boxed backend error, so the store traits do not leak a client library.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid or unreadable static configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read function config {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("function config line {line}: missing `|` separator")]
    MissingSeparator { line: usize },
    #[error("function config line {line}: record name is empty")]
    EmptyName { line: usize },
    #[error("function config line {line}: expected field/value pairs, got {count} items")]
    UnpairedFields { line: usize, count: usize },
    #[error("map prefix must not be empty")]
    EmptyMapPrefix,
    #[error("invalid store port: {0}")]
    InvalidPort(u16),
    #[error(
        "no invoke endpoint configured: requests are unsigned, so https://lambda.{region}.amazonaws.com \
         would reject them; set LAMBDA_ENDPOINT to a signing proxy or a local runtime"
    )]
    MissingInvokeEndpoint { region: String },
}

/// Failure talking to the key-value store or its notification bus.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot connect to store at {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: BackendError,
    },
    #[error("store command {operation} on `{key}` failed: {source}")]
    Command {
        operation: &'static str,
        key: String,
        #[source]
        source: BackendError,
    },
    #[error("subscription to `{pattern}` was not acknowledged: {source}")]
    Subscribe {
        pattern: String,
        #[source]
        source: BackendError,
    },
    #[error("notification bus already has a subscriber")]
    BusTaken,
}

impl StoreError {
    pub(crate) fn command(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<BackendError>,
    ) -> Self {
        Self::Command {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }
}

/// Failure invoking an external function.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("invoke request for `{function}` failed: {source}")]
    Transport {
        function: String,
        #[source]
        source: BackendError,
    },
    #[error("invoke endpoint rejected `{function}` with status {status}: {body}")]
    Rejected {
        function: String,
        status: u16,
        body: String,
    },
    #[error("function `{function}` reported {kind} error: {body}")]
    FunctionFailed {
        function: String,
        kind: String,
        body: String,
    },
}

/// A route-definition record could not be loaded into the table.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("route record `{key}` is malformed: {source}")]
    Decode {
        key: String,
        #[source]
        source: DecodeError,
    },
}

/// A single dispatch failed. Never propagated past the dispatch task.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot encode snapshot of `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// The listener could not enter the `Active` state.
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error(transparent)]
    Subscribe(StoreError),
}

/// A maintenance request could not be queued.
#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("maintenance worker is not running")]
    Stopped,
}

/// Fatal failure during process bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot build invoke client: {0}")]
    InvokeClient(#[source] reqwest::Error),
}
