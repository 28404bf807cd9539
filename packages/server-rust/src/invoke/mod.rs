//! Seam to the remote function-invocation service.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::InvocationError;

pub use self::http::LambdaHttpInvoker;

/// Response returned by a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutput {
    /// HTTP-level status reported by the invoke endpoint.
    pub status: u16,
    /// Raw payload returned by the function.
    pub payload: Bytes,
}

/// Invokes an external compute function by identifier.
///
/// Used as `Arc<dyn FunctionInvoker>` and shared by all dispatch tasks.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Invoke `function` synchronously with `payload`, returning its response.
    async fn invoke(&self, function: &str, payload: Bytes) -> Result<InvocationOutput, InvocationError>;
}
