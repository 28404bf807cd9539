//! [`FunctionInvoker`] over the Lambda `Invoke` HTTP API.
//!
//! Requests are sent unsigned, which suits local runtimes (emulators,
//! LocalStack) and deployments behind a signing proxy.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use super::{FunctionInvoker, InvocationOutput};
use crate::error::InvocationError;

/// Header carrying the function-level error kind on a 200 response.
const FUNCTION_ERROR_HEADER: &str = "X-Amz-Function-Error";

/// Header selecting synchronous invocation.
const INVOCATION_TYPE_HEADER: &str = "X-Amz-Invocation-Type";

/// Invoke API client for one endpoint.
#[derive(Debug, Clone)]
pub struct LambdaHttpInvoker {
    client: Client,
    endpoint: String,
}

impl LambdaHttpInvoker {
    /// Creates an invoker for `endpoint` (scheme + host, no trailing path).
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn invocation_url(&self, function: &str) -> String {
        format!("{}/2015-03-31/functions/{function}/invocations", self.endpoint)
    }
}

#[async_trait]
impl FunctionInvoker for LambdaHttpInvoker {
    async fn invoke(&self, function: &str, payload: Bytes) -> Result<InvocationOutput, InvocationError> {
        let url = self.invocation_url(function);
        debug!(function, url = %url, "invoking function");

        let response = self
            .client
            .post(&url)
            .header(INVOCATION_TYPE_HEADER, "RequestResponse")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| InvocationError::Transport {
                function: function.to_string(),
                source: e.into(),
            })?;

        let status = response.status();
        let function_error = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| InvocationError::Transport {
            function: function.to_string(),
            source: e.into(),
        })?;

        if !status.is_success() {
            return Err(InvocationError::Rejected {
                function: function.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        if let Some(kind) = function_error {
            return Err(InvocationError::FunctionFailed {
                function: function.to_string(),
                kind,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(InvocationOutput {
            status: status.as_u16(),
            payload: body,
        })
    }
}
