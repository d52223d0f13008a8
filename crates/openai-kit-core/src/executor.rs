use std::time::Duration;

use serde::Deserialize;

use crate::{
    error::{self, RequestError},
    request::RequestSpec,
};

/// One-shot request/response path.
///
/// Sends a single request, waits for the whole body and decodes it. There is no
/// lifecycle state and no retry; every failure is reported exactly once.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl RequestExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Bound every request sent through this executor.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Execute the request and decode a JSON response body
    pub async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        spec: &RequestSpec,
    ) -> Result<T, RequestError> {
        let bytes = self.send_bytes(spec).await?;
        if bytes.is_empty() {
            return Err(RequestError::InvalidResponseShape(format!(
                "empty response body from {}",
                spec.url
            )));
        }
        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            tracing::debug!(url = %spec.url, error = %e, "response body did not decode");
            RequestError::Decode(e)
        })
    }

    /// Execute the request and return the raw successful body
    pub async fn send_bytes(&self, spec: &RequestSpec) -> Result<bytes::Bytes, RequestError> {
        let mut req = spec.build(&self.client)?;
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        tracing::debug!(method = ?spec.method, url = %spec.url, "sending request");
        let res = req.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;

        if status.is_success() {
            Ok(bytes)
        } else {
            let err = error::parse_error_response(status, &bytes);
            tracing::warn!(url = %spec.url, error = %err, "request failed");
            Err(err)
        }
    }
}
