//! HTTP request executor
//!
//! Executes exactly one logical outbound call with bounded retries:
//!
//! 1. Resolve the URL and headers (configuration errors fail here, without I/O)
//! 2. Send one attempt under a per-attempt timeout
//! 3. 2xx → parse; 4xx → fail; 5xx / transport failure → back off and retry
//! 4. After `max_attempts`, the last error propagates
//!
//! Attempts are strictly sequential. An external [`CancellationToken`] aborts
//! the in-flight attempt (or the backoff sleep) and surfaces as
//! [`Error::Timeout`] with `cancelled = true`.

use crate::error::{Error, Result, body_preview};
use crate::http::request::{ProviderRequest, ProviderResponse};
use crate::http::retry::BackoffPolicy;
use crate::http::transport::{
    ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
use reqwest::header::HeaderMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Executes provider requests with timeout, retry and backoff
#[derive(Clone)]
pub struct HttpExecutor {
    transport: Arc<dyn Transport>,
    backoff: BackoffPolicy,
}

impl fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl HttpExecutor {
    /// Create an executor over the production reqwest transport
    pub fn new(backoff: BackoffPolicy) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(ReqwestTransport::new()?), backoff))
    }

    /// Create an executor over a custom transport
    pub fn with_transport(transport: Arc<dyn Transport>, backoff: BackoffPolicy) -> Self {
        Self { transport, backoff }
    }

    /// Execute a request
    ///
    /// # Returns
    ///
    /// - `Ok(ProviderResponse)`: 2xx response body
    /// - `Err(Error::Config)`: invalid base URL, headers or attempt budget (no I/O)
    /// - `Err(Error::Http)`: non-2xx response (4xx immediately, 5xx after retries)
    /// - `Err(Error::Timeout)` / `Err(Error::Network)`: transport failure after retries
    pub async fn execute(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        self.execute_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Execute a request that can be aborted through `cancel`
    pub async fn execute_with_cancel(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse> {
        if request.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }

        let url = request.resolve_url()?;
        let headers = request.prepared_headers()?;
        let body = request.body_bytes()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                method = %request.method,
                url = %url,
                attempt,
                max_attempts = request.max_attempts,
                "Sending provider request"
            );

            let error = match self
                .attempt(request, &url, &headers, body.clone(), attempt, cancel)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= request.max_attempts {
                warn!(
                    url = %url,
                    attempt,
                    code = %error.code(),
                    error = %error,
                    "Provider request failed"
                );
                return Err(error);
            }

            let delay = self.backoff.delay_for_attempt(attempt);
            warn!(
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Provider request failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Err(Error::timeout(url.as_str(), attempt, true));
                }
            }
        }
    }

    /// One attempt under the per-attempt timeout
    async fn attempt(
        &self,
        request: &ProviderRequest,
        url: &Url,
        headers: &HeaderMap,
        body: Option<Vec<u8>>,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse> {
        let exchange = self.transport.send(TransportRequest {
            method: request.method.clone(),
            url: url.clone(),
            headers: headers.clone(),
            body,
        });

        // Dropping the exchange future aborts the in-flight call
        let outcome = tokio::select! {
            outcome = tokio::time::timeout(request.timeout, exchange) => outcome,
            _ = cancel.cancelled() => {
                return Err(Error::timeout(url.as_str(), attempt, true));
            }
        };

        match outcome {
            Err(_elapsed) => Err(Error::timeout(url.as_str(), attempt, false)),
            Ok(Err(TransportError::Timeout)) => Err(Error::timeout(url.as_str(), attempt, false)),
            Ok(Err(TransportError::Invalid(message))) => Err(Error::config(format!(
                "Request to {} could not be built: {}",
                url, message
            ))),
            Ok(Err(e)) => Err(Error::Network {
                url: url.to_string(),
                attempts: attempt,
                message: e.to_string(),
            }),
            Ok(Ok(response)) => interpret(url, response),
        }
    }
}

/// Turn a raw response into a body or an HTTP error
fn interpret(url: &Url, response: TransportResponse) -> Result<ProviderResponse> {
    if response.status.is_success() {
        return Ok(ProviderResponse::from_body(response.is_json(), &response.body));
    }

    Err(Error::Http {
        url: url.to_string(),
        status: response.status.as_u16(),
        status_text: response
            .status
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
        body: (!response.body.is_empty()).then(|| body_preview(&response.body)),
    })
}
