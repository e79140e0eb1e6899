// # Transport
//
// The single network seam of the gateway. A transport performs exactly one
// HTTP exchange: no retries, no timeouts, no interpretation of the status.
// Those belong to `HttpExecutor`.
//
// ## Implementations
//
// - `ReqwestTransport`: production transport over reqwest
// - Tests substitute scripted transports to count calls and inject failures

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use url::Url;

/// One network exchange as seen by the transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Fully resolved URL
    pub url: Url,
    /// Final headers (auth and content type already applied)
    pub headers: HeaderMap,
    /// Serialized body
    pub body: Option<Vec<u8>>,
}

/// Raw response of one exchange
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status
    pub status: StatusCode,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Body text
    pub body: String,
}

impl TransportResponse {
    /// Create a response
    pub fn new(status: StatusCode, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// Create a JSON response
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::new(status, Some("application/json"), body.to_string())
    }

    /// Whether the content type announces JSON
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }
}

/// Transport-level failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The exchange timed out inside the transport
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established (refused, DNS failure)
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange failed after connecting (reset, truncated body)
    #[error("request failed: {0}")]
    Request(String),

    /// The request could not be built; never retried
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl TransportError {
    /// Classify a reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::Invalid(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Performs a single HTTP exchange
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and read the full response body
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Production transport over a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh client
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("esim-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| crate::Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}
