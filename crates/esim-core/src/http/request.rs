//! Request and response values for the executor

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Engine;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default attempt budget when neither the client nor the call sets one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// How the executor authenticates a request
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// No `Authorization` header
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: Basic base64(username:password)`
    Basic {
        /// User name
        username: String,
        /// Password
        password: String,
    },
}

impl AuthMode {
    /// Value of the `Authorization` header, if any
    pub fn header_value(&self) -> Option<String> {
        match self {
            AuthMode::None => None,
            AuthMode::Bearer(token) => Some(format!("Bearer {}", token)),
            AuthMode::Basic { username, password } => Some(format!(
                "Basic {}",
                Base64Engine.encode(format!("{}:{}", username, password))
            )),
        }
    }
}

// Credentials never reach logs
impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => f.write_str("None"),
            AuthMode::Bearer(_) => f.write_str("Bearer(<REDACTED>)"),
            AuthMode::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured body, serialized as JSON
    Json(Value),
    /// Raw text body, sent as-is
    Text(String),
}

/// One logical outbound call
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Absolute base URL of the vendor API
    pub base_url: String,
    /// Path relative to `base_url`, or an absolute URL used verbatim
    pub path: String,
    /// HTTP method
    pub method: Method,
    /// Optional payload
    pub body: Option<RequestBody>,
    /// Explicit headers; never overwritten by defaults
    pub headers: HeaderMap,
    /// Authentication strategy
    pub auth: AuthMode,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Attempt budget (must be >= 1)
    pub max_attempts: u32,
}

impl ProviderRequest {
    /// Create a GET request with default timeout and attempts
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            auth: AuthMode::None,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Attach a JSON body
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Attach a raw text body
    pub fn with_text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    /// Replace the explicit headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the authentication strategy
    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Resolve the full request URL
    ///
    /// `base_url` must be an absolute http(s) URL. An absolute http(s) `path`
    /// is used verbatim; otherwise it is joined to `base_url` with exactly one
    /// slash between them.
    pub fn resolve_url(&self) -> Result<Url> {
        let base = parse_absolute(&self.base_url)
            .ok_or_else(|| Error::config(format!("Invalid base URL: '{}'", self.base_url)))?;

        if let Some(absolute) = parse_absolute(&self.path) {
            return Ok(absolute);
        }

        if self.path.is_empty() {
            return Ok(base);
        }

        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| {
            Error::config(format!("Invalid request path '{}': {}", self.path, e))
        })
    }

    /// Explicit headers plus the defaults the executor adds
    ///
    /// `Content-Type: application/json` is added for JSON bodies and the auth
    /// header for the configured strategy, each only when absent.
    pub fn prepared_headers(&self) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();

        if matches!(self.body, Some(RequestBody::Json(_))) && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        if !headers.contains_key(AUTHORIZATION)
            && let Some(value) = self.auth.header_value()
        {
            let mut value = HeaderValue::from_str(&value)
                .map_err(|_| Error::config("Credentials contain characters invalid in a header"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Serialized body bytes
    pub fn body_bytes(&self) -> Result<Option<Vec<u8>>> {
        match &self.body {
            None => Ok(None),
            Some(RequestBody::Json(value)) => Ok(Some(serde_json::to_vec(value)?)),
            Some(RequestBody::Text(text)) => Ok(Some(text.clone().into_bytes())),
        }
    }
}

fn parse_absolute(candidate: &str) -> Option<Url> {
    Url::parse(candidate)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

/// Successful response body
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// Parsed JSON (malformed JSON becomes an empty object)
    Json(Value),
    /// Raw text for non-JSON content types
    Text(String),
}

impl ProviderResponse {
    /// Interpret a 2xx body according to its content type
    pub fn from_body(is_json: bool, body: &str) -> Self {
        if !is_json {
            return ProviderResponse::Text(body.to_string());
        }
        if body.trim().is_empty() {
            return ProviderResponse::Json(Value::Object(Map::new()));
        }
        match serde_json::from_str(body) {
            Ok(value) => ProviderResponse::Json(value),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    "Malformed JSON in provider response, using empty object"
                );
                ProviderResponse::Json(Value::Object(Map::new()))
            }
        }
    }

    /// Body as JSON; text bodies are parsed when possible and kept as a string otherwise
    pub fn into_json(self) -> Value {
        match self {
            ProviderResponse::Json(value) => value,
            ProviderResponse::Text(text) => {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            }
        }
    }
}
