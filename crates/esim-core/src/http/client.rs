//! Provider client factory
//!
//! A [`ProviderClient`] binds a base URL, an auth strategy and default headers
//! to a shared [`HttpExecutor`], so adapters only name the path and payload.

use crate::error::{Error, Result};
use crate::http::executor::HttpExecutor;
use crate::http::request::{
    AuthMode, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT, ProviderRequest, ProviderResponse,
    RequestBody,
};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Construction-time settings of a provider client
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Absolute base URL; required
    pub base_url: Option<String>,
    /// Authentication strategy
    pub auth: AuthMode,
    /// Headers sent with every call unless overridden per call
    pub default_headers: HeaderMap,
    /// Default per-attempt timeout
    pub timeout: Option<Duration>,
    /// Default attempt budget
    pub max_attempts: Option<u32>,
}

impl ClientConfig {
    /// Create a config for a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Authenticate with `Authorization: Bearer <api_key>`
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.auth = AuthMode::Bearer(api_key.into());
        self
    }

    /// Authenticate with HTTP basic auth
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = AuthMode::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Add a default header
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Set the default per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the default attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// HTTP method (GET when unset)
    pub method: Option<Method>,
    /// Payload
    pub body: Option<RequestBody>,
    /// Headers merged over the client defaults; per-call values win
    pub headers: HeaderMap,
    /// Per-attempt timeout override
    pub timeout: Option<Duration>,
    /// Attempt budget override
    pub max_attempts: Option<u32>,
}

impl CallOptions {
    /// GET with no body
    pub fn get() -> Self {
        Self::default()
    }

    /// Method with a JSON body
    pub fn json(method: Method, body: Value) -> Self {
        Self {
            method: Some(method),
            body: Some(RequestBody::Json(body)),
            ..Self::default()
        }
    }

    /// POST with a JSON body
    pub fn post_json(body: Value) -> Self {
        Self::json(Method::POST, body)
    }

    /// Add a header for this call only
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Override the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::config(format!("Invalid header name: '{}'", name)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| Error::config(format!("Invalid value for header '{}'", name)))?;
    Ok((header_name, header_value))
}

/// Reusable call function scoped to one provider
#[derive(Clone)]
pub struct ProviderClient {
    base_url: String,
    auth: AuthMode,
    default_headers: HeaderMap,
    timeout: Duration,
    max_attempts: u32,
    executor: Arc<HttpExecutor>,
}

// Custom Debug implementation that hides credentials
impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl ProviderClient {
    /// Create a client
    ///
    /// Fails fast, without any network call, when the base URL is absent or
    /// not an absolute http(s) URL, or when the attempt budget is zero.
    pub fn new(config: ClientConfig, executor: Arc<HttpExecutor>) -> Result<Self> {
        let base_url = config
            .base_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::config("Provider client requires a base URL"))?;

        let parsed = Url::parse(&base_url)
            .map_err(|e| Error::config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Base URL must use http or https: '{}'",
                base_url
            )));
        }

        let max_attempts = config.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }

        Ok(Self {
            base_url,
            auth: config.auth,
            default_headers: config.default_headers,
            timeout: config.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_attempts,
            executor,
        })
    }

    /// Base URL this client is bound to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Default attempt budget
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Build the request a call would execute
    pub fn request(&self, path: &str, options: CallOptions) -> ProviderRequest {
        let mut headers = self.default_headers.clone();
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        ProviderRequest {
            base_url: self.base_url.clone(),
            path: path.to_string(),
            method: options.method.unwrap_or(Method::GET),
            body: options.body,
            headers,
            auth: self.auth.clone(),
            timeout: options.timeout.unwrap_or(self.timeout),
            max_attempts: options.max_attempts.unwrap_or(self.max_attempts),
        }
    }

    /// Execute a call
    pub async fn call(&self, path: &str, options: CallOptions) -> Result<ProviderResponse> {
        let request = self.request(path, options);
        self.executor.execute(&request).await
    }

    /// GET a path and return the body as JSON
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        Ok(self.call(path, CallOptions::get()).await?.into_json())
    }

    /// Send a JSON body and return the response as JSON
    pub async fn send_json(&self, method: Method, path: &str, body: Value) -> Result<Value> {
        Ok(self
            .call(path, CallOptions::json(method, body))
            .await?
            .into_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::retry::BackoffPolicy;

    fn executor() -> Arc<HttpExecutor> {
        Arc::new(HttpExecutor::new(BackoffPolicy::default()).unwrap())
    }

    #[test]
    fn test_missing_base_url_fails_fast() {
        let err = ProviderClient::new(ClientConfig::default(), executor()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");

        let err = ProviderClient::new(ClientConfig::new("   "), executor()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_relative_base_url_fails_fast() {
        assert!(ProviderClient::new(ClientConfig::new("/api"), executor()).is_err());
        assert!(ProviderClient::new(ClientConfig::new("ftp://files.test"), executor()).is_err());
    }

    #[test]
    fn test_per_call_options_override_defaults() {
        let client = ProviderClient::new(
            ClientConfig::new("https://api.telna.test/v1")
                .with_api_key("key")
                .with_header("x-tenant", "default")
                .unwrap()
                .with_header("x-trace", "keep")
                .unwrap()
                .with_timeout(Duration::from_secs(5))
                .with_max_attempts(3),
            executor(),
        )
        .unwrap();

        let request = client.request(
            "/esims",
            CallOptions::post_json(serde_json::json!({"a": 1}))
                .with_header("X-Tenant", "override")
                .unwrap()
                .with_timeout(Duration::from_secs(1))
                .with_max_attempts(1),
        );

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers.get("x-tenant").unwrap(), "override");
        assert_eq!(request.headers.get("x-trace").unwrap(), "keep");
        assert_eq!(request.timeout, Duration::from_secs(1));
        assert_eq!(request.max_attempts, 1);
        assert_eq!(request.auth, AuthMode::Bearer("key".to_string()));
    }

    #[test]
    fn test_defaults_apply_without_overrides() {
        let client =
            ProviderClient::new(ClientConfig::new("https://api.telna.test"), executor()).unwrap();
        let request = client.request("/x", CallOptions::get());
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);
        assert_eq!(request.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_debug_hides_credentials() {
        let client = ProviderClient::new(
            ClientConfig::new("https://api.telna.test").with_api_key("secret_token_12345"),
            executor(),
        )
        .unwrap();
        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("ProviderClient"));
    }
}
