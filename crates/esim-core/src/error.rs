//! Error types for the eSIM gateway
//!
//! Every error exposes a stable machine-readable code via [`Error::code`],
//! plus the HTTP status, body preview and provider name when known. Route
//! handlers map these to user-facing responses; nothing here does.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of characters kept from a vendor response body
pub const BODY_PREVIEW_LIMIT: usize = 1024;

/// Stable error codes shared by the gateway and its adapters
pub mod codes {
    pub const ESIM_DISABLED: &str = "ESIM_DISABLED";
    pub const ESIM_UNSUPPORTED_PROVIDER: &str = "ESIM_UNSUPPORTED_PROVIDER";
    pub const ESIM_NOT_IMPLEMENTED: &str = "ESIM_NOT_IMPLEMENTED";
    pub const ESIM_INVALID_REGION: &str = "ESIM_INVALID_REGION";
    pub const ESIM_MISSING_IDENTIFIER: &str = "ESIM_MISSING_IDENTIFIER";
    pub const ESIM_MISSING_USER: &str = "ESIM_MISSING_USER";
    pub const ESIM_MISSING_PROFILE: &str = "ESIM_MISSING_PROFILE";
    pub const ESIM_MISSING_ADDON: &str = "ESIM_MISSING_ADDON";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const STORE_ERROR: &str = "STORE_ERROR";
    pub const INVALID_JSON: &str = "INVALID_JSON";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Broad class of an error, used to decide retry and HTTP mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The eSIM feature flag is off
    Disabled,
    /// Missing or invalid configuration (never retried)
    Configuration,
    /// Caller input mistakes (never retried)
    Validation,
    /// Timeouts, resets, DNS failures (transient)
    Transport,
    /// Non-2xx response from a vendor
    Http,
    /// Operation missing from the active adapter
    NotImplemented,
    /// Persistence failures in the fulfillment store
    Store,
    /// Anything else
    Internal,
}

/// Core error type for the eSIM gateway
#[derive(Error, Debug)]
pub enum Error {
    /// eSIM features are switched off
    #[error("eSIM features are disabled")]
    Disabled,

    /// Configured provider key has no adapter
    #[error("Unsupported eSIM provider: {0}")]
    UnsupportedProvider(String),

    /// Adapter credentials or base URL are absent
    #[error("{provider} is not configured: {message}")]
    NotConfigured {
        /// Provider name
        provider: String,
        /// What is missing
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input, with a per-field code
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Stable code, e.g. `ESIM_INVALID_REGION`
        code: &'static str,
        /// Error message
        message: String,
    },

    /// Non-2xx response
    #[error("HTTP {status} {status_text} from {url}")]
    Http {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        status_text: String,
        /// Truncated response body
        body: Option<String>,
    },

    /// Attempt timed out or was cancelled
    #[error("Request to {url} {}", describe_timeout(.attempts, .cancelled))]
    Timeout {
        /// Request URL
        url: String,
        /// Attempts performed
        attempts: u32,
        /// Whether an external cancellation aborted the call
        cancelled: bool,
    },

    /// Connection, reset or DNS failure
    #[error("Network error calling {url} after {attempts} attempt(s): {message}")]
    Network {
        /// Request URL
        url: String,
        /// Attempts performed
        attempts: u32,
        /// Transport error message
        message: String,
    },

    /// Vendor-prefixed failure raised by an adapter
    #[error("{message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Stable code, e.g. `TELNA_RESERVE_FAILED`
        code: String,
        /// Vendor-prefixed message
        message: String,
        /// Raw vendor payload for audit logging
        provider_meta: Option<Value>,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// The active adapter does not implement the operation
    #[error("{operation} is not implemented for provider {provider}")]
    NotImplemented {
        /// Provider name
        provider: String,
        /// Operation name
        operation: &'static str,
    },

    /// Adapter failure annotated by the gateway
    #[error("{provider} {operation} failed: {source}")]
    Dispatch {
        /// Provider name
        provider: String,
        /// Operation name
        operation: &'static str,
        /// Adapter error
        #[source]
        source: Box<Error>,
    },

    /// Fulfillment store errors
    #[error("Store error: {0}")]
    Store(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn describe_timeout(attempts: &u32, cancelled: &bool) -> String {
    if *cancelled {
        format!("was cancelled during attempt {}", attempts)
    } else {
        format!("timed out after {} attempt(s)", attempts)
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error with a stable code
    pub fn invalid_input(code: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            code,
            message: msg.into(),
        }
    }

    /// Create a "not configured" error for a provider
    pub fn not_configured(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::NotConfigured {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a "not implemented for provider" error
    pub fn not_implemented(provider: impl Into<String>, operation: &'static str) -> Self {
        Self::NotImplemented {
            provider: provider.into(),
            operation,
        }
    }

    /// Create a timeout error
    pub fn timeout(url: impl Into<String>, attempts: u32, cancelled: bool) -> Self {
        Self::Timeout {
            url: url.into(),
            attempts,
            cancelled,
        }
    }

    /// Wrap an adapter-level failure with a vendor prefix and code
    ///
    /// The vendor body preview, when it is JSON, is kept as `provider_meta`.
    pub fn provider(
        provider: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        source: Error,
    ) -> Self {
        let provider_meta = source
            .provider_body()
            .and_then(|body| serde_json::from_str::<Value>(body).ok());
        Self::Provider {
            provider: provider.into(),
            code: code.into(),
            message: message.into(),
            provider_meta,
            source: Box::new(source),
        }
    }

    /// Annotate an adapter error with the provider and operation
    pub fn dispatch(provider: impl Into<String>, operation: &'static str, source: Error) -> Self {
        Self::Dispatch {
            provider: provider.into(),
            operation,
            source: Box::new(source),
        }
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Stable machine-readable code
    ///
    /// `Dispatch` reports the code of the error it wraps.
    pub fn code(&self) -> String {
        match self {
            Self::Disabled => codes::ESIM_DISABLED.to_string(),
            Self::UnsupportedProvider(_) => codes::ESIM_UNSUPPORTED_PROVIDER.to_string(),
            Self::NotConfigured { provider, .. } => {
                format!("{}_NOT_CONFIGURED", provider.to_uppercase())
            }
            Self::Config(_) => codes::CONFIG_ERROR.to_string(),
            Self::InvalidInput { code, .. } => (*code).to_string(),
            Self::Http { .. } => codes::HTTP_ERROR.to_string(),
            Self::Timeout { .. } => codes::TIMEOUT.to_string(),
            Self::Network { .. } => codes::NETWORK_ERROR.to_string(),
            Self::Provider { code, .. } => code.clone(),
            Self::NotImplemented { .. } => codes::ESIM_NOT_IMPLEMENTED.to_string(),
            Self::Dispatch { source, .. } => source.code(),
            Self::Store(_) => codes::STORE_ERROR.to_string(),
            Self::Json(_) => codes::INVALID_JSON.to_string(),
            Self::Other(_) => codes::INTERNAL_ERROR.to_string(),
        }
    }

    /// Broad error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Disabled => ErrorKind::Disabled,
            Self::UnsupportedProvider(_) | Self::NotConfigured { .. } | Self::Config(_) => {
                ErrorKind::Configuration
            }
            Self::InvalidInput { .. } => ErrorKind::Validation,
            Self::Http { .. } => ErrorKind::Http,
            Self::Timeout { .. } | Self::Network { .. } => ErrorKind::Transport,
            Self::Provider { source, .. } | Self::Dispatch { source, .. } => source.kind(),
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::Store(_) => ErrorKind::Store,
            Self::Json(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status of the underlying vendor response, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Provider { source, .. } | Self::Dispatch { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Reason phrase of the underlying vendor response, if any
    pub fn status_text(&self) -> Option<&str> {
        match self {
            Self::Http { status_text, .. } => Some(status_text),
            Self::Provider { source, .. } | Self::Dispatch { source, .. } => source.status_text(),
            _ => None,
        }
    }

    /// Truncated vendor response body, if any
    pub fn provider_body(&self) -> Option<&str> {
        match self {
            Self::Http { body, .. } => body.as_deref(),
            Self::Provider { source, .. } | Self::Dispatch { source, .. } => source.provider_body(),
            _ => None,
        }
    }

    /// Provider the error is attributed to, if any
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            Self::NotConfigured { provider, .. }
            | Self::Provider { provider, .. }
            | Self::NotImplemented { provider, .. }
            | Self::Dispatch { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Raw vendor payload kept for audit logging
    pub fn provider_meta(&self) -> Option<&Value> {
        match self {
            Self::Provider { provider_meta, .. } => provider_meta.as_ref(),
            Self::Dispatch { source, .. } => source.provider_meta(),
            _ => None,
        }
    }

    /// Whether this failure is transient
    ///
    /// Transport failures and 5xx responses are transient; 4xx, validation
    /// and configuration errors are permanent. Cancellation is never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { cancelled, .. } => !cancelled,
            Self::Network { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Provider { source, .. } | Self::Dispatch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Whether a timeout or cancellation is at the root of this error
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Provider { source, .. } | Self::Dispatch { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Truncate a response body to [`BODY_PREVIEW_LIMIT`] characters
pub fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_LIMIT).collect()
}
