//! Outbound HTTP layer
//!
//! - [`HttpExecutor`]: one logical call with per-attempt timeout, retry and backoff
//! - [`ProviderClient`]: an executor bound to one vendor's base URL, auth and defaults
//! - [`Transport`]: the single network seam; [`ReqwestTransport`] in production
//!
//! ```text
//! ProviderClient::call(path, CallOptions)
//!         │  merge defaults
//!         ▼
//! HttpExecutor::execute(ProviderRequest)
//!         │  attempt 1 ── 5xx / transport ──▶ sleep(base·2⁰ + jitter)
//!         │  attempt 2 ── 5xx / transport ──▶ sleep(base·2¹ + jitter)
//!         │  ...                  4xx ──▶ fail immediately
//!         ▼
//! Transport::send (one network exchange)
//! ```

pub mod client;
pub mod executor;
pub mod request;
pub mod retry;
pub mod transport;

pub use client::{CallOptions, ClientConfig, ProviderClient};
pub use executor::HttpExecutor;
pub use request::{AuthMode, ProviderRequest, ProviderResponse, RequestBody};
pub use retry::BackoffPolicy;
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
