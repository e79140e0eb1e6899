// # esim-core
//
// Core library for the eSIM provider gateway.
//
// ## Architecture Overview
//
// This library provides everything between billing code and the eSIM
// connectivity vendors:
// - **HttpExecutor**: One logical outbound call with timeout, retry and backoff
// - **ProviderClient**: An executor bound to one vendor's base URL, auth and defaults
// - **EsimProvider**: Trait every vendor adapter implements (six normalized operations)
// - **ProviderRegistry**: Factory registry keyed by the closed `ProviderKind` enum
// - **EsimGateway**: The single entry point; feature gate, validation, dispatch
// - **Fulfiller / FulfillmentEngine**: Billing webhook → provisioning, exactly once per line item
//
// ## Design Principles
//
// 1. **Explicit configuration**: `EsimConfig` is passed into constructors, never read globally
// 2. **Plugin-Based**: Vendor crates register factories; no string dispatch per call
// 3. **Normalized values**: Vendor payloads are mapped through ordered field tables on receipt
// 4. **Structured errors**: Every error carries a stable code, HTTP status and provider name
// 5. **Billing first**: Vendor failures after a billing commit become reconciliation records

pub mod config;
pub mod error;
pub mod fields;
pub mod fulfillment;
pub mod http;
pub mod models;
pub mod registry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{EsimConfig, FulfillmentConfig, HttpSettings, ProviderKind};
pub use error::{Error, ErrorKind, Result};
pub use fulfillment::{Fulfiller, FulfillmentEngine};
pub use http::{HttpExecutor, ProviderClient};
pub use registry::{EsimGateway, ProviderRegistry};
pub use store::MemoryFulfillmentStore;
pub use traits::{EsimProvider, EsimProviderFactory, FulfillmentStore};
