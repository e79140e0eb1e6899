//! Plugin-based provider registry
//!
//! The registry binds each [`ProviderKind`] to the factory of its adapter.
//! Vendor crates register themselves at startup; the gateway resolves the
//! configured provider once, at construction.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use esim_core::{EsimConfig, EsimGateway, ProviderRegistry};
//!
//! let registry = ProviderRegistry::new();
//! esim_provider_telna::register(&registry);
//! esim_provider_emnify::register(&registry);
//!
//! let gateway = EsimGateway::from_registry(&registry, &EsimConfig::from_env()?)?;
//! ```
//!
//! ## Registration
//!
//! ```rust,ignore
//! // In esim-provider-telna
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider(ProviderKind::Telna, Box::new(TelnaFactory));
//! }
//! ```

pub mod gateway;

pub use gateway::EsimGateway;

use crate::config::{EsimConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::http::HttpExecutor;
use crate::traits::{EsimProvider, EsimProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Provider registry keyed by the closed set of supported vendors
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered adapter factories
    providers: RwLock<HashMap<ProviderKind, Box<dyn EsimProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter factory, replacing any earlier one for the same kind
    ///
    /// # Parameters
    ///
    /// - `kind`: Provider the factory builds adapters for
    /// - `factory`: Factory object for creating adapter instances
    pub fn register_provider(&self, kind: ProviderKind, factory: Box<dyn EsimProviderFactory>) {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        providers.insert(kind, factory);
    }

    /// Create the adapter for a provider
    ///
    /// # Parameters
    ///
    /// - `kind`: Provider to build
    /// - `config`: Gateway configuration passed to the factory
    /// - `executor`: Shared HTTP executor
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn EsimProvider>)`: Created adapter
    /// - `Err(Error::UnsupportedProvider)`: No factory registered for `kind`
    /// - `Err(Error)`: The factory rejected the configuration
    pub fn create_provider(
        &self,
        kind: ProviderKind,
        config: &EsimConfig,
        executor: Arc<HttpExecutor>,
    ) -> Result<Box<dyn EsimProvider>> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(&kind)
            .ok_or_else(|| Error::UnsupportedProvider(kind.to_string()))?;

        factory.create(config, executor)
    }

    /// List all registered providers
    pub fn list_providers(&self) -> Vec<ProviderKind> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut kinds: Vec<ProviderKind> = providers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }

    /// Check if a provider is registered
    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(&kind)
    }
}
