// # eSIM Gateway
//
// The single entry point billing and route code calls. For every operation:
//
// 1. Feature gate (`ESIM_DISABLED`), before anything else
// 2. Input validation (`ESIM_INVALID_REGION`, `ESIM_MISSING_*`), no I/O
// 3. Delegation to the adapter resolved at construction
// 4. Adapter failures re-wrapped with provider and operation name
//
// The adapter is resolved once from the closed `ProviderKind` enum; calls are
// never re-dispatched by string.

use crate::config::{EsimConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::http::HttpExecutor;
use crate::models::{
    ActivateRequest, Activation, EsimProfile, EsimUsage, LineRequest, LineStatus,
    ProvisionRequest, ProvisionResult, ReserveRequest, validate_profile_id,
};
use crate::registry::ProviderRegistry;
use crate::traits::EsimProvider;
use crate::traits::operations;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Feature-gated, validating front of the active eSIM adapter
pub struct EsimGateway {
    kind: ProviderKind,
    enabled: AtomicBool,
    provider: Arc<dyn EsimProvider>,
}

impl fmt::Debug for EsimGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EsimGateway")
            .field("kind", &self.kind)
            .field("enabled", &self.is_enabled())
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

impl EsimGateway {
    /// Create a gateway over an already-built adapter
    pub fn new(kind: ProviderKind, enabled: bool, provider: Arc<dyn EsimProvider>) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(enabled),
            provider,
        }
    }

    /// Resolve the configured provider from a registry
    ///
    /// Builds a fresh executor from `config.http`.
    ///
    /// # Returns
    ///
    /// - `Err(Error::UnsupportedProvider)`: the configured provider has no registered factory
    /// - `Err(Error::Config)`: the adapter rejected its configuration
    pub fn from_registry(registry: &ProviderRegistry, config: &EsimConfig) -> Result<Self> {
        let executor = Arc::new(HttpExecutor::new(config.http.backoff_policy())?);
        Self::from_registry_with_executor(registry, config, executor)
    }

    /// Resolve the configured provider from a registry over a given executor
    pub fn from_registry_with_executor(
        registry: &ProviderRegistry,
        config: &EsimConfig,
        executor: Arc<HttpExecutor>,
    ) -> Result<Self> {
        config.validate()?;
        let provider = registry.create_provider(config.provider, config, executor)?;
        debug!(provider = %config.provider, enabled = config.enabled, "eSIM gateway ready");
        Ok(Self::new(config.provider, config.enabled, Arc::from(provider)))
    }

    /// Active provider
    pub fn provider_kind(&self) -> ProviderKind {
        self.kind
    }

    /// Whether the feature flag is on
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the feature flag at runtime
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Fail with `ESIM_DISABLED` when the feature flag is off
    pub fn ensure_enabled(&self) -> Result<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(Error::Disabled)
        }
    }

    /// Reserve a new profile
    pub async fn reserve_esim_profile(&self, request: &ReserveRequest) -> Result<EsimProfile> {
        self.ensure_enabled()?;
        request.validate()?;
        let result = self.provider.reserve_esim_profile(request).await;
        self.wrap(operations::RESERVE, result)
    }

    /// Activate a reserved profile
    pub async fn activate_profile(&self, request: &ActivateRequest) -> Result<Activation> {
        self.ensure_enabled()?;
        request.validate()?;
        let result = self.provider.activate_profile(request).await;
        self.wrap(operations::ACTIVATE, result)
    }

    /// Suspend a line
    pub async fn suspend_line(&self, request: &LineRequest) -> Result<LineStatus> {
        self.ensure_enabled()?;
        request.validate()?;
        let result = self.provider.suspend_line(request).await;
        self.wrap(operations::SUSPEND, result)
    }

    /// Resume a suspended line
    pub async fn resume_line(&self, request: &LineRequest) -> Result<LineStatus> {
        self.ensure_enabled()?;
        request.validate()?;
        let result = self.provider.resume_line(request).await;
        self.wrap(operations::RESUME, result)
    }

    /// Provision a data pack
    pub async fn provision_esim_pack(&self, request: &ProvisionRequest) -> Result<ProvisionResult> {
        self.ensure_enabled()?;
        request.validate()?;
        let result = self.provider.provision_esim_pack(request).await;
        self.wrap(operations::PROVISION, result)
    }

    /// Fetch usage of a profile
    pub async fn fetch_esim_usage(&self, provider_profile_id: &str) -> Result<EsimUsage> {
        self.ensure_enabled()?;
        let id = validate_profile_id(provider_profile_id)?;
        let result = self.provider.fetch_esim_usage(id).await;
        self.wrap(operations::USAGE, result)
    }

    fn wrap<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            warn!(
                provider = self.provider.provider_name(),
                operation,
                code = %e.code(),
                status = ?e.status(),
                error = %e,
                "eSIM provider operation failed"
            );
            Error::dispatch(self.provider.provider_name(), operation, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReserveOnly;

    #[async_trait::async_trait]
    impl EsimProvider for ReserveOnly {
        async fn reserve_esim_profile(&self, _request: &ReserveRequest) -> Result<EsimProfile> {
            Ok(EsimProfile {
                iccid: Some("8944".to_string()),
                ..EsimProfile::default()
            })
        }

        fn provider_name(&self) -> &'static str {
            "telna"
        }
    }

    fn gateway(enabled: bool) -> EsimGateway {
        EsimGateway::new(ProviderKind::Telna, enabled, Arc::new(ReserveOnly))
    }

    #[tokio::test]
    async fn test_disabled_is_checked_before_validation() {
        let err = gateway(false)
            .reserve_esim_profile(&ReserveRequest::new(""))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ESIM_DISABLED");
    }

    #[tokio::test]
    async fn test_runtime_toggle() {
        let gateway = gateway(false);
        assert!(gateway.ensure_enabled().is_err());
        gateway.set_enabled(true);
        let profile = gateway
            .reserve_esim_profile(&ReserveRequest::new("EU"))
            .await
            .unwrap();
        assert_eq!(profile.iccid.as_deref(), Some("8944"));
    }

    #[tokio::test]
    async fn test_missing_operation_is_typed_error() {
        let err = gateway(true)
            .suspend_line(&LineRequest::by_iccid("8944"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ESIM_NOT_IMPLEMENTED");
        assert_eq!(err.provider_name(), Some("telna"));
        assert!(err.to_string().contains("suspend_line"));
    }
}
