// # eSIM Provider Trait
//
// Defines the six normalized operations every connectivity vendor adapter
// implements.
//
// ## Implementations
//
// - Telna: `esim-provider-telna` crate
// - emnify: `esim-provider-emnify` crate
//
// ## Usage
//
// ```rust,ignore
// use esim_core::{EsimProvider, models::ReserveRequest};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* EsimProvider implementation */;
//
//     let profile = provider
//         .reserve_esim_profile(&ReserveRequest::new("EU").for_user("42"))
//         .await?;
//     println!("{:?}", profile.lpa_uri);
//
//     Ok(())
// }
// ```

use crate::config::EsimConfig;
use crate::http::HttpExecutor;
use crate::models::{
    ActivateRequest, Activation, EsimProfile, EsimUsage, LineRequest, LineStatus,
    ProvisionRequest, ProvisionResult, ReserveRequest,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Operation names used in logs and errors
pub mod operations {
    pub const RESERVE: &str = "reserve_esim_profile";
    pub const ACTIVATE: &str = "activate_profile";
    pub const SUSPEND: &str = "suspend_line";
    pub const RESUME: &str = "resume_line";
    pub const PROVISION: &str = "provision_esim_pack";
    pub const USAGE: &str = "fetch_esim_usage";
}

/// Trait for eSIM vendor adapters
///
/// An adapter translates between the shared [`crate::http::ProviderClient`]
/// and one vendor's wire contract. Results are normalized through the
/// vendor's [`crate::fields`] tables before they leave the adapter.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// - Validate required inputs before any network call
/// - Report `<VENDOR>_NOT_CONFIGURED` without I/O when credentials are absent
/// - Wrap client failures as [`crate::Error::Provider`] with a
///   `<VENDOR>_<OP>_FAILED` code, keeping status and body preview
/// - Leave retry and backoff to the executor
///
/// # Missing operations
///
/// Every operation has a default body returning
/// [`crate::Error::NotImplemented`], so an adapter that does not support an
/// operation yields a typed error instead of a panic.
#[async_trait]
pub trait EsimProvider: Send + Sync {
    /// Reserve a new eSIM profile in a region
    ///
    /// # Returns
    ///
    /// - `Ok(EsimProfile)`: normalized profile; `provider_meta` holds the raw response
    /// - `Err(Error)`: `ESIM_INVALID_REGION` for a blank region, or a vendor failure
    async fn reserve_esim_profile(
        &self,
        request: &ReserveRequest,
    ) -> Result<EsimProfile, crate::Error> {
        let _ = request;
        Err(crate::Error::not_implemented(
            self.provider_name(),
            operations::RESERVE,
        ))
    }

    /// Activate a reserved profile
    ///
    /// Addressed by [`ActivateRequest::target`]: a profile id or ICCID goes in
    /// the resource path, a lone activation code only in the request body.
    /// `activated_at` is only set when the vendor reports it.
    async fn activate_profile(
        &self,
        request: &ActivateRequest,
    ) -> Result<Activation, crate::Error> {
        let _ = request;
        Err(crate::Error::not_implemented(
            self.provider_name(),
            operations::ACTIVATE,
        ))
    }

    /// Suspend a line
    async fn suspend_line(&self, request: &LineRequest) -> Result<LineStatus, crate::Error> {
        let _ = request;
        Err(crate::Error::not_implemented(
            self.provider_name(),
            operations::SUSPEND,
        ))
    }

    /// Resume a suspended line
    async fn resume_line(&self, request: &LineRequest) -> Result<LineStatus, crate::Error> {
        let _ = request;
        Err(crate::Error::not_implemented(
            self.provider_name(),
            operations::RESUME,
        ))
    }

    /// Provision a data pack onto an existing profile
    ///
    /// # Parameters
    ///
    /// - `request`: user, profile and add-on kind are required; plan code is optional
    async fn provision_esim_pack(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionResult, crate::Error> {
        let _ = request;
        Err(crate::Error::not_implemented(
            self.provider_name(),
            operations::PROVISION,
        ))
    }

    /// Fetch current usage of a profile
    ///
    /// # Returns
    ///
    /// Usage in megabytes; `remaining_mb` is the vendor's value when supplied,
    /// otherwise `max(0, total - used)`.
    async fn fetch_esim_usage(&self, provider_profile_id: &str) -> Result<EsimUsage, crate::Error> {
        let _ = provider_profile_id;
        Err(crate::Error::not_implemented(
            self.provider_name(),
            operations::USAGE,
        ))
    }

    /// Get the provider name (for logging and error codes)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing adapters from configuration
pub trait EsimProviderFactory: Send + Sync {
    /// Create an adapter
    ///
    /// # Parameters
    ///
    /// - `config`: gateway configuration; the factory reads its own vendor section
    /// - `executor`: shared HTTP executor
    ///
    /// # Returns
    ///
    /// A boxed adapter. Missing credentials are not an error here; the adapter
    /// reports them per operation. An invalid base URL is.
    fn create(
        &self,
        config: &EsimConfig,
        executor: Arc<HttpExecutor>,
    ) -> Result<Box<dyn EsimProvider>, crate::Error>;
}
