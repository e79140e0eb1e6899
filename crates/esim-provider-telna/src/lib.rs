// # Telna eSIM Provider
//
// This crate provides the Telna adapter for the eSIM gateway.
//
// ## Behavior
//
// - Every operation is a single logical call through the shared
//   `HttpExecutor`; retries, backoff and timeouts are owned there
// - Vendor payloads are normalized through the common field tables
// - Failures are wrapped as `TELNA_<OP>_FAILED`, keeping the HTTP status and
//   body preview of the underlying error
// - Missing credentials are reported as `TELNA_NOT_CONFIGURED` when an
//   operation is attempted, without any network call
//
// ## Security Requirements
//
// - API key NEVER appears in logs
// - API key MUST be provided via configuration (environment in `esimd`)
//
// ## API Reference
//
// - Reserve profile: POST `/esims/reserve`
// - Activate profile: POST `/esims/:id/activate`, or POST `/esims/activate`
//   when only an activation code is known
// - Suspend / resume line: POST `/lines/:id/suspend`, POST `/lines/:id/resume`
// - Provision pack: POST `/packs`
// - Usage: GET `/esims/:id/usage`

use async_trait::async_trait;
use esim_core::config::{EsimConfig, ProviderKind, TelnaConfig};
use esim_core::fields::{ActivationFields, ProfileFields, ProvisionFields, UsageFields};
use esim_core::http::{ClientConfig, HttpExecutor, ProviderClient};
use esim_core::models::{
    ActivateRequest, Activation, ActivationTarget, EsimProfile, EsimUsage, LineRequest, LineStatus,
    ProvisionRequest, ProvisionResult, ReserveRequest, validate_profile_id,
};
use esim_core::traits::{EsimProvider, EsimProviderFactory};
use esim_core::{Error, Result};
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// Name reported in errors and logs
const PROVIDER_NAME: &str = "telna";

const ACTIVATE_BY_CODE_PATH: &str = "/esims/activate";

/// Telna eSIM provider
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API key.
pub struct TelnaProvider {
    /// Client bound to the Telna API, or the reason it could not be built
    client: std::result::Result<ProviderClient, String>,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for TelnaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.client {
            Ok(client) => f
                .debug_struct("TelnaProvider")
                .field("base_url", &client.base_url())
                .field("api_key", &"<REDACTED>")
                .field("max_attempts", &client.max_attempts())
                .finish(),
            Err(reason) => f
                .debug_struct("TelnaProvider")
                .field("not_configured", reason)
                .finish(),
        }
    }
}

impl TelnaProvider {
    /// Create a Telna provider
    ///
    /// # Parameters
    ///
    /// - `config`: Telna credentials; `None` or missing fields leave the
    ///   provider unconfigured
    /// - `timeout`: Per-attempt timeout
    /// - `executor`: Shared HTTP executor
    ///
    /// # Returns
    ///
    /// - `Ok(TelnaProvider)`: configured or unconfigured provider
    /// - `Err(Error)`: the base URL is present but not a valid http(s) URL
    pub fn new(
        config: Option<&TelnaConfig>,
        timeout: Duration,
        executor: Arc<HttpExecutor>,
    ) -> Result<Self> {
        let credentials = config.and_then(|c| {
            let api_base = c.api_base.as_deref().filter(|v| !v.trim().is_empty())?;
            let api_key = c.api_key.as_deref().filter(|v| !v.trim().is_empty())?;
            Some((api_base, api_key, c.max_attempts))
        });

        let Some((api_base, api_key, max_attempts)) = credentials else {
            tracing::warn!("Telna API base URL or key missing, provider is not configured");
            return Ok(Self {
                client: Err("Telna API base URL and API key are required".to_string()),
            });
        };

        let client = ProviderClient::new(
            ClientConfig::new(api_base)
                .with_api_key(api_key)
                .with_timeout(timeout)
                .with_max_attempts(max_attempts),
            executor,
        )?;

        Ok(Self { client: Ok(client) })
    }

    fn client(&self) -> Result<&ProviderClient> {
        self.client
            .as_ref()
            .map_err(|reason| Error::not_configured(PROVIDER_NAME, reason.clone()))
    }

    /// Wrap a call failure as `TELNA_<OP>_FAILED`
    fn failure(operation: &str, error: Error) -> Error {
        Error::provider(
            PROVIDER_NAME,
            format!("TELNA_{}_FAILED", operation.to_uppercase()),
            format!("Telna {} failed: {}", operation, error),
            error,
        )
    }

    async fn line_action(&self, request: &LineRequest, action: &str) -> Result<LineStatus> {
        let id = request.validate()?;
        let client = self.client()?;

        tracing::info!(line = %id, action, "Changing Telna line state");
        let payload = client
            .send_json(Method::POST, &line_path(id, action), json!({}))
            .await
            .map_err(|e| Self::failure(action, e))?;

        Ok(LineStatus {
            ok: ActivationFields::COMMON.ok.boolean(&payload).unwrap_or(true),
            provider_meta: payload,
        })
    }
}

#[async_trait]
impl EsimProvider for TelnaProvider {
    async fn reserve_esim_profile(&self, request: &ReserveRequest) -> Result<EsimProfile> {
        request.validate()?;
        let client = self.client()?;

        tracing::info!(region = %request.region, "Reserving Telna eSIM profile");
        let payload = client
            .send_json(
                Method::POST,
                "/esims/reserve",
                json!({
                    "region": request.region.trim(),
                    "userId": request.user_id,
                }),
            )
            .await
            .map_err(|e| Self::failure("reserve", e))?;

        let profile = ProfileFields::COMMON.normalize(&payload);
        tracing::debug!(profile_id = ?profile.provider_profile_id, "Telna profile reserved");
        Ok(profile)
    }

    async fn activate_profile(&self, request: &ActivateRequest) -> Result<Activation> {
        let target = request.validate()?;
        let client = self.client()?;

        let mut body = json!({});
        if let Some(code) = request.code() {
            body["activationCode"] = Value::String(code.to_string());
        }

        let path = match target {
            ActivationTarget::Profile(id) => {
                tracing::info!(profile = %id, "Activating Telna eSIM profile");
                esim_path(id, "activate")
            }
            ActivationTarget::Code(_) => {
                tracing::info!("Activating Telna eSIM profile by activation code");
                ACTIVATE_BY_CODE_PATH.to_string()
            }
        };
        let payload = client
            .send_json(Method::POST, &path, body)
            .await
            .map_err(|e| Self::failure("activate", e))?;

        Ok(ActivationFields::COMMON.normalize(&payload))
    }

    async fn suspend_line(&self, request: &LineRequest) -> Result<LineStatus> {
        self.line_action(request, "suspend").await
    }

    async fn resume_line(&self, request: &LineRequest) -> Result<LineStatus> {
        self.line_action(request, "resume").await
    }

    async fn provision_esim_pack(&self, request: &ProvisionRequest) -> Result<ProvisionResult> {
        request.validate()?;
        let client = self.client()?;

        tracing::info!(
            user_id = %request.user_id,
            profile = %request.provider_profile_id,
            addon_kind = %request.addon_kind,
            "Provisioning Telna pack"
        );
        let payload = client
            .send_json(
                Method::POST,
                "/packs",
                json!({
                    "userId": request.user_id,
                    "profileId": request.provider_profile_id,
                    "addonKind": request.addon_kind,
                    "planCode": request.plan_code,
                }),
            )
            .await
            .map_err(|e| Self::failure("provision", e))?;

        let mut result = ProvisionFields::COMMON.normalize(&payload);
        if result.provider_profile_id.is_none() {
            result.provider_profile_id = Some(request.provider_profile_id.clone());
        }
        Ok(result)
    }

    async fn fetch_esim_usage(&self, provider_profile_id: &str) -> Result<EsimUsage> {
        let id = validate_profile_id(provider_profile_id)?;
        let client = self.client()?;

        let payload = client
            .get_json(&esim_path(id, "usage"))
            .await
            .map_err(|e| Self::failure("usage", e))?;

        Ok(UsageFields::COMMON.normalize(&payload))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

fn esim_path(id: &str, action: &str) -> String {
    format!("/esims/{}/{}", urlencoding::encode(id), action)
}

fn line_path(id: &str, action: &str) -> String {
    format!("/lines/{}/{}", urlencoding::encode(id), action)
}

/// Factory for creating Telna providers
pub struct TelnaFactory;

impl EsimProviderFactory for TelnaFactory {
    fn create(
        &self,
        config: &EsimConfig,
        executor: Arc<HttpExecutor>,
    ) -> Result<Box<dyn EsimProvider>> {
        let provider = TelnaProvider::new(config.telna.as_ref(), config.http.timeout(), executor)?;
        Ok(Box::new(provider))
    }
}

/// Register the Telna provider with a registry
///
/// # Example
///
/// ```rust,no_run
/// use esim_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// esim_provider_telna::register(&registry);
/// ```
pub fn register(registry: &esim_core::ProviderRegistry) {
    registry.register_provider(ProviderKind::Telna, Box::new(TelnaFactory));
}
