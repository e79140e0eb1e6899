// # emnify eSIM Provider
//
// This crate provides the emnify adapter for the eSIM gateway.
//
// emnify authenticates with an application token pair sent as HTTP basic
// auth and nests some values (SIM details, data volume) one level deep, so
// this adapter carries its own field tables.
//
// ## API Reference
//
// - Reserve profile: POST `/api/v1/esim/profiles`
// - Activate / suspend / resume: PATCH `/api/v1/esim/profiles/:id` with a
//   `status` payload
// - Activate by activation code only: POST `/api/v1/esim/profiles/activation`
// - Provision package: POST `/api/v1/esim/profiles/:id/packages`
// - Usage: GET `/api/v1/esim/profiles/:id/usage`

use async_trait::async_trait;
use esim_core::config::{EmnifyConfig, EsimConfig, ProviderKind};
use esim_core::fields::{ActivationFields, FieldTable, ProfileFields, ProvisionFields, UsageFields};
use esim_core::http::{ClientConfig, HttpExecutor, ProviderClient};
use esim_core::models::{
    ActivateRequest, Activation, ActivationTarget, EsimProfile, EsimUsage, LineRequest, LineStatus,
    ProvisionRequest, ProvisionResult, ReserveRequest, validate_profile_id,
};
use esim_core::traits::{EsimProvider, EsimProviderFactory};
use esim_core::{Error, Result};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER_NAME: &str = "emnify";

const PROFILES_PATH: &str = "/api/v1/esim/profiles";
const ACTIVATION_PATH: &str = "/api/v1/esim/profiles/activation";

/// Profile status values accepted by the PATCH endpoint
const STATUS_ACTIVE: &str = "ACTIVE";
const STATUS_SUSPENDED: &str = "SUSPENDED";

const PROFILE_FIELDS: ProfileFields = ProfileFields {
    provider_profile_id: FieldTable::new("provider_profile_id", &["id", "profileId", "esimId"]),
    iccid: FieldTable::new("iccid", &["iccid", "sim.iccid"]),
    iccid_hint: FieldTable::new("iccid_hint", &["iccidHint", "sim.iccid", "iccid"]),
    smdp: FieldTable::new("smdp", &["smdpAddress", "smdp", "smDpPlus"]),
    activation_code: FieldTable::new("activation_code", &["matchingId", "activationCode"]),
    lpa_uri: FieldTable::new("lpa_uri", &["activationCodeLpa", "lpa", "lpaUri"]),
    qr_payload: FieldTable::new("qr_payload", &["qrCode", "activationCodeLpa", "lpa"]),
};

const ACTIVATION_FIELDS: ActivationFields = ActivationFields {
    ok: FieldTable::new("ok", &["ok", "success"]),
    activated_at: FieldTable::new("activated_at", &["activationDate", "status.changedAt"]),
    msisdn: FieldTable::new("msisdn", &["msisdn", "sim.msisdn"]),
};

const PROVISION_FIELDS: ProvisionFields = ProvisionFields {
    provider_purchase_id: FieldTable::new("provider_purchase_id", &["packageId", "id"]),
    provider_profile_id: FieldTable::new("provider_profile_id", &["profileId", "esimId"]),
    iccid: FieldTable::new("iccid", &["iccid", "sim.iccid"]),
    qr_code_svg: FieldTable::new("qr_code_svg", &["qrCodeSvg"]),
    expires_at: FieldTable::new("expires_at", &["expiryDate", "validUntil", "expiresAt"]),
    data_mb: FieldTable::new("data_mb", &["volume.totalMb", "dataMb", "totalMb"]),
};

const USAGE_FIELDS: UsageFields = UsageFields {
    used_mb: FieldTable::new("used_mb", &["volume.usedMb", "usedMb"]),
    total_mb: FieldTable::new("total_mb", &["volume.totalMb", "totalMb"]),
    remaining_mb: FieldTable::new("remaining_mb", &["volume.remainingMb", "remainingMb"]),
    expires_at: FieldTable::new("expires_at", &["expiryDate", "expiresAt"]),
};

/// emnify eSIM provider
pub struct EmnifyProvider {
    client: std::result::Result<ProviderClient, String>,
}

// Custom Debug implementation that hides the token secret
impl std::fmt::Debug for EmnifyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.client {
            Ok(client) => f
                .debug_struct("EmnifyProvider")
                .field("base_url", &client.base_url())
                .field("app_token_secret", &"<REDACTED>")
                .field("max_attempts", &client.max_attempts())
                .finish(),
            Err(reason) => f
                .debug_struct("EmnifyProvider")
                .field("not_configured", reason)
                .finish(),
        }
    }
}

impl EmnifyProvider {
    /// Create an emnify provider
    ///
    /// Missing credentials leave the provider unconfigured; an invalid base
    /// URL is a configuration error.
    pub fn new(
        config: Option<&EmnifyConfig>,
        timeout: Duration,
        executor: Arc<HttpExecutor>,
    ) -> Result<Self> {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let credentials = config.and_then(|c| {
            Some((
                present(&c.api_base)?,
                present(&c.app_token_id)?,
                present(&c.app_token_secret)?,
                c.max_attempts,
            ))
        });

        let Some((api_base, token_id, token_secret, max_attempts)) = credentials else {
            tracing::warn!(
                "emnify API base URL or application token missing, provider is not configured"
            );
            return Ok(Self {
                client: Err(
                    "emnify API base URL, application token id and secret are required"
                        .to_string(),
                ),
            });
        };

        let client = ProviderClient::new(
            ClientConfig::new(api_base)
                .with_basic_auth(token_id, token_secret)
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

    fn failure(operation: &str, error: Error) -> Error {
        Error::provider(
            PROVIDER_NAME,
            format!("EMNIFY_{}_FAILED", operation.to_uppercase()),
            format!("Emnify {} failed: {}", operation, error),
            error,
        )
    }

    async fn set_status(
        &self,
        id: &str,
        status: &str,
        operation: &str,
    ) -> Result<serde_json::Value> {
        let client = self.client()?;

        tracing::info!(profile = %id, status, "Updating emnify profile status");
        client
            .send_json(Method::PATCH, &profile_path(id, None), json!({ "status": status }))
            .await
            .map_err(|e| Self::failure(operation, e))
    }
}

#[async_trait]
impl EsimProvider for EmnifyProvider {
    async fn reserve_esim_profile(&self, request: &ReserveRequest) -> Result<EsimProfile> {
        request.validate()?;
        let client = self.client()?;

        tracing::info!(region = %request.region, "Reserving emnify eSIM profile");
        let payload = client
            .send_json(
                Method::POST,
                PROFILES_PATH,
                json!({
                    "region": request.region.trim(),
                    "userId": request.user_id,
                }),
            )
            .await
            .map_err(|e| Self::failure("reserve", e))?;

        Ok(PROFILE_FIELDS.normalize(&payload))
    }

    async fn activate_profile(&self, request: &ActivateRequest) -> Result<Activation> {
        let payload = match request.validate()? {
            ActivationTarget::Profile(id) => {
                self.set_status(id, STATUS_ACTIVE, "activate").await?
            }
            ActivationTarget::Code(code) => {
                let client = self.client()?;
                tracing::info!("Activating emnify profile by activation code");
                client
                    .send_json(
                        Method::POST,
                        ACTIVATION_PATH,
                        json!({ "activationCode": code, "status": STATUS_ACTIVE }),
                    )
                    .await
                    .map_err(|e| Self::failure("activate", e))?
            }
        };
        Ok(ACTIVATION_FIELDS.normalize(&payload))
    }

    async fn suspend_line(&self, request: &LineRequest) -> Result<LineStatus> {
        let id = request.validate()?;
        let payload = self.set_status(id, STATUS_SUSPENDED, "suspend").await?;
        Ok(LineStatus {
            ok: ACTIVATION_FIELDS.ok.boolean(&payload).unwrap_or(true),
            provider_meta: payload,
        })
    }

    async fn resume_line(&self, request: &LineRequest) -> Result<LineStatus> {
        let id = request.validate()?;
        let payload = self.set_status(id, STATUS_ACTIVE, "resume").await?;
        Ok(LineStatus {
            ok: ACTIVATION_FIELDS.ok.boolean(&payload).unwrap_or(true),
            provider_meta: payload,
        })
    }

    async fn provision_esim_pack(&self, request: &ProvisionRequest) -> Result<ProvisionResult> {
        request.validate()?;
        let client = self.client()?;

        tracing::info!(
            user_id = %request.user_id,
            profile = %request.provider_profile_id,
            addon_kind = %request.addon_kind,
            "Provisioning emnify package"
        );
        let payload = client
            .send_json(
                Method::POST,
                &profile_path(&request.provider_profile_id, Some("packages")),
                json!({
                    "userId": request.user_id,
                    "addonKind": request.addon_kind,
                    "planCode": request.plan_code,
                }),
            )
            .await
            .map_err(|e| Self::failure("provision", e))?;

        let mut result = PROVISION_FIELDS.normalize(&payload);
        if result.provider_profile_id.is_none() {
            result.provider_profile_id = Some(request.provider_profile_id.clone());
        }
        Ok(result)
    }

    async fn fetch_esim_usage(&self, provider_profile_id: &str) -> Result<EsimUsage> {
        let id = validate_profile_id(provider_profile_id)?;
        let client = self.client()?;

        let payload = client
            .get_json(&profile_path(id, Some("usage")))
            .await
            .map_err(|e| Self::failure("usage", e))?;

        Ok(USAGE_FIELDS.normalize(&payload))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

fn profile_path(id: &str, suffix: Option<&str>) -> String {
    let id = urlencoding::encode(id.trim());
    match suffix {
        Some(suffix) => format!("{}/{}/{}", PROFILES_PATH, id, suffix),
        None => format!("{}/{}", PROFILES_PATH, id),
    }
}

/// Factory for creating emnify providers
pub struct EmnifyFactory;

impl EsimProviderFactory for EmnifyFactory {
    fn create(
        &self,
        config: &EsimConfig,
        executor: Arc<HttpExecutor>,
    ) -> Result<Box<dyn EsimProvider>> {
        let provider =
            EmnifyProvider::new(config.emnify.as_ref(), config.http.timeout(), executor)?;
        Ok(Box::new(provider))
    }
}

/// Register the emnify provider with a registry
pub fn register(registry: &esim_core::ProviderRegistry) {
    registry.register_provider(ProviderKind::Emnify, Box::new(EmnifyFactory));
}
