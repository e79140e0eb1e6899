//! Normalized eSIM request and result values
//!
//! Every adapter returns these shapes regardless of the vendor's wire format.
//! They are transient per-call values; persisting an outcome is the store's job.

use crate::error::{Error, Result, codes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input of `reserve_esim_profile`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    /// Application user the profile is reserved for
    #[serde(default)]
    pub user_id: Option<String>,
    /// Coverage region (required, non-empty)
    #[serde(default)]
    pub region: String,
}

impl ReserveRequest {
    /// Create a reserve request for a region
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            user_id: None,
            region: region.into(),
        }
    }

    /// Attach the requesting user
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Reject a blank region
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::invalid_input(
                codes::ESIM_INVALID_REGION,
                "region is required",
            ));
        }
        Ok(())
    }
}

/// Normalized reservation result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsimProfile {
    pub provider_profile_id: Option<String>,
    pub iccid: Option<String>,
    pub iccid_hint: Option<String>,
    /// SM-DP+ server address
    pub smdp: Option<String>,
    pub activation_code: Option<String>,
    /// `LPA:1$<smdp>$<code>` string
    pub lpa_uri: Option<String>,
    pub qr_payload: Option<String>,
    /// Raw vendor response
    pub provider_meta: Value,
}

/// Input of `activate_profile`; at least one identifier is required
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    #[serde(default)]
    pub provider_profile_id: Option<String>,
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(default)]
    pub activation_code: Option<String>,
}

impl ActivateRequest {
    /// Activate by vendor profile id
    pub fn by_profile(id: impl Into<String>) -> Self {
        Self {
            provider_profile_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Activate by ICCID
    pub fn by_iccid(iccid: impl Into<String>) -> Self {
        Self {
            iccid: Some(iccid.into()),
            ..Self::default()
        }
    }

    /// Activation code, if set and non-blank
    pub fn code(&self) -> Option<&str> {
        first_present(&[&self.activation_code])
    }

    /// What the vendor call is addressed to
    ///
    /// A profile id or ICCID addresses the profile resource. The activation
    /// code is only a target on its own and never appears in a path.
    pub fn target(&self) -> Option<ActivationTarget<'_>> {
        first_present(&[&self.provider_profile_id, &self.iccid])
            .map(ActivationTarget::Profile)
            .or_else(|| self.code().map(ActivationTarget::Code))
    }

    /// Require at least one identifier
    pub fn validate(&self) -> Result<ActivationTarget<'_>> {
        self.target().ok_or_else(|| {
            Error::invalid_input(
                codes::ESIM_MISSING_IDENTIFIER,
                "providerProfileId, iccid or activationCode is required",
            )
        })
    }
}

/// Resource an activation is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationTarget<'a> {
    /// Profile id or ICCID
    Profile(&'a str),
    /// Activation code only
    Code(&'a str),
}

/// Result of `activate_profile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub ok: bool,
    /// Vendor activation timestamp; `None` when the vendor omits it
    pub activated_at: Option<DateTime<Utc>>,
    pub msisdn: Option<String>,
    pub provider_meta: Value,
}

/// Input of `suspend_line` / `resume_line`; at least one identifier is required
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    #[serde(default)]
    pub provider_profile_id: Option<String>,
    #[serde(default)]
    pub iccid: Option<String>,
}

impl LineRequest {
    /// Address a line by vendor profile id
    pub fn by_profile(id: impl Into<String>) -> Self {
        Self {
            provider_profile_id: Some(id.into()),
            iccid: None,
        }
    }

    /// Address a line by ICCID
    pub fn by_iccid(iccid: impl Into<String>) -> Self {
        Self {
            provider_profile_id: None,
            iccid: Some(iccid.into()),
        }
    }

    /// Identifier used in the vendor path, profile id first
    pub fn identifier(&self) -> Option<&str> {
        first_present(&[&self.provider_profile_id, &self.iccid])
    }

    /// Require at least one identifier
    pub fn validate(&self) -> Result<&str> {
        self.identifier().ok_or_else(|| {
            Error::invalid_input(
                codes::ESIM_MISSING_IDENTIFIER,
                "providerProfileId or iccid is required",
            )
        })
    }
}

/// Result of `suspend_line` / `resume_line`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStatus {
    pub ok: bool,
    pub provider_meta: Value,
}

/// Input of `provision_esim_pack`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub provider_profile_id: String,
    /// Vendor add-on kind (e.g. `data_5gb`)
    #[serde(default)]
    pub addon_kind: String,
    #[serde(default)]
    pub plan_code: Option<String>,
}

impl ProvisionRequest {
    /// Require user, profile and add-on kind
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid_input(codes::ESIM_MISSING_USER, "userId is required"));
        }
        if self.provider_profile_id.trim().is_empty() {
            return Err(Error::invalid_input(
                codes::ESIM_MISSING_PROFILE,
                "providerProfileId is required",
            ));
        }
        if self.addon_kind.trim().is_empty() {
            return Err(Error::invalid_input(codes::ESIM_MISSING_ADDON, "addonKind is required"));
        }
        Ok(())
    }
}

/// Normalized result of `provision_esim_pack`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResult {
    pub provider_purchase_id: Option<String>,
    pub provider_profile_id: Option<String>,
    pub iccid: Option<String>,
    pub qr_code_svg: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub data_mb: Option<u64>,
    pub provider_meta: Value,
}

/// Normalized usage of one profile, in megabytes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsimUsage {
    pub used_mb: f64,
    pub total_mb: f64,
    /// Vendor value when supplied, otherwise `max(0, total_mb - used_mb)`
    pub remaining_mb: f64,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider_meta: Value,
}

impl EsimUsage {
    /// Build a usage value, computing `remaining_mb` only when the vendor omitted it
    pub fn new(used_mb: f64, total_mb: f64, vendor_remaining_mb: Option<f64>) -> Self {
        let remaining_mb = vendor_remaining_mb.unwrap_or_else(|| (total_mb - used_mb).max(0.0));
        Self {
            used_mb,
            total_mb,
            remaining_mb,
            expires_at: None,
            provider_meta: Value::Null,
        }
    }
}

/// Require a non-blank profile id for usage lookups
pub fn validate_profile_id(provider_profile_id: &str) -> Result<&str> {
    let id = provider_profile_id.trim();
    if id.is_empty() {
        return Err(Error::invalid_input(
            codes::ESIM_MISSING_IDENTIFIER,
            "providerProfileId is required",
        ));
    }
    Ok(id)
}

fn first_present<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
}
