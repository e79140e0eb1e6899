// # Field Normalization Tables
//
// Vendors name the same attribute differently (`smdp` vs `smDpPlus`,
// `activationCode` vs `matchingId`, `dataMb` vs `megabytes`). Each normalized
// attribute owns an ordered list of candidate names; lookup returns the first
// candidate holding a usable value. Adding a vendor means adding a table, not
// another fallback chain.
//
// Candidates may be dotted paths (`data.iccid`) to reach into envelopes.
//
// ## Usage
//
// ```rust,ignore
// const ICCID: FieldTable = FieldTable::new("iccid", &["iccid", "iccidHint"]);
//
// let iccid = ICCID.string(&response);
// ```

use crate::models::{Activation, EsimProfile, EsimUsage, ProvisionResult};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Unix timestamps above this value are taken as milliseconds
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Ordered candidate names for one normalized attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTable {
    /// Normalized attribute name (for logs)
    pub attribute: &'static str,
    /// Vendor field names, highest priority first
    pub candidates: &'static [&'static str],
}

impl FieldTable {
    /// Create a table
    pub const fn new(attribute: &'static str, candidates: &'static [&'static str]) -> Self {
        Self {
            attribute,
            candidates,
        }
    }

    /// Value as a string; numbers are rendered
    pub fn string(&self, payload: &Value) -> Option<String> {
        self.candidates
            .iter()
            .filter_map(|path| lookup_path(payload, path))
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    /// Value as a number; numeric strings parse
    pub fn number(&self, payload: &Value) -> Option<f64> {
        self.candidates
            .iter()
            .filter_map(|path| lookup_path(payload, path))
            .find_map(as_number)
    }

    /// Value as a non-negative integer
    pub fn unsigned(&self, payload: &Value) -> Option<u64> {
        self.number(payload)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.round() as u64)
    }

    /// Value as a boolean; `"true"`/`"false"` strings parse
    pub fn boolean(&self, payload: &Value) -> Option<bool> {
        self.candidates
            .iter()
            .filter_map(|path| lookup_path(payload, path))
            .find_map(|value| match value {
                Value::Bool(b) => Some(*b),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                },
                _ => None,
            })
    }

    /// Value as a UTC timestamp: RFC 3339 text or unix seconds/milliseconds
    pub fn timestamp(&self, payload: &Value) -> Option<DateTime<Utc>> {
        self.candidates
            .iter()
            .filter_map(|path| lookup_path(payload, path))
            .find_map(as_timestamp)
    }
}

fn lookup_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(payload, |current, segment| current.get(segment))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let from_unix = |raw: i64| {
        if raw.abs() >= MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(raw)
        } else {
            DateTime::from_timestamp(raw, 0)
        }
    };

    match value {
        Value::Number(n) => n.as_i64().and_then(from_unix),
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| s.parse::<i64>().ok().and_then(from_unix))
        }
        _ => None,
    }
}

/// Build the LPA activation string from its parts
pub fn lpa_string(smdp: &str, activation_code: &str) -> String {
    format!("LPA:1${}${}", smdp, activation_code)
}

/// Field tables for a reservation response
#[derive(Debug, Clone, Copy)]
pub struct ProfileFields {
    pub provider_profile_id: FieldTable,
    pub iccid: FieldTable,
    pub iccid_hint: FieldTable,
    pub smdp: FieldTable,
    pub activation_code: FieldTable,
    pub lpa_uri: FieldTable,
    pub qr_payload: FieldTable,
}

impl ProfileFields {
    /// Synonyms seen across vendors
    pub const COMMON: ProfileFields = ProfileFields {
        provider_profile_id: FieldTable::new(
            "provider_profile_id",
            &["providerProfileId", "profileId", "esimId", "id"],
        ),
        iccid: FieldTable::new("iccid", &["iccid", "iccidHint"]),
        iccid_hint: FieldTable::new("iccid_hint", &["iccidHint", "iccid"]),
        smdp: FieldTable::new("smdp", &["smdp", "smDpPlus", "smdpAddress", "smdpPlusAddress"]),
        activation_code: FieldTable::new(
            "activation_code",
            &["activationCode", "matchingId", "matching_id"],
        ),
        lpa_uri: FieldTable::new("lpa_uri", &["lpaUri", "lpa", "lpaString", "qrPayload", "qrCode"]),
        qr_payload: FieldTable::new("qr_payload", &["qrPayload", "qrCode", "lpaUri", "lpa"]),
    };

    /// Map a vendor payload into an [`EsimProfile`]
    ///
    /// When neither an LPA string nor a QR payload is present but the SM-DP+
    /// address and activation code are, both are synthesized as
    /// `LPA:1$<smdp>$<code>`.
    pub fn normalize(&self, payload: &Value) -> EsimProfile {
        let smdp = self.smdp.string(payload);
        let activation_code = self.activation_code.string(payload);
        let mut lpa_uri = self.lpa_uri.string(payload);
        let mut qr_payload = self.qr_payload.string(payload);

        if lpa_uri.is_none()
            && qr_payload.is_none()
            && let (Some(smdp), Some(code)) = (&smdp, &activation_code)
        {
            let lpa = lpa_string(smdp, code);
            qr_payload = Some(lpa.clone());
            lpa_uri = Some(lpa);
        }

        EsimProfile {
            provider_profile_id: self.provider_profile_id.string(payload),
            iccid: self.iccid.string(payload),
            iccid_hint: self.iccid_hint.string(payload),
            smdp,
            activation_code,
            lpa_uri,
            qr_payload,
            provider_meta: payload.clone(),
        }
    }
}

/// Field tables for an activation response
#[derive(Debug, Clone, Copy)]
pub struct ActivationFields {
    pub ok: FieldTable,
    pub activated_at: FieldTable,
    pub msisdn: FieldTable,
}

impl ActivationFields {
    /// Synonyms seen across vendors
    pub const COMMON: ActivationFields = ActivationFields {
        ok: FieldTable::new("ok", &["ok", "success", "activated"]),
        activated_at: FieldTable::new(
            "activated_at",
            &["activatedAt", "activationDate", "activated_at"],
        ),
        msisdn: FieldTable::new("msisdn", &["msisdn", "phoneNumber", "number"]),
    };

    /// Map a vendor payload into an [`Activation`]
    ///
    /// A 2xx response without an explicit flag counts as success. The
    /// timestamp is left `None` when the vendor does not report one.
    pub fn normalize(&self, payload: &Value) -> Activation {
        Activation {
            ok: self.ok.boolean(payload).unwrap_or(true),
            activated_at: self.activated_at.timestamp(payload),
            msisdn: self.msisdn.string(payload),
            provider_meta: payload.clone(),
        }
    }
}

/// Field tables for a pack provisioning response
#[derive(Debug, Clone, Copy)]
pub struct ProvisionFields {
    pub provider_purchase_id: FieldTable,
    pub provider_profile_id: FieldTable,
    pub iccid: FieldTable,
    pub qr_code_svg: FieldTable,
    pub expires_at: FieldTable,
    pub data_mb: FieldTable,
}

impl ProvisionFields {
    /// Synonyms seen across vendors
    pub const COMMON: ProvisionFields = ProvisionFields {
        provider_purchase_id: FieldTable::new("provider_purchase_id", &["purchaseId", "id"]),
        provider_profile_id: FieldTable::new(
            "provider_profile_id",
            &["providerProfileId", "profileId", "esimId"],
        ),
        iccid: FieldTable::new("iccid", &["iccid"]),
        qr_code_svg: FieldTable::new("qr_code_svg", &["qrCodeSvg", "qrSvg"]),
        expires_at: FieldTable::new("expires_at", &["expiresAt", "expiryDate", "validUntil"]),
        data_mb: FieldTable::new("data_mb", &["dataMb", "totalMb", "megabytes"]),
    };

    /// Map a vendor payload into a [`ProvisionResult`]
    pub fn normalize(&self, payload: &Value) -> ProvisionResult {
        ProvisionResult {
            provider_purchase_id: self.provider_purchase_id.string(payload),
            provider_profile_id: self.provider_profile_id.string(payload),
            iccid: self.iccid.string(payload),
            qr_code_svg: self.qr_code_svg.string(payload),
            expires_at: self.expires_at.timestamp(payload),
            data_mb: self.data_mb.unsigned(payload),
            provider_meta: payload.clone(),
        }
    }
}

/// Field tables for a usage response
#[derive(Debug, Clone, Copy)]
pub struct UsageFields {
    pub used_mb: FieldTable,
    pub total_mb: FieldTable,
    pub remaining_mb: FieldTable,
    pub expires_at: FieldTable,
}

impl UsageFields {
    /// Synonyms seen across vendors
    pub const COMMON: UsageFields = UsageFields {
        used_mb: FieldTable::new("used_mb", &["usedMb", "used", "consumedMb"]),
        total_mb: FieldTable::new("total_mb", &["totalMb", "total", "dataMb", "allowanceMb"]),
        remaining_mb: FieldTable::new("remaining_mb", &["remainingMb", "remaining", "balanceMb"]),
        expires_at: FieldTable::new("expires_at", &["expiresAt", "expiryDate", "validUntil"]),
    };

    /// Map a vendor payload into an [`EsimUsage`]
    ///
    /// Missing counters read as zero; `remaining_mb` is computed only when the
    /// vendor does not supply it.
    pub fn normalize(&self, payload: &Value) -> EsimUsage {
        let mut usage = EsimUsage::new(
            self.used_mb.number(payload).unwrap_or(0.0),
            self.total_mb.number(payload).unwrap_or(0.0),
            self.remaining_mb.number(payload),
        );
        usage.expires_at = self.expires_at.timestamp(payload);
        usage.provider_meta = payload.clone();
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_reserve_synonyms_map_to_normalized_profile() {
        let payload = json!({
            "smDpPlus": "s",
            "matchingId": "m",
            "qrPayload": "q",
            "iccidHint": "i"
        });

        let profile = ProfileFields::COMMON.normalize(&payload);

        assert_eq!(profile.smdp.as_deref(), Some("s"));
        assert_eq!(profile.activation_code.as_deref(), Some("m"));
        assert_eq!(profile.lpa_uri.as_deref(), Some("q"));
        assert_eq!(profile.qr_payload.as_deref(), Some("q"));
        assert_eq!(profile.iccid.as_deref(), Some("i"));
        assert_eq!(profile.iccid_hint.as_deref(), Some("i"));
        assert_eq!(profile.provider_meta, payload);
    }

    #[test]
    fn test_primary_name_wins_over_synonym() {
        let payload = json!({ "smdp": "primary", "smDpPlus": "synonym" });
        assert_eq!(ProfileFields::COMMON.smdp.string(&payload).as_deref(), Some("primary"));
    }

    #[test]
    fn test_blank_primary_falls_back_to_synonym() {
        let payload = json!({ "activationCode": "  ", "matchingId": "m" });
        assert_eq!(
            ProfileFields::COMMON.activation_code.string(&payload).as_deref(),
            Some("m")
        );
    }

    #[test]
    fn test_lpa_is_synthesized_from_parts() {
        let payload = json!({ "smdp": "smdp.example.test", "activationCode": "AC-1" });
        let profile = ProfileFields::COMMON.normalize(&payload);
        assert_eq!(profile.lpa_uri.as_deref(), Some("LPA:1$smdp.example.test$AC-1"));
        assert_eq!(profile.qr_payload, profile.lpa_uri);
    }

    #[test]
    fn test_dotted_paths_reach_into_envelopes() {
        const ICCID: FieldTable = FieldTable::new("iccid", &["data.iccid", "iccid"]);
        assert_eq!(ICCID.string(&json!({"data": {"iccid": "8944"}})).as_deref(), Some("8944"));
        assert_eq!(ICCID.string(&json!({"iccid": "8955"})).as_deref(), Some("8955"));
    }

    #[test]
    fn test_numbers_and_numeric_strings() {
        let fields = ProvisionFields::COMMON;
        assert_eq!(fields.normalize(&json!({"megabytes": "2048"})).data_mb, Some(2048));
        assert_eq!(fields.normalize(&json!({"totalMb": 1024})).data_mb, Some(1024));
        assert_eq!(fields.normalize(&json!({"dataMb": -5})).data_mb, None);
        assert_eq!(
            fields.normalize(&json!({"id": 77})).provider_purchase_id.as_deref(),
            Some("77")
        );
    }

    #[test]
    fn test_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let table = ActivationFields::COMMON.activated_at;

        assert_eq!(
            table.timestamp(&json!({"activatedAt": "2024-05-01T12:00:00Z"})),
            Some(expected)
        );
        assert_eq!(table.timestamp(&json!({"activatedAt": 1714564800})), Some(expected));
        assert_eq!(table.timestamp(&json!({"activatedAt": 1714564800000i64})), Some(expected));
        assert_eq!(table.timestamp(&json!({"activatedAt": "yesterday"})), None);
    }

    #[test]
    fn test_activation_without_timestamp_stays_none() {
        let activation = ActivationFields::COMMON.normalize(&json!({"msisdn": "+4915100000"}));
        assert!(activation.ok);
        assert_eq!(activation.activated_at, None);
        assert_eq!(activation.msisdn.as_deref(), Some("+4915100000"));
    }

    #[test]
    fn test_usage_remaining() {
        let usage = UsageFields::COMMON.normalize(&json!({"usedMb": 100, "totalMb": 500}));
        assert_eq!(usage.remaining_mb, 400.0);

        let payload = json!({"usedMb": 100, "totalMb": 500, "remainingMb": 7});
        let usage = UsageFields::COMMON.normalize(&payload);
        assert_eq!(usage.remaining_mb, 7.0);
    }
}
