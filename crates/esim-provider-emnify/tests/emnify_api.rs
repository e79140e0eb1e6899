//! emnify adapter against a mock HTTP server

use esim_core::config::EmnifyConfig;
use esim_core::http::{BackoffPolicy, HttpExecutor};
use esim_core::models::{ActivateRequest, LineRequest, ProvisionRequest, ReserveRequest};
use esim_core::EsimProvider;
use esim_provider_emnify::EmnifyProvider;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// `base64("app-1:secret-1")`
const BASIC_AUTH: &str = "Basic YXBwLTE6c2VjcmV0LTE=";

fn provider(server: &MockServer) -> EmnifyProvider {
    let executor = Arc::new(
        HttpExecutor::new(BackoffPolicy::new(Duration::from_millis(10), Duration::ZERO)).unwrap(),
    );
    let config = EmnifyConfig {
        api_base: Some(server.base_url()),
        app_token_id: Some("app-1".to_string()),
        app_token_secret: Some("secret-1".to_string()),
        max_attempts: 2,
    };
    EmnifyProvider::new(Some(&config), Duration::from_secs(5), executor).unwrap()
}

fn provision_request() -> ProvisionRequest {
    ProvisionRequest {
        user_id: "42".to_string(),
        provider_profile_id: "prof-1".to_string(),
        addon_kind: "family_10gb".to_string(),
        plan_code: Some("family".to_string()),
    }
}

#[tokio::test]
async fn reserve_uses_basic_auth() {
    let server = MockServer::start_async().await;
    let reserve = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/esim/profiles")
            .header("authorization", BASIC_AUTH)
            .json_body(json!({ "region": "EU", "userId": null }));
        then.status(201).json_body(json!({
            "id": "em-1",
            "smdpAddress": "smdp.emnify.test",
            "matchingId": "MID-1",
            "sim": { "iccid": "8988" }
        }));
    });

    let profile = provider(&server)
        .reserve_esim_profile(&ReserveRequest::new("EU"))
        .await
        .unwrap();

    reserve.assert();
    assert_eq!(profile.provider_profile_id.as_deref(), Some("em-1"));
    assert_eq!(profile.iccid.as_deref(), Some("8988"));
    assert_eq!(profile.lpa_uri.as_deref(), Some("LPA:1$smdp.emnify.test$MID-1"));
}

#[tokio::test]
async fn status_changes_patch_the_profile() {
    let server = MockServer::start_async().await;
    let activate = server.mock(|when, then| {
        when.method(PATCH)
            .path("/api/v1/esim/profiles/prof-1")
            .json_body(json!({ "status": "ACTIVE" }));
        then.status(200)
            .json_body(json!({ "activationDate": "2026-05-04T08:30:00Z" }));
    });
    let suspend = server.mock(|when, then| {
        when.method(PATCH)
            .path("/api/v1/esim/profiles/prof-1")
            .json_body(json!({ "status": "SUSPENDED" }));
        then.status(204);
    });

    let emnify = provider(&server);
    let activation = emnify
        .activate_profile(&ActivateRequest::by_profile("prof-1"))
        .await
        .unwrap();
    let suspended = emnify
        .suspend_line(&LineRequest::by_profile("prof-1"))
        .await
        .unwrap();
    let resumed = emnify
        .resume_line(&LineRequest::by_profile("prof-1"))
        .await
        .unwrap();

    activate.assert_hits(2);
    suspend.assert_hits(1);
    assert!(activation.ok);
    assert!(activation.activated_at.is_some());
    assert!(suspended.ok);
    assert!(resumed.ok);
}

#[tokio::test]
async fn activation_code_alone_is_sent_in_body() {
    let server = MockServer::start_async().await;
    let by_code = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/esim/profiles/activation")
            .header("authorization", BASIC_AUTH)
            .json_body(json!({ "activationCode": "AC-9", "status": "ACTIVE" }));
        then.status(200).json_body(json!({ "msisdn": "+491700000" }));
    });
    let patch = server.mock(|when, then| {
        when.method(PATCH);
        then.status(200).json_body(json!({}));
    });

    let request = ActivateRequest {
        activation_code: Some(" AC-9 ".to_string()),
        ..ActivateRequest::default()
    };
    let activation = provider(&server).activate_profile(&request).await.unwrap();

    by_code.assert();
    patch.assert_hits(0);
    assert_eq!(activation.msisdn.as_deref(), Some("+491700000"));
    assert_eq!(activation.activated_at, None);
}

#[tokio::test]
async fn provision_posts_package_for_profile() {
    let server = MockServer::start_async().await;
    let packages = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/esim/profiles/prof-1/packages")
            .json_body(json!({
                "userId": "42",
                "addonKind": "family_10gb",
                "planCode": "family"
            }));
        then.status(200).json_body(json!({
            "packageId": 9001,
            "volume": { "totalMb": 10240 },
            "expiryDate": "2026-12-31T23:59:59Z"
        }));
    });

    let result = provider(&server)
        .provision_esim_pack(&provision_request())
        .await
        .unwrap();

    packages.assert();
    assert_eq!(result.provider_purchase_id.as_deref(), Some("9001"));
    assert_eq!(result.provider_profile_id.as_deref(), Some("prof-1"));
    assert_eq!(result.data_mb, Some(10240));
    assert!(result.expires_at.is_some());
}

#[tokio::test]
async fn server_errors_retry_within_budget() {
    let server = MockServer::start_async().await;
    let packages = server.mock(|when, then| {
        when.method(POST).path("/api/v1/esim/profiles/prof-1/packages");
        then.status(500).body("internal");
    });

    let err = provider(&server)
        .provision_esim_pack(&provision_request())
        .await
        .unwrap_err();

    packages.assert_hits(2);
    assert_eq!(err.code(), "EMNIFY_PROVISION_FAILED");
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.provider_body(), Some("internal"));
    assert_eq!(err.provider_meta(), None);
}

#[tokio::test]
async fn usage_reads_nested_volume() {
    let server = MockServer::start_async().await;
    let usage = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/esim/profiles/prof-1/usage")
            .header("authorization", BASIC_AUTH);
        then.status(200).json_body(json!({
            "volume": { "usedMb": 600, "totalMb": 1024, "remainingMb": 400 }
        }));
    });

    let result = provider(&server).fetch_esim_usage("prof-1").await.unwrap();

    usage.assert();
    assert_eq!(result.used_mb, 600.0);
    // Vendor-supplied remaining wins over the computed value
    assert_eq!(result.remaining_mb, 400.0);
}
