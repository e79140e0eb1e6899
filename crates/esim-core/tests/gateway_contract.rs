//! Contract Test: Gateway Feature Gate, Validation and Dispatch
//!
//! Constraints verified:
//! - With the feature disabled, all six operations fail with `ESIM_DISABLED`
//!   and the adapter is never called
//! - Invalid input fails with a per-field code and zero adapter calls
//! - Adapter failures keep their code/status and gain the provider name
//! - The provider is resolved once, from the registry, by `ProviderKind`

mod common;

use common::*;
use esim_core::config::{EsimConfig, ProviderKind};
use esim_core::error::{Error, ErrorKind};
use esim_core::http::HttpExecutor;
use esim_core::models::{ActivateRequest, LineRequest, ProvisionRequest, ReserveRequest};
use esim_core::traits::EsimProviderFactory;
use esim_core::{EsimGateway, EsimProvider, ProviderRegistry};
use std::sync::Arc;

fn valid_provision() -> ProvisionRequest {
    ProvisionRequest {
        user_id: "42".to_string(),
        provider_profile_id: "prof-1".to_string(),
        addon_kind: "data_5gb".to_string(),
        plan_code: None,
    }
}

#[tokio::test]
async fn disabled_feature_makes_zero_provider_calls() {
    let provider = MockEsimProvider::new();
    let counters = MockEsimProvider::sharing_counters_with(&provider);
    let gateway = gateway_with(provider, false);

    let results = vec![
        gateway
            .reserve_esim_profile(&ReserveRequest::new("EU").for_user("42"))
            .await
            .map(|_| ()),
        gateway
            .activate_profile(&ActivateRequest::by_profile("prof-1"))
            .await
            .map(|_| ()),
        gateway
            .suspend_line(&LineRequest::by_iccid("8944"))
            .await
            .map(|_| ()),
        gateway
            .resume_line(&LineRequest::by_iccid("8944"))
            .await
            .map(|_| ()),
        gateway
            .provision_esim_pack(&valid_provision())
            .await
            .map(|_| ()),
        gateway.fetch_esim_usage("prof-1").await.map(|_| ()),
    ];

    for result in results {
        let err = result.unwrap_err();
        assert_eq!(err.code(), "ESIM_DISABLED");
        assert_eq!(err.kind(), ErrorKind::Disabled);
    }
    assert_eq!(counters.call_count(), 0);
}

#[tokio::test]
async fn suspend_without_identifier_makes_zero_calls() {
    let provider = MockEsimProvider::new();
    let counters = MockEsimProvider::sharing_counters_with(&provider);
    let gateway = gateway_with(provider, true);

    let err = gateway
        .suspend_line(&LineRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "ESIM_MISSING_IDENTIFIER");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(counters.call_count(), 0);
}

#[tokio::test]
async fn each_invalid_input_has_its_own_code() {
    let provider = MockEsimProvider::new();
    let counters = MockEsimProvider::sharing_counters_with(&provider);
    let gateway = gateway_with(provider, true);

    let code = |e: Error| e.code();

    assert_eq!(
        code(gateway.reserve_esim_profile(&ReserveRequest::new(" ")).await.unwrap_err()),
        "ESIM_INVALID_REGION"
    );
    assert_eq!(
        code(gateway.activate_profile(&ActivateRequest::default()).await.unwrap_err()),
        "ESIM_MISSING_IDENTIFIER"
    );
    assert_eq!(
        code(gateway.resume_line(&LineRequest::default()).await.unwrap_err()),
        "ESIM_MISSING_IDENTIFIER"
    );
    assert_eq!(
        code(gateway.fetch_esim_usage("").await.unwrap_err()),
        "ESIM_MISSING_IDENTIFIER"
    );

    let mut request = valid_provision();
    request.user_id.clear();
    assert_eq!(
        code(gateway.provision_esim_pack(&request).await.unwrap_err()),
        "ESIM_MISSING_USER"
    );

    let mut request = valid_provision();
    request.provider_profile_id.clear();
    assert_eq!(
        code(gateway.provision_esim_pack(&request).await.unwrap_err()),
        "ESIM_MISSING_PROFILE"
    );

    let mut request = valid_provision();
    request.addon_kind.clear();
    assert_eq!(
        code(gateway.provision_esim_pack(&request).await.unwrap_err()),
        "ESIM_MISSING_ADDON"
    );

    assert_eq!(counters.call_count(), 0);
}

#[tokio::test]
async fn valid_calls_reach_the_adapter() {
    let provider = MockEsimProvider::new();
    let counters = MockEsimProvider::sharing_counters_with(&provider);
    let gateway = gateway_with(provider, true);

    let usage = gateway.fetch_esim_usage("prof-1").await.unwrap();
    assert_eq!(usage.remaining_mb, 400.0);

    gateway
        .suspend_line(&LineRequest::by_profile("prof-1"))
        .await
        .unwrap();
    assert_eq!(counters.call_count(), 2);
}

#[tokio::test]
async fn adapter_failures_are_rewrapped_with_provider() {
    let provider = MockEsimProvider::new().failing_provision();
    let gateway = gateway_with(provider, true);

    let err = gateway
        .provision_esim_pack(&valid_provision())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Dispatch { .. }));
    assert_eq!(err.code(), "MOCK_PROVISION_FAILED");
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.provider_name(), Some("mock"));
    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(
        err.provider_meta(),
        Some(&serde_json::json!({ "error": "upstream" }))
    );

    // The adapter error is kept as the source
    let source = std::error::Error::source(&err).unwrap();
    assert!(source.to_string().contains("Mock provision failed"));
}

struct MockFactory;

impl EsimProviderFactory for MockFactory {
    fn create(
        &self,
        _config: &EsimConfig,
        _executor: Arc<HttpExecutor>,
    ) -> esim_core::Result<Box<dyn EsimProvider>> {
        Ok(Box::new(MockEsimProvider::new()))
    }
}

#[tokio::test]
async fn provider_is_resolved_from_registry() {
    let registry = ProviderRegistry::new();
    registry.register_provider(ProviderKind::Emnify, Box::new(MockFactory));

    let config = EsimConfig {
        enabled: true,
        provider: ProviderKind::Emnify,
        ..EsimConfig::default()
    };
    let gateway = EsimGateway::from_registry(&registry, &config).unwrap();

    assert_eq!(gateway.provider_kind(), ProviderKind::Emnify);
    assert!(gateway.fetch_esim_usage("prof-1").await.is_ok());
}

#[test]
fn unregistered_provider_is_unsupported() {
    let registry = ProviderRegistry::new();
    registry.register_provider(ProviderKind::Emnify, Box::new(MockFactory));

    let config = EsimConfig {
        enabled: true,
        provider: ProviderKind::Telna,
        ..EsimConfig::default()
    };
    let err = EsimGateway::from_registry(&registry, &config).unwrap_err();

    assert_eq!(err.code(), "ESIM_UNSUPPORTED_PROVIDER");
}
