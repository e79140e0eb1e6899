//! Test doubles and common utilities for contract tests
//!
//! - [`ScriptedTransport`]: replays a script of responses/failures and counts calls
//! - [`MockEsimProvider`]: counting adapter with switchable failures
//! - Fixtures for checkout events and a fulfillment setup

#![allow(dead_code)]

use esim_core::config::{CatalogProduct, FulfillmentConfig, PriceCatalog, ProviderKind};
use esim_core::error::{Error, Result};
use esim_core::fulfillment::event::{CheckoutSession, LineItemList};
use esim_core::fulfillment::{BillingEvent, Fulfiller, LineItem};
use esim_core::http::{
    BackoffPolicy, HttpExecutor, Transport, TransportError, TransportRequest, TransportResponse,
};
use esim_core::models::{
    ActivateRequest, Activation, EsimProfile, EsimUsage, LineRequest, LineStatus,
    ProvisionRequest, ProvisionResult, ReserveRequest,
};
use esim_core::{EsimGateway, EsimProvider, FulfillmentStore, MemoryFulfillmentStore};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted transport outcome
#[derive(Debug, Clone)]
pub enum Step {
    /// Respond with a status and a JSON body
    Json(u16, Value),
    /// Respond with a status, content type and raw body
    Raw(u16, Option<&'static str>, String),
    /// Fail at the transport level
    Fail(TransportError),
    /// Never answer (the executor's timeout must fire)
    Hang,
}

/// Transport that replays a script, then repeats a fallback step
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
}

impl ScriptedTransport {
    /// Every call yields `step`
    pub fn always(step: Step) -> Self {
        Self::script(Vec::new(), step)
    }

    /// Calls yield `steps` in order, then `fallback` forever
    pub fn script(steps: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fallback,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of network calls performed
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Json(status, body) => Ok(TransportResponse::json(
                StatusCode::from_u16(status).unwrap(),
                &body,
            )),
            Step::Raw(status, content_type, body) => Ok(TransportResponse::new(
                StatusCode::from_u16(status).unwrap(),
                content_type,
                body,
            )),
            Step::Fail(error) => Err(error),
            Step::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }
}

/// Executor over a scripted transport with deterministic backoff
pub fn scripted_executor(transport: Arc<ScriptedTransport>) -> HttpExecutor {
    HttpExecutor::with_transport(
        transport,
        BackoffPolicy::new(Duration::from_millis(300), Duration::ZERO),
    )
}

/// Adapter double that counts calls per operation
pub struct MockEsimProvider {
    calls: Arc<AtomicUsize>,
    reserve_calls: Arc<AtomicUsize>,
    provision_calls: Arc<AtomicUsize>,
    provisioned: Arc<Mutex<Vec<ProvisionRequest>>>,
    fail_reserve: bool,
    fail_provision: bool,
    reserved_profile_id: Option<String>,
}

impl MockEsimProvider {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            reserve_calls: Arc::new(AtomicUsize::new(0)),
            provision_calls: Arc::new(AtomicUsize::new(0)),
            provisioned: Arc::new(Mutex::new(Vec::new())),
            fail_reserve: false,
            fail_provision: false,
            reserved_profile_id: Some("prof-new".to_string()),
        }
    }

    /// Make `provision_esim_pack` fail with a vendor 502
    pub fn failing_provision(mut self) -> Self {
        self.fail_provision = true;
        self
    }

    /// Make `reserve_esim_profile` fail with a vendor 502
    pub fn failing_reserve(mut self) -> Self {
        self.fail_reserve = true;
        self
    }

    /// Reserve returns a profile without any identifier
    pub fn reserving_without_id(mut self) -> Self {
        self.reserved_profile_id = None;
        self
    }

    /// Create a new mock that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            calls: Arc::clone(&other.calls),
            reserve_calls: Arc::clone(&other.reserve_calls),
            provision_calls: Arc::clone(&other.provision_calls),
            provisioned: Arc::clone(&other.provisioned),
            fail_reserve: other.fail_reserve,
            fail_provision: other.fail_provision,
            reserved_profile_id: other.reserved_profile_id.clone(),
        }
    }

    /// Total calls across all six operations
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reserve_call_count(&self) -> usize {
        self.reserve_calls.load(Ordering::SeqCst)
    }

    pub fn provision_call_count(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }

    /// Provision requests received
    pub fn provisioned(&self) -> Vec<ProvisionRequest> {
        self.provisioned.lock().unwrap().clone()
    }

    fn vendor_failure(operation: &str) -> Error {
        Error::provider(
            "mock",
            format!("MOCK_{}_FAILED", operation.to_uppercase()),
            format!("Mock {} failed: HTTP 502", operation),
            Error::Http {
                url: "https://mock.test".to_string(),
                status: 502,
                status_text: "Bad Gateway".to_string(),
                body: Some(r#"{"error":"upstream"}"#.to_string()),
            },
        )
    }
}

#[async_trait::async_trait]
impl EsimProvider for MockEsimProvider {
    async fn reserve_esim_profile(&self, request: &ReserveRequest) -> Result<EsimProfile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reserve {
            return Err(Self::vendor_failure("reserve"));
        }
        Ok(EsimProfile {
            provider_profile_id: self.reserved_profile_id.clone(),
            smdp: Some("smdp.mock.test".to_string()),
            activation_code: Some(format!("AC-{}", request.region)),
            ..EsimProfile::default()
        })
    }

    async fn activate_profile(&self, _request: &ActivateRequest) -> Result<Activation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Activation {
            ok: true,
            activated_at: None,
            msisdn: None,
            provider_meta: json!({}),
        })
    }

    async fn suspend_line(&self, _request: &LineRequest) -> Result<LineStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LineStatus {
            ok: true,
            provider_meta: json!({}),
        })
    }

    async fn resume_line(&self, _request: &LineRequest) -> Result<LineStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LineStatus {
            ok: true,
            provider_meta: json!({}),
        })
    }

    async fn provision_esim_pack(&self, request: &ProvisionRequest) -> Result<ProvisionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        self.provisioned.lock().unwrap().push(request.clone());
        if self.fail_provision {
            return Err(Self::vendor_failure("provision"));
        }
        Ok(ProvisionResult {
            provider_purchase_id: Some(format!("pur-{}", self.provision_call_count())),
            provider_profile_id: Some(request.provider_profile_id.clone()),
            data_mb: Some(1024),
            provider_meta: json!({}),
            ..ProvisionResult::default()
        })
    }

    async fn fetch_esim_usage(&self, _provider_profile_id: &str) -> Result<EsimUsage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EsimUsage::new(100.0, 500.0, None))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Gateway over a mock adapter
pub fn gateway_with(provider: MockEsimProvider, enabled: bool) -> Arc<EsimGateway> {
    Arc::new(EsimGateway::new(
        ProviderKind::Telna,
        enabled,
        Arc::new(provider),
    ))
}

pub const PRICE_PLAN: &str = "price_plan_pro";
pub const PRICE_MOBILE: &str = "price_mobile_5gb";
pub const PRICE_FAMILY: &str = "price_family_10gb";

/// Catalog with one product of each kind
pub fn catalog() -> PriceCatalog {
    PriceCatalog::new()
        .with_price(
            PRICE_PLAN,
            CatalogProduct::Plan {
                plan_code: "pro".to_string(),
            },
        )
        .with_price(
            PRICE_MOBILE,
            CatalogProduct::MobilePack {
                addon_kind: "data_5gb".to_string(),
                data_mb: 5120,
                plan_code: None,
            },
        )
        .with_price(
            PRICE_FAMILY,
            CatalogProduct::FamilyPack {
                addon_kind: "family_10gb".to_string(),
                data_mb: 10240,
                plan_code: Some("family".to_string()),
            },
        )
}

/// Fulfiller over a shared memory store
pub fn fulfiller(gateway: Arc<EsimGateway>, store: &MemoryFulfillmentStore) -> Fulfiller {
    let store: Arc<dyn FulfillmentStore> = Arc::new(store.clone());
    Fulfiller::new(
        gateway,
        store,
        FulfillmentConfig {
            default_region: "EU".to_string(),
            catalog: catalog(),
        },
    )
}

/// Checkout session paid by `user_id` (via metadata)
pub fn session(session_id: &str, user_id: &str, items: Vec<LineItem>) -> CheckoutSession {
    let mut session = CheckoutSession {
        id: session_id.to_string(),
        line_items: LineItemList { data: items },
        ..CheckoutSession::default()
    };
    session
        .metadata
        .insert("user_id".to_string(), user_id.to_string());
    session
}

/// Checkout-completed event for a session
pub fn checkout_event(event_id: &str, session: &CheckoutSession) -> BillingEvent {
    BillingEvent::checkout_completed(event_id, session).unwrap()
}
