//! Webhook-driven fulfillment
//!
//! Turns a completed checkout into billing state and vendor provisioning,
//! exactly once per paid line item.
//!
//! ## Line item states
//!
//! ```text
//! observed ──claim──► price resolved ──billing commit──► pack handled
//!    │                     │                                  │
//!    ▼                     ▼                          ┌───────┴────────┐
//! Duplicate           UnknownPrice                    ▼                ▼
//!                                               Provisioned   NeedsReconciliation
//! ```
//!
//! Billing commits first. A vendor failure afterwards never rolls it back: it
//! is logged, stored as a [`ReconciliationRecord`] and reported as
//! [`LineState::NeedsReconciliation`] so a sweep can pick it up.

pub mod engine;
pub mod event;

pub use engine::{EngineSummary, FulfillmentEngine, FulfillmentEvent};
pub use event::{BillingEvent, CheckoutSession, LineItem, Price};

use crate::config::{CatalogProduct, FulfillmentConfig};
use crate::error::{Error, Result, codes};
use crate::models::{ProvisionRequest, ProvisionResult, ReserveRequest};
use crate::registry::EsimGateway;
use crate::traits::operations;
use crate::traits::{FamilyGroup, FulfillmentStore, ReconciliationRecord, UserAccount};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Billing state committed for a line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingUpdate {
    /// Data credited to the buyer's own line
    DataCredit {
        /// Megabytes added
        added_mb: u64,
        /// Balance after the credit
        balance_mb: u64,
    },
    /// Family pool created or topped up
    Family {
        /// Group after the update
        group: FamilyGroup,
        /// Whether this line created the group
        created: bool,
    },
}

/// Terminal state of one line item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LineState {
    /// Subscription plan stored
    PlanUpdated {
        /// Stored plan code
        plan_code: String,
    },
    /// Billing committed and vendor provisioned
    Provisioned {
        billing: BillingUpdate,
        result: ProvisionResult,
    },
    /// Billing committed, vendor side failed and was recorded
    NeedsReconciliation {
        billing: BillingUpdate,
        /// Operation that failed
        operation: String,
        /// Error code of the failure
        code: String,
        /// Error message of the failure
        message: String,
    },
    /// Already handled by an earlier delivery
    Duplicate,
    /// Price not in the catalog; nothing was changed
    UnknownPrice,
}

/// Outcome of one line item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineOutcome {
    pub line_item_id: String,
    pub price_id: Option<String>,
    #[serde(flatten)]
    pub state: LineState,
}

/// Outcome of one webhook delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FulfillmentReport {
    /// Not a checkout-completed event
    Ignored { event_id: String, event_type: String },
    /// No user could be resolved; nothing was changed
    Unresolved { event_id: String, session_id: String },
    /// Line items processed
    Fulfilled {
        event_id: String,
        session_id: String,
        user_id: String,
        lines: Vec<LineOutcome>,
    },
}

impl FulfillmentReport {
    /// Line outcomes (empty unless fulfilled)
    pub fn lines(&self) -> &[LineOutcome] {
        match self {
            FulfillmentReport::Fulfilled { lines, .. } => lines,
            _ => &[],
        }
    }

    /// Lines awaiting reconciliation
    pub fn needs_reconciliation(&self) -> impl Iterator<Item = &LineOutcome> {
        self.lines()
            .iter()
            .filter(|line| matches!(line.state, LineState::NeedsReconciliation { .. }))
    }
}

/// Vendor-side failure of a pack, kept for the reconciliation record
struct VendorFailure {
    operation: &'static str,
    code: String,
    message: String,
}

impl VendorFailure {
    fn from_error(operation: &'static str, error: &Error) -> Self {
        Self {
            operation,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Applies checkout events to the store and the active provider
#[derive(Clone)]
pub struct Fulfiller {
    gateway: Arc<EsimGateway>,
    store: Arc<dyn FulfillmentStore>,
    config: FulfillmentConfig,
}

impl Fulfiller {
    /// Create a fulfiller
    pub fn new(
        gateway: Arc<EsimGateway>,
        store: Arc<dyn FulfillmentStore>,
        config: FulfillmentConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            config,
        }
    }

    /// Handle one webhook delivery
    ///
    /// # Returns
    ///
    /// - `Ok(FulfillmentReport)`: per-line outcomes; vendor failures are inside
    /// - `Err(Error)`: malformed payload or a store failure during a billing
    ///   commit (the line's claim is released so a redelivery retries it)
    pub async fn handle_event(&self, event: &BillingEvent) -> Result<FulfillmentReport> {
        let Some(session) = event.checkout_session()? else {
            debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring billing event");
            return Ok(FulfillmentReport::Ignored {
                event_id: event.id.clone(),
                event_type: event.event_type.clone(),
            });
        };

        let Some(user) = self.resolve_user(&session).await? else {
            warn!(
                event_id = %event.id,
                session_id = %session.id,
                customer = ?session.customer,
                "Checkout completed but no user could be resolved, skipping"
            );
            return Ok(FulfillmentReport::Unresolved {
                event_id: event.id.clone(),
                session_id: session.id.clone(),
            });
        };

        info!(
            event_id = %event.id,
            session_id = %session.id,
            user_id = %user.id,
            line_items = session.line_items.data.len(),
            "Fulfilling checkout"
        );

        let mut profile_id = user.provider_profile_id.clone();
        let mut lines = Vec::with_capacity(session.line_items.data.len());
        for item in &session.line_items.data {
            let state = self
                .handle_line(&session, item, &user, &mut profile_id)
                .await?;
            lines.push(LineOutcome {
                line_item_id: item.id.clone(),
                price_id: item.price.as_ref().map(|p| p.id.clone()),
                state,
            });
        }

        Ok(FulfillmentReport::Fulfilled {
            event_id: event.id.clone(),
            session_id: session.id.clone(),
            user_id: user.id,
            lines,
        })
    }

    /// Metadata user id, then client reference, then stored customer id
    async fn resolve_user(&self, session: &CheckoutSession) -> Result<Option<UserAccount>> {
        let direct = [
            session.metadata_user_id(),
            session
                .client_reference_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty()),
        ];

        for user_id in direct.into_iter().flatten() {
            if let Some(user) = self.store.find_user(user_id).await? {
                return Ok(Some(user));
            }
            debug!(user_id, "Referenced user not found in store");
        }

        match session.customer.as_deref() {
            Some(customer) => self.store.find_user_by_customer(customer).await,
            None => Ok(None),
        }
    }

    async fn handle_line(
        &self,
        session: &CheckoutSession,
        item: &LineItem,
        user: &UserAccount,
        profile_id: &mut Option<String>,
    ) -> Result<LineState> {
        let line_key = format!("{}:{}", session.id, item.id);

        if !self.store.claim_line_item(&line_key).await? {
            info!(line_key = %line_key, "Line item already fulfilled, skipping");
            return Ok(LineState::Duplicate);
        }

        let product = item
            .price
            .as_ref()
            .and_then(|price| self.config.catalog.resolve(&price.id));
        let Some(product) = product else {
            warn!(
                line_key = %line_key,
                price_id = ?item.price.as_ref().map(|p| &p.id),
                "Unknown price, skipping line item"
            );
            self.store.release_line_item(&line_key).await?;
            return Ok(LineState::UnknownPrice);
        };

        let committed = self.commit_billing(user, item, product).await;
        let (billing, addon_kind, plan_code) = match committed {
            Ok(Committed::Plan(plan_code)) => {
                info!(line_key = %line_key, plan_code = %plan_code, "Plan updated");
                return Ok(LineState::PlanUpdated { plan_code });
            }
            Ok(Committed::Pack {
                billing,
                addon_kind,
                plan_code,
            }) => (billing, addon_kind, plan_code),
            Err(e) => {
                error!(
                    line_key = %line_key,
                    error = %e,
                    "Billing commit failed, releasing line item"
                );
                self.store.release_line_item(&line_key).await?;
                return Err(e);
            }
        };

        match self
            .provision(user, profile_id, &addon_kind, plan_code)
            .await
        {
            Ok(result) => {
                info!(
                    line_key = %line_key,
                    purchase_id = ?result.provider_purchase_id,
                    "Pack provisioned"
                );
                Ok(LineState::Provisioned { billing, result })
            }
            Err(failure) => {
                error!(
                    line_key = %line_key,
                    operation = failure.operation,
                    code = %failure.code,
                    error = %failure.message,
                    "Provisioning failed after billing commit, marking for reconciliation"
                );

                let record = ReconciliationRecord {
                    line_key: line_key.clone(),
                    user_id: user.id.clone(),
                    price_id: item
                        .price
                        .as_ref()
                        .map(|p| p.id.clone())
                        .unwrap_or_default(),
                    operation: failure.operation.to_string(),
                    code: failure.code.clone(),
                    message: failure.message.clone(),
                    recorded_at: Utc::now(),
                };
                if let Err(e) = self.store.mark_needs_reconciliation(record).await {
                    error!(
                        line_key = %line_key,
                        error = %e,
                        "Failed to store reconciliation record"
                    );
                }

                Ok(LineState::NeedsReconciliation {
                    billing,
                    operation: failure.operation.to_string(),
                    code: failure.code,
                    message: failure.message,
                })
            }
        }
    }

    async fn commit_billing(
        &self,
        user: &UserAccount,
        item: &LineItem,
        product: &CatalogProduct,
    ) -> Result<Committed> {
        let units = item.units();
        match product {
            CatalogProduct::Plan { plan_code } => {
                self.store.set_plan(&user.id, plan_code).await?;
                Ok(Committed::Plan(plan_code.clone()))
            }
            CatalogProduct::MobilePack {
                addon_kind,
                data_mb,
                plan_code,
            } => {
                let added_mb = data_mb.saturating_mul(units);
                let balance_mb = self.store.add_data_credit(&user.id, added_mb).await?;
                Ok(Committed::Pack {
                    billing: BillingUpdate::DataCredit {
                        added_mb,
                        balance_mb,
                    },
                    addon_kind: addon_kind.clone(),
                    plan_code: plan_code.clone(),
                })
            }
            CatalogProduct::FamilyPack {
                addon_kind,
                data_mb,
                plan_code,
            } => {
                let top_up = self
                    .store
                    .create_or_top_up_family(&user.id, data_mb.saturating_mul(units))
                    .await?;
                Ok(Committed::Pack {
                    billing: BillingUpdate::Family {
                        group: top_up.group,
                        created: top_up.created,
                    },
                    addon_kind: addon_kind.clone(),
                    plan_code: plan_code.clone(),
                })
            }
        }
    }

    /// Best-effort vendor side of a pack: reserve a profile if needed, then provision
    async fn provision(
        &self,
        user: &UserAccount,
        profile_id: &mut Option<String>,
        addon_kind: &str,
        plan_code: Option<String>,
    ) -> std::result::Result<ProvisionResult, VendorFailure> {
        let provider_profile_id = match profile_id.clone() {
            Some(id) => id,
            None => {
                let request =
                    ReserveRequest::new(self.config.default_region.clone()).for_user(&user.id);
                let profile = self
                    .gateway
                    .reserve_esim_profile(&request)
                    .await
                    .map_err(|e| VendorFailure::from_error(operations::RESERVE, &e))?;

                if let Err(e) = self.store.set_esim_profile(&user.id, &profile).await {
                    error!(user_id = %user.id, error = %e, "Failed to store reserved profile");
                }

                let id = profile
                    .provider_profile_id
                    .clone()
                    .or_else(|| profile.iccid.clone())
                    .ok_or_else(|| VendorFailure {
                        operation: operations::RESERVE,
                        code: codes::ESIM_MISSING_PROFILE.to_string(),
                        message: "Reserved profile has no identifier".to_string(),
                    })?;
                *profile_id = Some(id.clone());
                id
            }
        };

        let request = ProvisionRequest {
            user_id: user.id.clone(),
            provider_profile_id,
            addon_kind: addon_kind.to_string(),
            plan_code,
        };
        self.gateway
            .provision_esim_pack(&request)
            .await
            .map_err(|e| VendorFailure::from_error(operations::PROVISION, &e))
    }
}

enum Committed {
    Plan(String),
    Pack {
        billing: BillingUpdate,
        addon_kind: String,
        plan_code: Option<String>,
    },
}
