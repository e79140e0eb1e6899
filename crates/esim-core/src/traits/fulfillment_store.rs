// # Fulfillment Store Trait
//
// The persistence boundary of webhook fulfillment. The gateway never talks to
// a database directly; billing state flows through this trait.
//
// ## Transactional guarantees
//
// - `claim_line_item` is an atomic test-and-set: the first caller for a key
//   gets `true`, every later caller `false`
// - `create_or_top_up_family` creates the owner's group or adds to it in one
//   step, so concurrent deliveries never create two groups
//
// ## Implementations
//
// - In-memory: `MemoryFulfillmentStore` (tests and the `esimd` binary)

use crate::models::EsimProfile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Billing-side view of an application user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAccount {
    /// Application user id
    pub id: String,
    /// Billing vendor customer id
    pub customer_id: Option<String>,
    /// Active subscription plan
    pub plan_code: Option<String>,
    /// Prepaid data credited to the user's own line
    pub data_credit_mb: u64,
    /// Vendor profile bound to the user
    pub provider_profile_id: Option<String>,
    /// ICCID of the bound profile
    pub iccid: Option<String>,
}

impl UserAccount {
    /// Create a user without billing state
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Attach a billing customer id
    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Attach a vendor profile id
    pub fn with_profile(mut self, provider_profile_id: impl Into<String>) -> Self {
        self.provider_profile_id = Some(provider_profile_id.into());
        self
    }
}

/// Shared data pool owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyGroup {
    /// Group id
    pub id: String,
    /// Owner user id (one group per owner)
    pub owner_user_id: String,
    /// Pool size in megabytes
    pub total_data_mb: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last top-up time
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a create-or-top-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTopUp {
    /// Group state after the operation
    pub group: FamilyGroup,
    /// Whether the group was created by this call
    pub created: bool,
}

/// Billing commit whose vendor side still has to be synced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    /// Line item key (`<session id>:<line item id>`)
    pub line_key: String,
    /// Buyer
    pub user_id: String,
    /// Billing price id of the line item
    pub price_id: String,
    /// Provider operation that failed
    pub operation: String,
    /// Error code of the failure
    pub code: String,
    /// Error message of the failure
    pub message: String,
    /// When the failure was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Trait for fulfillment store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    /// Look up a user by application id
    async fn find_user(&self, user_id: &str) -> Result<Option<UserAccount>, crate::Error>;

    /// Look up a user by billing customer id
    async fn find_user_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<UserAccount>, crate::Error>;

    /// Claim a line item for processing
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: first claim, the caller owns the line item
    /// - `Ok(false)`: already claimed by an earlier delivery
    async fn claim_line_item(&self, line_key: &str) -> Result<bool, crate::Error>;

    /// Release a claim whose billing mutation failed, so a redelivery retries it
    async fn release_line_item(&self, line_key: &str) -> Result<(), crate::Error>;

    /// Set the user's subscription plan
    async fn set_plan(&self, user_id: &str, plan_code: &str) -> Result<(), crate::Error>;

    /// Credit data to the user's own line
    ///
    /// # Returns
    ///
    /// The new credit balance in megabytes
    async fn add_data_credit(&self, user_id: &str, data_mb: u64) -> Result<u64, crate::Error>;

    /// Bind a reserved profile to the user
    async fn set_esim_profile(
        &self,
        user_id: &str,
        profile: &EsimProfile,
    ) -> Result<(), crate::Error>;

    /// Create the owner's family group, or top up the existing one
    ///
    /// Must be atomic with respect to concurrent calls for the same owner.
    async fn create_or_top_up_family(
        &self,
        owner_user_id: &str,
        data_mb: u64,
    ) -> Result<FamilyTopUp, crate::Error>;

    /// Record a billing commit whose vendor side failed
    async fn mark_needs_reconciliation(
        &self,
        record: ReconciliationRecord,
    ) -> Result<(), crate::Error>;

    /// All records awaiting reconciliation
    async fn needs_reconciliation(&self) -> Result<Vec<ReconciliationRecord>, crate::Error>;
}
