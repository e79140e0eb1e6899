// # Memory Fulfillment Store
//
// In-memory implementation of FulfillmentStore.
//
// ## Purpose
//
// Backs the contract tests and the `esimd replay-webhook` command. A real
// deployment implements `FulfillmentStore` over its database and maps
// `create_or_top_up_family` onto a transaction or a unique owner constraint.
//
// ## Atomicity
//
// All state sits behind a single lock. Every operation that reads and then
// writes holds the write guard for its whole duration, which gives the
// test-and-set and create-or-top-up guarantees of the trait.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::models::EsimProfile;
use crate::traits::fulfillment_store::{
    FamilyGroup, FamilyTopUp, FulfillmentStore, ReconciliationRecord, UserAccount,
};

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<String, UserAccount>,
    claimed_line_items: HashSet<String>,
    /// Keyed by owner user id
    family_groups: HashMap<String, FamilyGroup>,
    reconciliation: Vec<ReconciliationRecord>,
}

impl StoreState {
    fn user_mut(&mut self, user_id: &str) -> Result<&mut UserAccount, Error> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| Error::store(format!("Unknown user '{}'", user_id)))
    }
}

/// In-memory fulfillment store
///
/// # Example
///
/// ```rust,no_run
/// use esim_core::store::MemoryFulfillmentStore;
/// use esim_core::traits::{FulfillmentStore, UserAccount};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryFulfillmentStore::new();
///     store.insert_user(UserAccount::new("42").with_customer("cus_1")).await;
///
///     let user = store.find_user_by_customer("cus_1").await?;
///     assert_eq!(user.map(|u| u.id), Some("42".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFulfillmentStore {
    inner: Arc<RwLock<StoreState>>,
}

impl MemoryFulfillmentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user
    pub async fn insert_user(&self, user: UserAccount) {
        let mut guard = self.inner.write().await;
        guard.users.insert(user.id.clone(), user);
    }

    /// Snapshot of a user
    pub async fn user(&self, user_id: &str) -> Option<UserAccount> {
        self.inner.read().await.users.get(user_id).cloned()
    }

    /// Snapshot of all family groups
    pub async fn family_groups(&self) -> Vec<FamilyGroup> {
        self.inner
            .read()
            .await
            .family_groups
            .values()
            .cloned()
            .collect()
    }

    /// Number of claimed line items
    pub async fn claimed_count(&self) -> usize {
        self.inner.read().await.claimed_line_items.len()
    }
}

#[async_trait]
impl FulfillmentStore for MemoryFulfillmentStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserAccount>, Error> {
        Ok(self.user(user_id).await)
    }

    async fn find_user_by_customer(&self, customer_id: &str) -> Result<Option<UserAccount>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .users
            .values()
            .find(|user| user.customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn claim_line_item(&self, line_key: &str) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.claimed_line_items.insert(line_key.to_string()))
    }

    async fn release_line_item(&self, line_key: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.claimed_line_items.remove(line_key);
        Ok(())
    }

    async fn set_plan(&self, user_id: &str, plan_code: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.user_mut(user_id)?.plan_code = Some(plan_code.to_string());
        Ok(())
    }

    async fn add_data_credit(&self, user_id: &str, data_mb: u64) -> Result<u64, Error> {
        let mut guard = self.inner.write().await;
        let user = guard.user_mut(user_id)?;
        user.data_credit_mb = user.data_credit_mb.saturating_add(data_mb);
        Ok(user.data_credit_mb)
    }

    async fn set_esim_profile(&self, user_id: &str, profile: &EsimProfile) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        let user = guard.user_mut(user_id)?;
        user.provider_profile_id = profile.provider_profile_id.clone();
        user.iccid = profile.iccid.clone().or_else(|| profile.iccid_hint.clone());
        Ok(())
    }

    async fn create_or_top_up_family(
        &self,
        owner_user_id: &str,
        data_mb: u64,
    ) -> Result<FamilyTopUp, Error> {
        let mut guard = self.inner.write().await;
        let now = Utc::now();

        if let Some(group) = guard.family_groups.get_mut(owner_user_id) {
            group.total_data_mb = group.total_data_mb.saturating_add(data_mb);
            group.updated_at = now;
            return Ok(FamilyTopUp {
                group: group.clone(),
                created: false,
            });
        }

        let group = FamilyGroup {
            id: uuid::Uuid::new_v4().to_string(),
            owner_user_id: owner_user_id.to_string(),
            total_data_mb: data_mb,
            created_at: now,
            updated_at: now,
        };
        guard
            .family_groups
            .insert(owner_user_id.to_string(), group.clone());

        Ok(FamilyTopUp {
            group,
            created: true,
        })
    }

    async fn mark_needs_reconciliation(&self, record: ReconciliationRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.reconciliation.push(record);
        Ok(())
    }

    async fn needs_reconciliation(&self) -> Result<Vec<ReconciliationRecord>, Error> {
        Ok(self.inner.read().await.reconciliation.clone())
    }
}
