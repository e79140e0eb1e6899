//! Core traits for the eSIM gateway
//!
//! - [`EsimProvider`]: Six normalized operations against one vendor
//! - [`FulfillmentStore`]: Persistence boundary for webhook fulfillment

pub mod esim_provider;
pub mod fulfillment_store;

pub use esim_provider::{EsimProvider, EsimProviderFactory, operations};
pub use fulfillment_store::{
    FamilyGroup, FamilyTopUp, FulfillmentStore, ReconciliationRecord, UserAccount,
};
