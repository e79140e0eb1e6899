//! Billing webhook payloads
//!
//! Only the fields fulfillment reads are typed; everything else stays in the
//! raw `data.object` value.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Event type that triggers fulfillment
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// One webhook delivery from the billing vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    /// Vendor event id
    pub id: String,
    /// Event type, e.g. `checkout.session.completed`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event envelope
    pub data: EventData,
}

/// Envelope around the event's subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Subject of the event, shape depends on `type`
    pub object: Value,
}

impl BillingEvent {
    /// Create a checkout-completed event for a session
    pub fn checkout_completed(id: impl Into<String>, session: &CheckoutSession) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            event_type: CHECKOUT_SESSION_COMPLETED.to_string(),
            data: EventData {
                object: serde_json::to_value(session)?,
            },
        })
    }

    /// Whether this event triggers fulfillment
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_SESSION_COMPLETED
    }

    /// Decode the checkout session of a checkout-completed event
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: any other event type
    /// - `Err(Error::Json)`: the session payload is malformed
    pub fn checkout_session(&self) -> Result<Option<CheckoutSession>> {
        if !self.is_checkout_completed() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.data.object.clone())?))
    }
}

/// Completed checkout session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session id
    pub id: String,
    /// Billing customer id
    #[serde(default)]
    pub customer: Option<String>,
    /// Application-supplied reference, usually the user id
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Free-form metadata attached at checkout creation
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Expanded line items
    #[serde(default)]
    pub line_items: LineItemList,
}

impl CheckoutSession {
    /// User id carried in metadata (`user_id` or `userId`)
    pub fn metadata_user_id(&self) -> Option<&str> {
        ["user_id", "userId"]
            .iter()
            .filter_map(|key| self.metadata.get(*key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }
}

/// Vendor list wrapper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemList {
    #[serde(default)]
    pub data: Vec<LineItem>,
}

/// One purchased line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line item id, unique within the session
    pub id: String,
    /// Units bought; absent or null counts as one
    #[serde(default)]
    pub quantity: Option<u64>,
    /// Price the line was bought under
    #[serde(default)]
    pub price: Option<Price>,
}

impl LineItem {
    /// Units to fulfill, at least one
    pub fn units(&self) -> u64 {
        self.quantity.unwrap_or(1).max(1)
    }

    /// Create a line item for a price
    pub fn new(id: impl Into<String>, price_id: impl Into<String>, quantity: u64) -> Self {
        Self {
            id: id.into(),
            quantity: Some(quantity),
            price: Some(Price {
                id: price_id.into(),
                price_type: Some("one_time".to_string()),
                recurring: None,
            }),
        }
    }
}

/// Billing price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Price id, the catalog key
    pub id: String,
    /// `one_time` or `recurring`
    #[serde(rename = "type", default)]
    pub price_type: Option<String>,
    /// Recurrence details of subscription prices
    #[serde(default)]
    pub recurring: Option<Value>,
}
