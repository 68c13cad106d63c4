use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    checkout_api::{checkout_objects::CompletedPurchase, errors::FailureKind},
    purchase_types::{ItemId, OrderId, TransactionId},
};

/// Published once a purchase has been charged and its order recorded. Subscribers typically refresh the item listing,
/// navigate to the order history and close the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCompletedEvent {
    pub purchase: CompletedPurchase,
    pub completed_at: DateTime<Utc>,
}

impl PurchaseCompletedEvent {
    pub fn new(purchase: CompletedPurchase) -> Self {
        Self { purchase, completed_at: Utc::now() }
    }
}

/// Published whenever a checkout attempt fails. `transaction_id` is only set if money was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseFailedEvent {
    pub item_id: ItemId,
    pub kind: FailureKind,
    pub detail: String,
    pub retryable: bool,
    pub transaction_id: Option<TransactionId>,
    pub failed_at: DateTime<Utc>,
}

/// Published when an order was recorded but the matching stock decrement failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDiscrepancyEvent {
    pub item_id: ItemId,
    pub order_id: OrderId,
    pub quantity: u32,
    pub reason: String,
}
