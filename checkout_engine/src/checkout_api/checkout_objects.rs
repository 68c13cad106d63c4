use std::fmt::Display;

use checkout_common::Cents;
use serde::{Deserialize, Serialize};

use crate::purchase_types::{OrderRecord, PaymentAuthorization, PurchaseStatus, TransactionId};

/// A non-fatal message explaining why the requested quantity was adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantityNotice {
    ExceedsStock { available: u32 },
    BelowMinimum,
}

impl Display for QuantityNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExceedsStock { available } => {
                write!(f, "Quantity exceeds available stock! Only {available} available.")
            },
            Self::BelowMinimum => f.write_str("Quantity cannot be less than 1"),
        }
    }
}

/// The clamped quantity and derived total for a requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub quantity: u32,
    pub total_price: Cents,
    pub notice: Option<QuantityNotice>,
}

/// The result of an authorization request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationUpdate {
    /// The authorization is now held by the checkout.
    Ready(PaymentAuthorization),
    /// A newer request (or a quantity change) made this response obsolete. Nothing was stored.
    Superseded,
}

impl AuthorizationUpdate {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryStatus {
    Adjusted,
    /// The order stands, but the stock count was not decremented and must be corrected out-of-band.
    Discrepancy { reason: String },
}

/// A purchase that has been charged and recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPurchase {
    pub order: OrderRecord,
    pub inventory: InventoryStatus,
}

impl CompletedPurchase {
    pub fn inventory_adjusted(&self) -> bool {
        self.inventory == InventoryStatus::Adjusted
    }
}

/// Details of a charge that was captured without a matching order record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialCommit {
    pub transaction_id: TransactionId,
    pub reason: String,
}

/// A confirmation that got no usable answer from the processor. The card may or may not have been charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCharge {
    pub transaction_id: Option<TransactionId>,
    pub reason: String,
}

/// What happened when the buyer dismissed the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nothing had been charged. The request was discarded.
    Discarded,
    /// A commit write is in flight. It will run to completion and its outcome will still be published.
    Deferred,
    /// The checkout had already reached a terminal state.
    Finished(PurchaseStatus),
}
