use std::{fmt::Display, str::FromStr};

use checkout_common::{helpers::intent_id_from_secret, Cents, Secret};
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------        ItemId         ---------------------------------------------------------
/// Opaque identifier of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl FromStr for ItemId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The identifier the backend assigns to a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     TransactionId     ---------------------------------------------------------
/// The identifier the payment processor assigns to a confirmed charge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------         Buyer         ---------------------------------------------------------
/// The buyer's identity, as supplied by the authentication provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl Buyer {
    pub fn new<S: Into<String>>(name: S, email: S) -> Self {
        Self { name: name.into(), email: email.into(), avatar_url: None }
    }

    pub fn with_avatar_url<S: Into<String>>(mut self, url: S) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub fn billing_details(&self) -> BillingDetails {
        BillingDetails { name: self.name.clone(), email: self.email.clone() }
    }
}

//--------------------------------------      CatalogItem      ---------------------------------------------------------
/// A snapshot of a catalog entry, taken when the checkout opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub unit_price: Cents,
    pub available: u32,
    pub seller_email: String,
}

//--------------------------------------    PurchaseStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchaseStatus {
    /// The checkout is open, and no usable payment authorization is held.
    #[default]
    Pending,
    /// An authorization request is in flight.
    AuthorizationRequested,
    /// An authorization for the current item and quantity is held.
    AuthorizationReady,
    /// Card details have been handed to the payment processor.
    Confirming,
    /// The charge succeeded and the order is being written.
    Committing,
    /// The order has been recorded.
    Completed,
    /// The last attempt failed. See [`crate::CheckoutError`] for whether it can be retried.
    Failed,
}

impl Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::AuthorizationRequested => "AuthorizationRequested",
            Self::AuthorizationReady => "AuthorizationReady",
            Self::Confirming => "Confirming",
            Self::Committing => "Committing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid purchase status: {0}")]
pub struct ConversionError(String);

impl FromStr for PurchaseStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "AuthorizationRequested" => Ok(Self::AuthorizationRequested),
            "AuthorizationReady" => Ok(Self::AuthorizationReady),
            "Confirming" => Ok(Self::Confirming),
            "Committing" => Ok(Self::Committing),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------    PurchaseRequest    ---------------------------------------------------------
/// The mutable state of one checkout. It is owned by the [`crate::PurchaseCoordinator`] and is never persisted
/// directly; only the [`OrderRecord`] derived from it survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub buyer: Buyer,
    pub item_id: ItemId,
    pub seller_email: String,
    pub unit_price: Cents,
    pub available: u32,
    pub quantity: u32,
    pub total_price: Cents,
    pub shipping_address: String,
    pub status: PurchaseStatus,
}

impl PurchaseRequest {
    /// A fresh request for a single unit of `item`.
    pub fn new(buyer: Buyer, item: &CatalogItem) -> Self {
        Self {
            buyer,
            item_id: item.id.clone(),
            seller_email: item.seller_email.clone(),
            unit_price: item.unit_price,
            available: item.available,
            quantity: 1,
            total_price: item.unit_price,
            shipping_address: String::default(),
            status: PurchaseStatus::Pending,
        }
    }

    pub fn has_shipping_address(&self) -> bool {
        !self.shipping_address.trim().is_empty()
    }
}

//--------------------------------------  PaymentAuthorization ---------------------------------------------------------
/// A short-lived processor secret that binds an amount to a future charge confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAuthorization {
    pub secret: Secret<String>,
    pub issued_for_item: ItemId,
    pub issued_for_quantity: u32,
}

impl PaymentAuthorization {
    pub fn new(secret: Secret<String>, item_id: ItemId, quantity: u32) -> Self {
        Self { secret, issued_for_item: item_id, issued_for_quantity: quantity }
    }

    /// An authorization is bound to an amount. It may only be used for the exact item and quantity it was issued for.
    pub fn is_valid_for(&self, item_id: &ItemId, quantity: u32) -> bool {
        &self.issued_for_item == item_id && self.issued_for_quantity == quantity
    }

    /// The processor payment this authorization confirms, if the secret carries one.
    pub fn intent_id(&self) -> Option<TransactionId> {
        intent_id_from_secret(self.secret.reveal()).map(TransactionId::from)
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
/// The order the backend is asked to persist after a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub buyer: Buyer,
    pub item_id: ItemId,
    pub seller_email: String,
    pub unit_price: Cents,
    pub quantity: u32,
    pub total_price: Cents,
    pub shipping_address: String,
    /// Fulfilment status of the order. Always `Pending` for new orders.
    pub fulfilment_status: String,
    pub transaction_id: TransactionId,
}

impl NewOrder {
    pub fn from_request(request: &PurchaseRequest, transaction_id: TransactionId) -> Self {
        Self {
            buyer: request.buyer.clone(),
            item_id: request.item_id.clone(),
            seller_email: request.seller_email.clone(),
            unit_price: request.unit_price,
            quantity: request.quantity,
            total_price: request.total_price,
            shipping_address: request.shipping_address.trim().to_string(),
            fulfilment_status: "Pending".to_string(),
            transaction_id,
        }
    }
}

//--------------------------------------      OrderRecord      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub order: NewOrder,
}

impl OrderRecord {
    pub fn transaction_id(&self) -> &TransactionId {
        &self.order.transaction_id
    }
}

//--------------------------------------  InventoryAdjustment  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

impl Display for AdjustmentDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increase => f.write_str("increase"),
            Self::Decrease => f.write_str("decrease"),
        }
    }
}

/// A signed change to an item's stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub item_id: ItemId,
    pub delta: i64,
}

impl InventoryAdjustment {
    pub fn decrease(item_id: ItemId, quantity: u32) -> Self {
        Self { item_id, delta: -i64::from(quantity) }
    }

    pub fn direction(&self) -> AdjustmentDirection {
        if self.delta < 0 {
            AdjustmentDirection::Decrease
        } else {
            AdjustmentDirection::Increase
        }
    }

    pub fn magnitude(&self) -> u64 {
        self.delta.unsigned_abs()
    }
}

//--------------------------------------  Card & billing data  ---------------------------------------------------------
/// Raw card input. The number and CVC never appear in logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub number: Secret<String>,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: Secret<String>,
}

impl CardDetails {
    pub fn new<S: Into<String>>(number: S, exp_month: u8, exp_year: u16, cvc: S) -> Self {
        Self { number: Secret::new(number.into()), exp_month, exp_year, cvc: Secret::new(cvc.into()) }
    }

    /// True when every field has been filled in. Whether the card is actually valid is for the processor to decide.
    pub fn is_complete(&self) -> bool {
        !self.number.is_empty() && !self.cvc.is_empty() && (1..=12).contains(&self.exp_month) && self.exp_year > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
}

/// A processor-side token standing in for the card details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
}

impl PaymentMethod {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into() }
    }
}

//--------------------------------------     PaymentOutcome    ---------------------------------------------------------
/// The terminal result of a charge confirmation, as reported by the payment processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded { transaction_id: TransactionId },
    /// The processor wants a further challenge (e.g. 3-D Secure). Not supported; treated as a failure.
    RequiresAction { transaction_id: TransactionId },
    Failed { reason: String },
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}
