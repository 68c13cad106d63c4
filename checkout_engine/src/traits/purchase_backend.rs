use checkout_common::Secret;
use thiserror::Error;

use crate::purchase_types::{CatalogItem, InventoryAdjustment, ItemId, NewOrder, OrderId};

/// This trait defines the behaviour of the backend persistence service that a checkout depends on.
///
/// The three write operations are independent remote calls. There is no transaction spanning them, and implementations
/// must not pretend otherwise: the coordinator decides the ordering and what a partial failure means.
#[allow(async_fn_in_trait)]
pub trait PurchaseBackend {
    /// Fetches the current catalog entry for `item_id`.
    async fn fetch_item(&self, item_id: &ItemId) -> Result<CatalogItem, BackendError>;

    /// Asks the backend to create a payment authorization for `quantity` units of `item_id`. The backend prices the
    /// order itself and returns the processor's client secret for that amount.
    async fn create_authorization(&self, item_id: &ItemId, quantity: u32) -> Result<Secret<String>, BackendError>;

    /// Persists an order for a charge that has already been captured. Returns the id the backend assigned.
    async fn create_order(&self, order: &NewOrder) -> Result<OrderId, BackendError>;

    /// Applies a stock adjustment to a catalog item. Only success or failure is meaningful.
    async fn adjust_inventory(&self, adjustment: &InventoryAdjustment) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Could not reach the backend. {0}")]
    Network(String),
    #[error("The backend rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The backend sent a response that could not be understood. {0}")]
    InvalidResponse(String),
    #[error("The requested item {0} does not exist")]
    ItemNotFound(ItemId),
}
