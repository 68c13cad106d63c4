use log::*;

use crate::{
    checkout_api::{
        checkout_objects::{CompletedPurchase, InventoryStatus},
        errors::CheckoutError,
    },
    purchase_types::{InventoryAdjustment, NewOrder, OrderRecord, PurchaseRequest, TransactionId},
    traits::PurchaseBackend,
};

/// Records a charged purchase with the backend.
///
/// Committing is two independent writes with no atomicity between them:
/// 1. The order is written. This is the record that a charge took place, so a failure here is reported as
///    [`CheckoutError::OrderWriteError`] and the inventory is left alone.
/// 2. The stock count is decremented. A failure here does not void the purchase; it is reported as an
///    [`InventoryStatus::Discrepancy`] for out-of-band correction.
pub struct OrderCommitter<'a, B> {
    backend: &'a B,
}

impl<'a, B> OrderCommitter<'a, B>
where B: PurchaseBackend
{
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    pub async fn commit(
        &self,
        request: &PurchaseRequest,
        transaction_id: TransactionId,
    ) -> Result<CompletedPurchase, CheckoutError> {
        let order = self.record_order(request, transaction_id).await?;
        let adjustment = InventoryAdjustment::decrease(order.order.item_id.clone(), order.order.quantity);
        let inventory = self.adjust_inventory(&adjustment).await;
        Ok(CompletedPurchase { order, inventory })
    }

    /// Writes the order for a captured charge.
    pub async fn record_order(
        &self,
        request: &PurchaseRequest,
        transaction_id: TransactionId,
    ) -> Result<OrderRecord, CheckoutError> {
        let order = NewOrder::from_request(request, transaction_id);
        debug!("📦️ Recording order for payment {} ({} x {})", order.transaction_id, order.quantity, order.item_id);
        match self.backend.create_order(&order).await {
            Ok(order_id) => {
                info!("📦️ Order {order_id} recorded for payment {}", order.transaction_id);
                Ok(OrderRecord { order_id, order })
            },
            Err(e) => {
                error!(
                    "📦️ RECONCILIATION NEEDED. Payment {} for {} x {} (total {}) by {} was captured, but the order \
                     could not be recorded. {e}",
                    order.transaction_id, order.quantity, order.item_id, order.total_price, order.buyer.email
                );
                Err(CheckoutError::OrderWriteError { transaction_id: order.transaction_id, reason: e.to_string() })
            },
        }
    }

    /// Applies the stock adjustment. Never fails; problems are reported in the returned status.
    pub async fn adjust_inventory(&self, adjustment: &InventoryAdjustment) -> InventoryStatus {
        match self.backend.adjust_inventory(adjustment).await {
            Ok(()) => {
                debug!("📦️ Stock for {} adjusted by {}", adjustment.item_id, adjustment.delta);
                InventoryStatus::Adjusted
            },
            Err(e) => {
                warn!(
                    "📦️ Stock for {} could not be adjusted by {}. The order stands; the stock count must be \
                     corrected manually. {e}",
                    adjustment.item_id, adjustment.delta
                );
                InventoryStatus::Discrepancy { reason: e.to_string() }
            },
        }
    }
}
