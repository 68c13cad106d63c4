use checkout_common::Secret;
use mockall::mock;

use crate::{
    purchase_types::{
        BillingDetails,
        CardDetails,
        CatalogItem,
        InventoryAdjustment,
        ItemId,
        NewOrder,
        OrderId,
        PaymentMethod,
        PaymentOutcome,
    },
    traits::{BackendError, PaymentProcessor, ProcessorError, PurchaseBackend},
};

mock! {
    pub Backend {}
    impl PurchaseBackend for Backend {
        async fn fetch_item(&self, item_id: &ItemId) -> Result<CatalogItem, BackendError>;
        async fn create_authorization(&self, item_id: &ItemId, quantity: u32) -> Result<Secret<String>, BackendError>;
        async fn create_order(&self, order: &NewOrder) -> Result<OrderId, BackendError>;
        async fn adjust_inventory(&self, adjustment: &InventoryAdjustment) -> Result<(), BackendError>;
    }
}

mock! {
    pub Processor {}
    impl PaymentProcessor for Processor {
        fn is_ready(&self) -> bool;
        async fn create_payment_method(&self, card: &CardDetails, billing: &BillingDetails) -> Result<PaymentMethod, ProcessorError>;
        async fn confirm_card_payment(&self, client_secret: &Secret<String>, payment_method: &PaymentMethod) -> Result<PaymentOutcome, ProcessorError>;
    }
}
