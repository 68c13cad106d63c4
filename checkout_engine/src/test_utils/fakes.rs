//! In-memory collaborators for exercising a checkout end to end without a network.
//!
//! The fakes keep a record of every call they receive and can be told to fail, or to hold a call until the test
//! releases it with [`Notify::notify_one`].
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
        Mutex,
    },
};

use checkout_common::Secret;
use log::*;
use tokio::sync::Notify;

use crate::{
    purchase_types::{
        BillingDetails,
        Buyer,
        CardDetails,
        CatalogItem,
        InventoryAdjustment,
        ItemId,
        NewOrder,
        OrderId,
        PaymentMethod,
        PaymentOutcome,
    },
    traits::{BackendError, IdentityError, IdentityProvider, PaymentProcessor, ProcessorError, PurchaseBackend},
};

//--------------------------------------      FakeBackend      ---------------------------------------------------------
#[derive(Debug, Default)]
pub struct FakeBackend {
    items: Mutex<HashMap<ItemId, CatalogItem>>,
    authorization_requests: Mutex<Vec<(ItemId, u32)>>,
    orders: Mutex<Vec<NewOrder>>,
    adjustments: Mutex<Vec<InventoryAdjustment>>,
    authorization_gates: Mutex<HashMap<u32, Arc<Notify>>>,
    order_gate: Mutex<Option<Arc<Notify>>>,
    fail_authorizations: AtomicBool,
    fail_orders: AtomicBool,
    fail_inventory: AtomicBool,
    counter: AtomicU64,
}

impl FakeBackend {
    pub fn with_item(item: CatalogItem) -> Self {
        let backend = Self::default();
        backend.add_item(item);
        backend
    }

    pub fn add_item(&self, item: CatalogItem) {
        self.items.lock().unwrap().insert(item.id.clone(), item);
    }

    pub fn stock_of(&self, item_id: &ItemId) -> Option<u32> {
        self.items.lock().unwrap().get(item_id).map(|i| i.available)
    }

    /// The next authorization request for `quantity` blocks until the returned handle is notified.
    pub fn hold_authorization(&self, quantity: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.authorization_gates.lock().unwrap().insert(quantity, Arc::clone(&gate));
        gate
    }

    /// The next order write blocks until the returned handle is notified.
    pub fn hold_orders(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.order_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail_authorizations(&self, fail: bool) {
        self.fail_authorizations.store(fail, Ordering::SeqCst);
    }

    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inventory_adjustments(&self, fail: bool) {
        self.fail_inventory.store(fail, Ordering::SeqCst);
    }

    pub fn authorization_requests(&self) -> Vec<(ItemId, u32)> {
        self.authorization_requests.lock().unwrap().clone()
    }

    pub fn orders(&self) -> Vec<NewOrder> {
        self.orders.lock().unwrap().clone()
    }

    pub fn adjustments(&self) -> Vec<InventoryAdjustment> {
        self.adjustments.lock().unwrap().clone()
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl PurchaseBackend for FakeBackend {
    async fn fetch_item(&self, item_id: &ItemId) -> Result<CatalogItem, BackendError> {
        self.items.lock().unwrap().get(item_id).cloned().ok_or_else(|| BackendError::ItemNotFound(item_id.clone()))
    }

    async fn create_authorization(&self, item_id: &ItemId, quantity: u32) -> Result<Secret<String>, BackendError> {
        self.authorization_requests.lock().unwrap().push((item_id.clone(), quantity));
        let gate = self.authorization_gates.lock().unwrap().remove(&quantity);
        if let Some(gate) = gate {
            trace!("🧪️ Holding authorization for {quantity} units");
            gate.notified().await;
        }
        if self.fail_authorizations.load(Ordering::SeqCst) {
            return Err(BackendError::Network("authorization service unavailable".to_string()));
        }
        let id = self.next_id();
        Ok(Secret::new(format!("pi_{id}_secret_q{quantity}")))
    }

    async fn create_order(&self, order: &NewOrder) -> Result<OrderId, BackendError> {
        let gate = self.order_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            trace!("🧪️ Holding order write for payment {}", order.transaction_id);
            gate.notified().await;
        }
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(BackendError::Network("connection reset while writing the order".to_string()));
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        Ok(OrderId(format!("order-{}", orders.len())))
    }

    async fn adjust_inventory(&self, adjustment: &InventoryAdjustment) -> Result<(), BackendError> {
        if self.fail_inventory.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected { status: 500, message: "stock update failed".to_string() });
        }
        let mut items = self.items.lock().unwrap();
        let item =
            items.get_mut(&adjustment.item_id).ok_or_else(|| BackendError::ItemNotFound(adjustment.item_id.clone()))?;
        let stock = i64::from(item.available) + adjustment.delta;
        item.available = u32::try_from(stock.max(0)).unwrap_or_default();
        self.adjustments.lock().unwrap().push(adjustment.clone());
        Ok(())
    }
}

//--------------------------------------     FakeProcessor     ---------------------------------------------------------
/// A card processor that approves everything unless told otherwise.
///
/// Scripted outcomes are consumed in order, one per confirmation. Once they run out, confirmations succeed with a
/// transaction id derived from the authorization secret.
#[derive(Debug, Default)]
pub struct FakeProcessor {
    ready: bool,
    reject_cards: AtomicBool,
    scripted: Mutex<VecDeque<Result<PaymentOutcome, ProcessorError>>>,
    confirmed_secrets: Mutex<Vec<String>>,
    payment_methods: AtomicU64,
}

impl FakeProcessor {
    pub fn ready() -> Self {
        Self { ready: true, ..Default::default() }
    }

    pub fn not_ready() -> Self {
        Self::default()
    }

    pub fn script_outcome(&self, outcome: Result<PaymentOutcome, ProcessorError>) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    pub fn reject_cards(&self, reject: bool) {
        self.reject_cards.store(reject, Ordering::SeqCst);
    }

    pub fn confirmed_secrets(&self) -> Vec<String> {
        self.confirmed_secrets.lock().unwrap().clone()
    }

    pub fn payment_methods_created(&self) -> u64 {
        self.payment_methods.load(Ordering::SeqCst)
    }
}

impl PaymentProcessor for FakeProcessor {
    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn create_payment_method(
        &self,
        _card: &CardDetails,
        _billing: &BillingDetails,
    ) -> Result<PaymentMethod, ProcessorError> {
        if self.reject_cards.load(Ordering::SeqCst) {
            return Err(ProcessorError::CardRejected("incorrect_number".to_string()));
        }
        let n = self.payment_methods.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentMethod::new(format!("pm_{n}")))
    }

    async fn confirm_card_payment(
        &self,
        client_secret: &Secret<String>,
        _payment_method: &PaymentMethod,
    ) -> Result<PaymentOutcome, ProcessorError> {
        self.confirmed_secrets.lock().unwrap().push(client_secret.reveal().clone());
        if let Some(outcome) = self.scripted.lock().unwrap().pop_front() {
            return outcome;
        }
        let intent = client_secret.reveal().split("_secret_").next().unwrap_or_default().to_string();
        Ok(PaymentOutcome::Succeeded { transaction_id: intent.into() })
    }
}

//--------------------------------------     StaticIdentity    ---------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    buyer: Option<Buyer>,
}

impl StaticIdentity {
    pub fn signed_in(buyer: Buyer) -> Self {
        Self { buyer: Some(buyer) }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_buyer(&self) -> Option<Buyer> {
        self.buyer.clone()
    }

    fn sign_out(&mut self) -> Result<(), IdentityError> {
        self.buyer.take().map(|_| ()).ok_or(IdentityError::NotSignedIn)
    }
}
