//! The checkout state machine.
//!
//! | From                                   | Operation                  | To                                         |
//! |----------------------------------------|----------------------------|--------------------------------------------|
//! | (none)                                 | `open`                     | `Pending`                                  |
//! | `Pending`, `AuthorizationReady`, `Failed` | `authorize`             | `AuthorizationRequested`                   |
//! | `AuthorizationRequested`               | authorization received     | `AuthorizationReady`                       |
//! | `AuthorizationRequested`               | authorization failed       | `Pending`                                  |
//! | any pre-charge state                   | quantity changed           | `Pending` (authorization dropped)          |
//! | `AuthorizationReady`, `Failed`         | `submit`                   | `Confirming`                               |
//! | `Confirming`                           | charge succeeded           | `Committing`                               |
//! | `Confirming`                           | charge not captured        | `Failed` (retryable)                       |
//! | `Confirming`                           | authorization expired      | `Pending`, then a fresh `authorize`        |
//! | `Confirming`                           | no answer from processor   | `Failed` (terminal, `unresolved_charge`)   |
//! | `Committing`                           | order recorded             | `Completed`                                |
//! | `Committing`                           | order write failed         | `Failed` (terminal, see `partial_commit`)  |
//!
//! The state lives behind an async mutex, but the lock is never held while a collaborator is being called. Every
//! operation takes the lock, decides, releases it, talks to the network, and then takes the lock again to apply the
//! result. Anything that may have changed in between (a newer quantity, a newer authorization request, the checkout
//! being closed) is re-checked at that point.
use log::*;
use tokio::sync::Mutex;

use crate::{
    checkout_api::{
        authorization_api::AuthorizationRequester,
        checkout_objects::{
            AuthorizationUpdate,
            CloseOutcome,
            CompletedPurchase,
            InventoryStatus,
            PartialCommit,
            PriceQuote,
            UnresolvedCharge,
        },
        errors::{CheckoutError, ValidationError},
        order_committer::OrderCommitter,
        payment_confirmer::PaymentConfirmer,
        quantity_pricer::{parse_requested_quantity, QuantityPricer},
    },
    events::{EventProducers, InventoryDiscrepancyEvent, PurchaseCompletedEvent, PurchaseFailedEvent},
    purchase_types::{
        CardDetails,
        CatalogItem,
        PaymentAuthorization,
        PaymentOutcome,
        PurchaseRequest,
        PurchaseStatus,
        TransactionId,
    },
    traits::{IdentityProvider, PaymentProcessor, PurchaseBackend},
};

#[derive(Debug)]
struct CheckoutState {
    request: PurchaseRequest,
    authorization: Option<PaymentAuthorization>,
    partial_commit: Option<PartialCommit>,
    unresolved_charge: Option<UnresolvedCharge>,
    closed: bool,
}

impl CheckoutState {
    fn status(&self) -> PurchaseStatus {
        self.request.status
    }

    fn set_status(&mut self, status: PurchaseStatus) {
        if self.request.status != status {
            trace!("🛒️ Checkout for {} moved from {} to {status}", self.request.item_id, self.request.status);
        }
        self.request.status = status;
    }

    /// Rejects operations on a checkout that was closed, or that has (or may have) captured money without recording
    /// it.
    fn ensure_open(&self) -> Result<(), CheckoutError> {
        if let Some(partial) = &self.partial_commit {
            return Err(CheckoutError::AlreadyCharged { transaction_id: partial.transaction_id.clone() });
        }
        if let Some(unresolved) = &self.unresolved_charge {
            return Err(CheckoutError::ChargeUnresolved { transaction_id: unresolved.transaction_id.clone() });
        }
        if self.closed {
            return Err(CheckoutError::Closed);
        }
        Ok(())
    }

    /// Rejects edits once a charge has been handed to the processor.
    fn ensure_editable(&self, action: &'static str) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        match self.status() {
            PurchaseStatus::Confirming | PurchaseStatus::Committing | PurchaseStatus::Completed => {
                Err(CheckoutError::InvalidState { status: self.status(), action })
            },
            _ => Ok(()),
        }
    }
}

/// Coordinates a single checkout of one catalog item by one buyer.
///
/// The coordinator owns its [`PurchaseRequest`]. Nothing outside can mutate it except through the operations below, and
/// all outcomes are reported twice: in the return value to the caller, and as an event to the subscribers registered
/// through [`EventProducers`].
pub struct PurchaseCoordinator<B, P> {
    backend: B,
    processor: P,
    producers: EventProducers,
    pricer: QuantityPricer,
    authorizer: AuthorizationRequester,
    state: Mutex<CheckoutState>,
}

impl<B, P> PurchaseCoordinator<B, P>
where
    B: PurchaseBackend,
    P: PaymentProcessor,
{
    /// Opens a checkout for a single unit of `item`, on behalf of whoever `identity` says is signed in.
    pub fn open<I: IdentityProvider>(
        backend: B,
        processor: P,
        identity: &I,
        item: &CatalogItem,
        producers: EventProducers,
    ) -> Result<Self, CheckoutError> {
        let buyer = identity.current_buyer().ok_or(ValidationError::MissingBuyer)?;
        let pricer = QuantityPricer::for_item(item)?;
        info!(
            "🛒️ {} opened a checkout for {} ({} in stock at {})",
            buyer.email, item.id, item.available, item.unit_price
        );
        let request = PurchaseRequest::new(buyer, item);
        let state = CheckoutState {
            request,
            authorization: None,
            partial_commit: None,
            unresolved_charge: None,
            closed: false,
        };
        Ok(Self {
            backend,
            processor,
            producers,
            pricer,
            authorizer: AuthorizationRequester::new(),
            state: Mutex::new(state),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub async fn status(&self) -> PurchaseStatus {
        self.state.lock().await.status()
    }

    /// A copy of the current purchase request.
    pub async fn snapshot(&self) -> PurchaseRequest {
        self.state.lock().await.request.clone()
    }

    /// The quantity the held authorization was issued for, if one is held.
    pub async fn authorization_quantity(&self) -> Option<u32> {
        self.state.lock().await.authorization.as_ref().map(|a| a.issued_for_quantity)
    }

    /// Set when a charge was captured but the order could not be recorded.
    pub async fn partial_commit(&self) -> Option<PartialCommit> {
        self.state.lock().await.partial_commit.clone()
    }

    /// Set when the processor never said whether the charge went through.
    pub async fn unresolved_charge(&self) -> Option<UnresolvedCharge> {
        self.state.lock().await.unresolved_charge.clone()
    }

    pub async fn update_quantity(&self, requested: i64) -> Result<PriceQuote, CheckoutError> {
        self.reprice(Some(requested)).await
    }

    /// Like [`Self::update_quantity`], for raw text input. Anything that is not an integer counts as below the minimum.
    pub async fn update_quantity_input(&self, input: &str) -> Result<PriceQuote, CheckoutError> {
        self.reprice(parse_requested_quantity(input)).await
    }

    async fn reprice(&self, requested: Option<i64>) -> Result<PriceQuote, CheckoutError> {
        let mut state = self.state.lock().await;
        state.ensure_editable("change the quantity")?;
        let quote = self.pricer.compute_quantity(requested);
        if quote.quantity != state.request.quantity {
            debug!(
                "🛒️ Quantity for {} changed from {} to {}. Any held authorization is void.",
                state.request.item_id, state.request.quantity, quote.quantity
            );
            self.authorizer.invalidate();
            state.authorization = None;
            state.set_status(PurchaseStatus::Pending);
        }
        state.request.quantity = quote.quantity;
        state.request.total_price = quote.total_price;
        Ok(quote)
    }

    pub async fn set_shipping_address<S: Into<String>>(&self, address: S) -> Result<(), CheckoutError> {
        let mut state = self.state.lock().await;
        state.ensure_editable("change the shipping address")?;
        state.request.shipping_address = address.into();
        Ok(())
    }

    /// Requests a payment authorization for the current item and quantity.
    ///
    /// If the quantity changes, or another authorization is requested, before the backend responds, the response is
    /// discarded and [`AuthorizationUpdate::Superseded`] is returned.
    pub async fn authorize(&self) -> Result<AuthorizationUpdate, CheckoutError> {
        let ticket = {
            let mut state = self.state.lock().await;
            state.ensure_editable("request a payment authorization")?;
            let ticket = self.authorizer.issue_ticket(state.request.item_id.clone(), state.request.quantity);
            state.set_status(PurchaseStatus::AuthorizationRequested);
            ticket
        };
        let result = self.authorizer.request_authorization(&self.backend, &ticket).await;
        let mut state = self.state.lock().await;
        if !self.authorizer.is_current(&ticket) || state.request.quantity != ticket.quantity {
            let (id, qty) = (ticket.request_id, ticket.quantity);
            debug!("🔑️ Authorization #{id} for {qty} units is stale. Discarding it.");
            return Ok(AuthorizationUpdate::Superseded);
        }
        match result {
            Ok(authorization) => {
                state.authorization = Some(authorization.clone());
                state.set_status(PurchaseStatus::AuthorizationReady);
                Ok(AuthorizationUpdate::Ready(authorization))
            },
            Err(e) => {
                state.authorization = None;
                state.set_status(PurchaseStatus::Pending);
                Err(e)
            },
        }
    }

    /// Charges the card and records the order.
    ///
    /// `card` is `None` when the card input has not been filled in. Validation failures leave the state untouched;
    /// anything that fails after the processor has been contacted leaves the checkout `Failed`.
    ///
    /// A failure event is published for every attempt that fails, but not when the checkout's state refuses the
    /// attempt outright (see [`CheckoutError::is_refusal`]).
    pub async fn submit(&self, card: Option<CardDetails>) -> Result<CompletedPurchase, CheckoutError> {
        let result = self.try_submit(card).await;
        match &result {
            Err(e) if e.is_refusal() => debug!("🛒️ Submission refused. {e}"),
            Err(e) => self.publish_failure(e).await,
            Ok(_) => {},
        }
        result
    }

    async fn try_submit(&self, card: Option<CardDetails>) -> Result<CompletedPurchase, CheckoutError> {
        let (authorization, request) = {
            let mut state = self.state.lock().await;
            state.ensure_editable("submit the payment")?;
            if !state.request.has_shipping_address() {
                return Err(ValidationError::MissingShippingAddress.into());
            }
            if card.as_ref().is_some_and(|c| !c.is_complete()) {
                return Err(ValidationError::IncompleteCard.into());
            }
            let quantity = state.request.quantity;
            let authorization = match &state.authorization {
                None => return Err(ValidationError::NoAuthorization { quantity }.into()),
                Some(a) if !a.is_valid_for(&state.request.item_id, quantity) => {
                    return Err(ValidationError::StaleAuthorization {
                        issued_for: a.issued_for_quantity,
                        current: quantity,
                    }
                    .into())
                },
                Some(a) => a.clone(),
            };
            if !matches!(state.status(), PurchaseStatus::AuthorizationReady | PurchaseStatus::Failed) {
                return Err(CheckoutError::InvalidState { status: state.status(), action: "submit the payment" });
            }
            state.set_status(PurchaseStatus::Confirming);
            (authorization, state.request.clone())
        };

        let billing = request.buyer.billing_details();
        let confirmer = PaymentConfirmer::new(&self.processor);
        let transaction_id = match confirmer.confirm(&authorization, card.as_ref(), &billing).await {
            Ok(PaymentOutcome::Succeeded { transaction_id }) => transaction_id,
            Ok(PaymentOutcome::RequiresAction { transaction_id }) => {
                let reason =
                    format!("Payment {transaction_id} requires additional authentication, which is not supported");
                return Err(self.charge_not_captured(CheckoutError::ChargeFailed { reason }).await);
            },
            Ok(PaymentOutcome::Failed { reason }) => {
                return Err(self.charge_not_captured(CheckoutError::ChargeFailed { reason }).await);
            },
            Err(CheckoutError::AuthorizationExpired) => {
                self.refresh_expired_authorization().await;
                return Err(CheckoutError::AuthorizationExpired);
            },
            Err(CheckoutError::ChargeOutcomeUnknown { transaction_id, reason }) => {
                return Err(self.charge_unresolved(transaction_id, reason).await);
            },
            Err(e) => return Err(self.charge_not_captured(e).await),
        };

        self.state.lock().await.set_status(PurchaseStatus::Committing);
        let committer = OrderCommitter::new(&self.backend);
        match committer.commit(&request, transaction_id).await {
            Ok(purchase) => {
                {
                    let mut state = self.state.lock().await;
                    state.authorization = None;
                    state.set_status(PurchaseStatus::Completed);
                }
                info!(
                    "🛒️ Purchase of {} x {} completed as order {}",
                    request.quantity, request.item_id, purchase.order.order_id
                );
                self.publish_success(&purchase).await;
                Ok(purchase)
            },
            Err(e) => {
                let mut state = self.state.lock().await;
                if let Some(transaction_id) = e.transaction_id() {
                    state.partial_commit =
                        Some(PartialCommit { transaction_id: transaction_id.clone(), reason: e.to_string() });
                }
                state.set_status(PurchaseStatus::Failed);
                Err(e)
            },
        }
    }

    /// Marks a confirmation attempt that captured no money as failed. The request is kept for another attempt.
    async fn charge_not_captured(&self, error: CheckoutError) -> CheckoutError {
        let mut state = self.state.lock().await;
        state.set_status(PurchaseStatus::Failed);
        debug!("🛒️ Checkout for {} failed without a charge. {error}", state.request.item_id);
        error
    }

    /// Parks the checkout after a confirmation with no usable answer. The authorization is kept out of reach so the
    /// same payment can never be confirmed twice, and a new one is never requested.
    async fn charge_unresolved(&self, transaction_id: Option<TransactionId>, reason: String) -> CheckoutError {
        let mut state = self.state.lock().await;
        let reference = transaction_id.as_ref().map_or_else(|| "(no reference)".to_string(), |t| t.to_string());
        error!(
            "🛒️ RECONCILIATION NEEDED. Payment {reference} for {} x {} (total {}) by {} has an unknown outcome. \
             {reason}",
            state.request.quantity, state.request.item_id, state.request.total_price, state.request.buyer.email
        );
        self.authorizer.invalidate();
        state.authorization = None;
        let unresolved = UnresolvedCharge { transaction_id: transaction_id.clone(), reason: reason.clone() };
        state.unresolved_charge = Some(unresolved);
        state.set_status(PurchaseStatus::Failed);
        CheckoutError::ChargeOutcomeUnknown { transaction_id, reason }
    }

    async fn refresh_expired_authorization(&self) {
        {
            let mut state = self.state.lock().await;
            state.authorization = None;
            state.set_status(PurchaseStatus::Pending);
        }
        info!("🔑️ The payment authorization expired. Requesting a new one.");
        match self.authorize().await {
            Ok(AuthorizationUpdate::Ready(_)) => debug!("🔑️ Replacement authorization is ready"),
            Ok(AuthorizationUpdate::Superseded) => debug!("🔑️ Replacement authorization was superseded"),
            Err(e) => warn!("🔑️ Could not replace the expired authorization. {e}"),
        }
    }

    /// Dismisses the checkout.
    ///
    /// Nothing is cancelled once the processor has been asked to charge the card. A charge in flight, and the order
    /// write that follows it, run to completion and their outcome is still published.
    pub async fn close(&self) -> CloseOutcome {
        let mut state = self.state.lock().await;
        let outcome = match state.status() {
            PurchaseStatus::Confirming | PurchaseStatus::Committing => CloseOutcome::Deferred,
            PurchaseStatus::Completed => CloseOutcome::Finished(PurchaseStatus::Completed),
            PurchaseStatus::Failed if state.partial_commit.is_some() || state.unresolved_charge.is_some() => {
                CloseOutcome::Finished(PurchaseStatus::Failed)
            },
            _ => CloseOutcome::Discarded,
        };
        if !state.closed {
            state.closed = true;
            self.authorizer.invalidate();
            if outcome == CloseOutcome::Discarded {
                state.authorization = None;
            }
            debug!("🛒️ Checkout for {} closed ({outcome:?})", state.request.item_id);
        }
        outcome
    }

    async fn publish_success(&self, purchase: &CompletedPurchase) {
        if let InventoryStatus::Discrepancy { reason } = &purchase.inventory {
            let event = InventoryDiscrepancyEvent {
                item_id: purchase.order.order.item_id.clone(),
                order_id: purchase.order.order_id.clone(),
                quantity: purchase.order.order.quantity,
                reason: reason.clone(),
            };
            self.producers.publish_inventory_discrepancy(event).await;
        }
        self.producers.publish_purchase_completed(PurchaseCompletedEvent::new(purchase.clone())).await;
    }

    async fn publish_failure(&self, error: &CheckoutError) {
        let item_id = self.state.lock().await.request.item_id.clone();
        let event = PurchaseFailedEvent {
            item_id,
            kind: error.kind(),
            detail: error.to_string(),
            retryable: error.is_retryable(),
            transaction_id: error.transaction_id().cloned(),
            failed_at: chrono::Utc::now(),
        };
        self.producers.publish_purchase_failed(event).await;
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex as StdMutex};

    use checkout_common::{Cents, Secret};

    use super::*;
    use crate::{
        checkout_api::errors::FailureKind,
        events::{EventHandlers, EventHooks},
        purchase_types::{Buyer, OrderId, PaymentMethod},
        test_utils::{
            fakes::{FakeBackend, FakeProcessor, StaticIdentity},
            mocks::{MockBackend, MockProcessor},
        },
        traits::{BackendError, ProcessorError},
    };

    fn item() -> CatalogItem {
        CatalogItem {
            id: "plant-1".into(),
            name: "Monstera".into(),
            category: "Indoor".into(),
            unit_price: Cents::from_dollars(12),
            available: 5,
            seller_email: "seller@example.com".into(),
        }
    }

    fn alice() -> StaticIdentity {
        StaticIdentity::signed_in(Buyer::new("Alice", "alice@example.com"))
    }

    fn card() -> CardDetails {
        CardDetails::new("4242424242424242", 12, 2030, "123")
    }

    fn fakes() -> PurchaseCoordinator<FakeBackend, FakeProcessor> {
        PurchaseCoordinator::open(
            FakeBackend::with_item(item()),
            FakeProcessor::ready(),
            &alice(),
            &item(),
            EventProducers::default(),
        )
        .unwrap()
    }

    #[test]
    fn cannot_open_without_a_buyer() {
        let err = PurchaseCoordinator::open(
            FakeBackend::default(),
            FakeProcessor::ready(),
            &StaticIdentity::signed_out(),
            &item(),
            EventProducers::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CheckoutError::Validation(ValidationError::MissingBuyer)));
    }

    #[test]
    fn cannot_open_for_sold_out_items() {
        let mut sold_out = item();
        sold_out.available = 0;
        let err = PurchaseCoordinator::open(
            FakeBackend::default(),
            FakeProcessor::ready(),
            &alice(),
            &sold_out,
            EventProducers::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CheckoutError::Validation(ValidationError::OutOfStock(_))));
    }

    #[test]
    fn cannot_open_for_unchargeable_prices() {
        let mut priceless = item();
        priceless.unit_price = Cents::from_dollars_f64(1e16).unwrap();
        priceless.available = 10;
        let err = PurchaseCoordinator::open(
            FakeBackend::default(),
            FakeProcessor::ready(),
            &alice(),
            &priceless,
            EventProducers::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CheckoutError::Validation(ValidationError::UnchargeablePrice(_))));
    }

    #[tokio::test]
    async fn opens_pending_with_one_unit() {
        let coordinator = fakes();
        assert_eq!(coordinator.status().await, PurchaseStatus::Pending);
        let req = coordinator.snapshot().await;
        assert_eq!(req.quantity, 1);
        assert_eq!(req.total_price, Cents::from_dollars(12));
        assert_eq!(req.buyer.email, "alice@example.com");
    }

    #[tokio::test]
    async fn quantity_change_invalidates_the_authorization() {
        let _ = env_logger::try_init();
        let coordinator = fakes();
        coordinator.update_quantity(2).await.unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        assert!(coordinator.authorize().await.unwrap().is_ready());
        assert_eq!(coordinator.authorization_quantity().await, Some(2));

        let quote = coordinator.update_quantity(3).await.unwrap();
        assert_eq!(quote.total_price, Cents::from_dollars(36));
        assert_eq!(coordinator.status().await, PurchaseStatus::Pending);
        assert_eq!(coordinator.authorization_quantity().await, None);

        let err = coordinator.submit(Some(card())).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation);
        assert!(coordinator.processor().confirmed_secrets().is_empty());
    }

    #[tokio::test]
    async fn unchanged_quantity_keeps_the_authorization() {
        let coordinator = fakes();
        coordinator.update_quantity(5).await.unwrap();
        coordinator.authorize().await.unwrap();
        // Clamped back to 5
        let quote = coordinator.update_quantity(9).await.unwrap();
        assert_eq!(quote.quantity, 5);
        assert_eq!(coordinator.status().await, PurchaseStatus::AuthorizationReady);
        assert_eq!(coordinator.authorization_quantity().await, Some(5));
    }

    #[tokio::test]
    async fn stale_authorization_response_is_superseded() {
        let _ = env_logger::try_init();
        let backend = FakeBackend::with_item(item());
        let gate = backend.hold_authorization(2);
        let coordinator =
            PurchaseCoordinator::open(backend, FakeProcessor::ready(), &alice(), &item(), EventProducers::default())
                .unwrap();
        coordinator.update_quantity(2).await.unwrap();

        let slow = coordinator.authorize();
        let fast = async {
            coordinator.update_quantity(3).await.unwrap();
            let result = coordinator.authorize().await;
            gate.notify_one();
            result
        };
        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap(), AuthorizationUpdate::Superseded);
        match fast.unwrap() {
            AuthorizationUpdate::Ready(auth) => assert_eq!(auth.issued_for_quantity, 3),
            other => panic!("Expected a ready authorization, got {other:?}"),
        }
        assert_eq!(coordinator.authorization_quantity().await, Some(3));
        assert_eq!(coordinator.status().await, PurchaseStatus::AuthorizationReady);
    }

    #[tokio::test]
    async fn failed_authorization_returns_to_pending() {
        let mut backend = MockBackend::new();
        backend.expect_create_authorization().returning(|_, _| Err(BackendError::Network("refused".into())));
        let coordinator =
            PurchaseCoordinator::open(backend, MockProcessor::new(), &alice(), &item(), EventProducers::default())
                .unwrap();
        let err = coordinator.authorize().await.unwrap_err();
        assert!(matches!(err, CheckoutError::AuthorizationError(_)));
        assert!(err.is_retryable());
        assert_eq!(coordinator.status().await, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn submit_requires_a_shipping_address() {
        let coordinator = fakes();
        coordinator.authorize().await.unwrap();
        coordinator.set_shipping_address("   ").await.unwrap();
        let err = coordinator.submit(Some(card())).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(ValidationError::MissingShippingAddress)));
        assert_eq!(coordinator.status().await, PurchaseStatus::AuthorizationReady);
    }

    #[tokio::test]
    async fn successful_purchase_records_order_and_stock() {
        let _ = env_logger::try_init();
        let completed = Arc::new(StdMutex::new(Vec::new()));
        let completed2 = Arc::clone(&completed);
        let mut hooks = EventHooks::default();
        hooks.on_purchase_completed(move |ev| {
            let completed = Arc::clone(&completed2);
            Box::pin(async move {
                completed.lock().unwrap().push(ev.purchase.order.order_id);
            })
        });
        let handlers = EventHandlers::new(4, hooks);
        let producers = handlers.producers();
        let tasks = handlers.start_handlers();

        let backend = FakeBackend::with_item(item());
        let coordinator =
            PurchaseCoordinator::open(backend, FakeProcessor::ready(), &alice(), &item(), producers).unwrap();
        coordinator.update_quantity(2).await.unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();
        let purchase = coordinator.submit(Some(card())).await.unwrap();
        assert!(purchase.inventory_adjusted());
        assert_eq!(purchase.order.order.total_price, Cents::from_dollars(24));
        assert_eq!(coordinator.status().await, PurchaseStatus::Completed);
        assert_eq!(coordinator.backend().orders().len(), 1);
        assert_eq!(coordinator.backend().stock_of(&"plant-1".into()), Some(3));
        assert_eq!(coordinator.close().await, CloseOutcome::Finished(PurchaseStatus::Completed));

        drop(coordinator);
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*completed.lock().unwrap(), vec![purchase.order.order_id]);
    }

    #[tokio::test]
    async fn declined_card_preserves_the_request() {
        let _ = env_logger::try_init();
        let mut processor = MockProcessor::new();
        processor.expect_is_ready().return_const(true);
        processor.expect_create_payment_method().returning(|_, _| Ok(PaymentMethod::new("pm_1")));
        processor
            .expect_confirm_card_payment()
            .times(1)
            .returning(|_, _| Ok(PaymentOutcome::Failed { reason: "insufficient_funds".into() }));
        let mut backend = MockBackend::new();
        backend.expect_create_authorization().returning(|_, _| Ok(Secret::new("pi_1_secret_a".to_string())));
        backend.expect_create_order().never();
        backend.expect_adjust_inventory().never();
        let coordinator =
            PurchaseCoordinator::open(backend, processor, &alice(), &item(), EventProducers::default()).unwrap();
        coordinator.update_quantity(2).await.unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();

        let err = coordinator.submit(Some(card())).await.unwrap_err();
        assert!(matches!(&err, CheckoutError::ChargeFailed { reason } if reason == "insufficient_funds"));
        assert!(err.is_retryable());
        assert_eq!(coordinator.status().await, PurchaseStatus::Failed);
        let req = coordinator.snapshot().await;
        assert_eq!(req.quantity, 2);
        assert_eq!(req.shipping_address, "1 Garden Lane");
        assert_eq!(coordinator.authorization_quantity().await, Some(2));
        assert!(coordinator.partial_commit().await.is_none());
    }

    #[tokio::test]
    async fn retry_after_a_decline_succeeds() {
        let backend = FakeBackend::with_item(item());
        let processor = FakeProcessor::ready();
        processor.script_outcome(Ok(PaymentOutcome::Failed { reason: "card_declined".into() }));
        let coordinator =
            PurchaseCoordinator::open(backend, processor, &alice(), &item(), EventProducers::default()).unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();
        assert!(coordinator.submit(Some(card())).await.is_err());
        assert_eq!(coordinator.status().await, PurchaseStatus::Failed);
        let purchase = coordinator.submit(Some(card())).await.unwrap();
        assert_eq!(purchase.order.order.quantity, 1);
        assert_eq!(coordinator.processor().confirmed_secrets().len(), 2);
    }

    #[tokio::test]
    async fn order_write_failure_is_charged_not_recorded() {
        let _ = env_logger::try_init();
        let failures = Arc::new(StdMutex::new(Vec::new()));
        let failures2 = Arc::clone(&failures);
        let mut hooks = EventHooks::default();
        hooks.on_purchase_failed(move |ev| {
            let failures = Arc::clone(&failures2);
            Box::pin(async move {
                failures.lock().unwrap().push(ev);
            })
        });
        let handlers = EventHandlers::new(4, hooks);
        let producers = handlers.producers();
        let tasks = handlers.start_handlers();

        let mut processor = MockProcessor::new();
        processor.expect_is_ready().return_const(true);
        processor.expect_create_payment_method().returning(|_, _| Ok(PaymentMethod::new("pm_1")));
        processor
            .expect_confirm_card_payment()
            .returning(|_, _| Ok(PaymentOutcome::Succeeded { transaction_id: "pi_9".into() }));
        let mut backend = MockBackend::new();
        backend.expect_create_authorization().returning(|_, _| Ok(Secret::new("pi_9_secret_a".to_string())));
        backend.expect_create_order().returning(|_| Err(BackendError::Network("connection reset".into())));
        backend.expect_adjust_inventory().never();
        let coordinator = PurchaseCoordinator::open(backend, processor, &alice(), &item(), producers).unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();

        let err = coordinator.submit(Some(card())).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ChargedNotRecorded);
        assert_eq!(coordinator.status().await, PurchaseStatus::Failed);
        let partial = coordinator.partial_commit().await.unwrap();
        assert_eq!(partial.transaction_id.as_str(), "pi_9");

        let again = coordinator.submit(Some(card())).await.unwrap_err();
        assert!(matches!(again, CheckoutError::AlreadyCharged { .. }));
        let again = coordinator.authorize().await.unwrap_err();
        assert!(matches!(again, CheckoutError::AlreadyCharged { .. }));
        assert_eq!(coordinator.close().await, CloseOutcome::Finished(PurchaseStatus::Failed));

        drop(coordinator);
        for task in tasks {
            task.await.unwrap();
        }
        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::ChargedNotRecorded);
        assert_eq!(failures[0].transaction_id.as_ref().map(|t| t.as_str()), Some("pi_9"));
        assert!(!failures[0].retryable);
    }

    #[tokio::test]
    async fn inventory_failure_still_completes() {
        let _ = env_logger::try_init();
        let discrepancies = Arc::new(StdMutex::new(Vec::new()));
        let discrepancies2 = Arc::clone(&discrepancies);
        let mut hooks = EventHooks::default();
        hooks.on_inventory_discrepancy(move |ev| {
            let discrepancies = Arc::clone(&discrepancies2);
            Box::pin(async move {
                discrepancies.lock().unwrap().push(ev.order_id);
            })
        });
        let handlers = EventHandlers::new(4, hooks);
        let producers = handlers.producers();
        let tasks = handlers.start_handlers();

        let backend = FakeBackend::with_item(item());
        backend.fail_inventory_adjustments(true);
        let coordinator =
            PurchaseCoordinator::open(backend, FakeProcessor::ready(), &alice(), &item(), producers).unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();
        let purchase = coordinator.submit(Some(card())).await.unwrap();
        assert!(matches!(purchase.inventory, InventoryStatus::Discrepancy { .. }));
        assert_eq!(coordinator.status().await, PurchaseStatus::Completed);
        assert_eq!(coordinator.backend().stock_of(&"plant-1".into()), Some(5));

        drop(coordinator);
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*discrepancies.lock().unwrap(), vec![purchase.order.order_id]);
    }

    #[tokio::test]
    async fn expired_authorization_is_replaced() {
        let _ = env_logger::try_init();
        let processor = FakeProcessor::ready();
        processor.script_outcome(Err(ProcessorError::AuthorizationExpired("payment_intent_unexpected_state".into())));
        let backend = FakeBackend::with_item(item());
        let coordinator =
            PurchaseCoordinator::open(backend, processor, &alice(), &item(), EventProducers::default()).unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();
        let err = coordinator.submit(Some(card())).await.unwrap_err();
        assert!(matches!(err, CheckoutError::AuthorizationExpired));
        assert_eq!(coordinator.status().await, PurchaseStatus::AuthorizationReady);
        assert_eq!(coordinator.backend().authorization_requests().len(), 2);
        assert!(coordinator.submit(Some(card())).await.is_ok());
    }

    #[tokio::test]
    async fn missing_card_fails_without_network() {
        let coordinator = fakes();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();
        let err = coordinator.submit(None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ClientNotReady(_)));
        assert!(coordinator.processor().payment_methods_created() == 0);
    }

    #[tokio::test]
    async fn incomplete_card_leaves_the_state_untouched() {
        let coordinator = fakes();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();
        let bad_month = CardDetails::new("4242424242424242", 13, 2030, "123");
        let err = coordinator.submit(Some(bad_month)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(ValidationError::IncompleteCard)));
        assert_eq!(coordinator.status().await, PurchaseStatus::AuthorizationReady);
        assert_eq!(coordinator.processor().payment_methods_created(), 0);
        assert!(coordinator.processor().confirmed_secrets().is_empty());
        assert!(coordinator.submit(Some(card())).await.is_ok());
    }

    #[tokio::test]
    async fn requires_action_is_a_failed_charge() {
        let _ = env_logger::try_init();
        let processor = FakeProcessor::ready();
        processor.script_outcome(Ok(PaymentOutcome::RequiresAction { transaction_id: "pi_1".into() }));
        let backend = FakeBackend::with_item(item());
        let coordinator =
            PurchaseCoordinator::open(backend, processor, &alice(), &item(), EventProducers::default()).unwrap();
        coordinator.update_quantity(2).await.unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();

        let err = coordinator.submit(Some(card())).await.unwrap_err();
        assert!(matches!(&err, CheckoutError::ChargeFailed { reason } if reason.contains("additional authentication")));
        assert!(err.is_retryable());
        assert_eq!(coordinator.status().await, PurchaseStatus::Failed);
        assert!(coordinator.backend().orders().is_empty());
        assert!(coordinator.backend().adjustments().is_empty());
        assert_eq!(coordinator.backend().stock_of(&"plant-1".into()), Some(5));
        let req = coordinator.snapshot().await;
        assert_eq!(req.quantity, 2);
        assert_eq!(req.shipping_address, "1 Garden Lane");
        assert_eq!(coordinator.authorization_quantity().await, Some(2));
        assert!(coordinator.partial_commit().await.is_none());
    }

    #[tokio::test]
    async fn unanswered_confirmation_is_never_retried() {
        let _ = env_logger::try_init();
        let failures = Arc::new(StdMutex::new(Vec::new()));
        let failures2 = Arc::clone(&failures);
        let mut hooks = EventHooks::default();
        hooks.on_purchase_failed(move |ev| {
            let failures = Arc::clone(&failures2);
            Box::pin(async move {
                failures.lock().unwrap().push(ev);
            })
        });
        let handlers = EventHandlers::new(4, hooks);
        let producers = handlers.producers();
        let tasks = handlers.start_handlers();

        let processor = FakeProcessor::ready();
        processor.script_outcome(Err(ProcessorError::Network("connection reset".into())));
        processor.script_outcome(Err(ProcessorError::AuthorizationExpired("payment_intent_unexpected_state".into())));
        let coordinator =
            PurchaseCoordinator::open(FakeBackend::with_item(item()), processor, &alice(), &item(), producers).unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();

        let err = coordinator.submit(Some(card())).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::OutcomeUnknown);
        assert!(!err.is_retryable());
        assert_eq!(err.transaction_id().map(|t| t.as_str()), Some("pi_1"));
        assert_eq!(coordinator.status().await, PurchaseStatus::Failed);
        let unresolved = coordinator.unresolved_charge().await.unwrap();
        assert_eq!(unresolved.transaction_id, Some("pi_1".into()));
        assert_eq!(coordinator.authorization_quantity().await, None);

        let again = coordinator.submit(Some(card())).await.unwrap_err();
        assert!(matches!(again, CheckoutError::ChargeUnresolved { .. }));
        let again = coordinator.authorize().await.unwrap_err();
        assert!(matches!(again, CheckoutError::ChargeUnresolved { .. }));
        assert!(matches!(coordinator.update_quantity(2).await, Err(CheckoutError::ChargeUnresolved { .. })));
        assert_eq!(coordinator.processor().confirmed_secrets(), vec!["pi_1_secret_q1".to_string()]);
        assert_eq!(coordinator.backend().authorization_requests().len(), 1);
        assert!(coordinator.backend().orders().is_empty());
        assert_eq!(coordinator.close().await, CloseOutcome::Finished(PurchaseStatus::Failed));

        drop(coordinator);
        for task in tasks {
            task.await.unwrap();
        }
        // Refused retries publish nothing
        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::OutcomeUnknown);
        assert_eq!(failures[0].transaction_id, Some("pi_1".into()));
        assert!(!failures[0].retryable);
    }

    #[tokio::test]
    async fn closing_before_the_charge_discards() {
        let coordinator = fakes();
        coordinator.authorize().await.unwrap();
        assert_eq!(coordinator.close().await, CloseOutcome::Discarded);
        assert!(matches!(coordinator.authorize().await, Err(CheckoutError::Closed)));
        assert!(matches!(coordinator.update_quantity(2).await, Err(CheckoutError::Closed)));
        assert!(matches!(coordinator.submit(Some(card())).await, Err(CheckoutError::Closed)));
    }

    #[tokio::test]
    async fn closing_while_committing_is_deferred() {
        let _ = env_logger::try_init();
        let backend = FakeBackend::with_item(item());
        let gate = backend.hold_orders();
        let coordinator =
            PurchaseCoordinator::open(backend, FakeProcessor::ready(), &alice(), &item(), EventProducers::default())
                .unwrap();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();

        let submit = coordinator.submit(Some(card()));
        let close = async {
            while coordinator.status().await != PurchaseStatus::Committing {
                tokio::task::yield_now().await;
            }
            let outcome = coordinator.close().await;
            gate.notify_one();
            outcome
        };
        let (submitted, closed) = tokio::join!(submit, close);
        assert_eq!(closed, CloseOutcome::Deferred);
        let purchase = submitted.unwrap();
        assert_eq!(purchase.order.order_id, OrderId::from("order-1"));
        assert_eq!(coordinator.status().await, PurchaseStatus::Completed);
    }

    #[tokio::test]
    async fn no_edits_after_completion() {
        let coordinator = fakes();
        coordinator.set_shipping_address("1 Garden Lane").await.unwrap();
        coordinator.authorize().await.unwrap();
        coordinator.submit(Some(card())).await.unwrap();
        let err = coordinator.update_quantity(2).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidState { status: PurchaseStatus::Completed, .. }));
        let err = coordinator.submit(Some(card())).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidState { .. }));
    }
}
