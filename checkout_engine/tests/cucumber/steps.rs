use checkout_common::Cents;
use checkout_engine::{
    checkout_objects::AuthorizationUpdate,
    purchase_types::{CardDetails, PaymentOutcome, PurchaseStatus},
};
use cucumber::{given, then, when};

use crate::cucumber::CheckoutWorld;

fn card() -> CardDetails {
    CardDetails::new("4242424242424242", 12, 2030, "123")
}

#[given(expr = "item {word} priced at ${int} with {int} in stock")]
async fn list_item(world: &mut CheckoutWorld, id: String, price: i64, available: u32) {
    world.add_item(&id, price, available);
}

#[given(expr = "{word} is signed in")]
async fn sign_in(world: &mut CheckoutWorld, name: String) {
    world.sign_in(&name);
}

#[given("a checkout is open for the item")]
async fn open_checkout(world: &mut CheckoutWorld) {
    world.open_checkout().expect("Could not open checkout");
}

#[given("the order service is failing")]
async fn order_service_failing(world: &mut CheckoutWorld) {
    world.checkout().backend().fail_orders(true);
}

#[given("stock updates are failing")]
async fn stock_updates_failing(world: &mut CheckoutWorld) {
    world.checkout().backend().fail_inventory_adjustments(true);
}

#[given(expr = "the card will be declined with {string}")]
async fn card_declined(world: &mut CheckoutWorld, reason: String) {
    world.checkout().processor().script_outcome(Ok(PaymentOutcome::Failed { reason }));
}

#[when(expr = "I enter the quantity {string}")]
async fn enter_quantity(world: &mut CheckoutWorld, input: String) {
    let quote = world.checkout().update_quantity_input(&input).await.expect("Quantity change was rejected");
    world.last_quote = Some(quote);
}

#[when(expr = "I ship to {string}")]
async fn ship_to(world: &mut CheckoutWorld, address: String) {
    world.checkout().set_shipping_address(address).await.expect("Address change was rejected");
}

#[when("the payment is authorized")]
async fn authorize(world: &mut CheckoutWorld) {
    let update = world.checkout().authorize().await.expect("Authorization failed");
    assert!(matches!(update, AuthorizationUpdate::Ready(_)), "Authorization was superseded");
}

#[when("I pay with my card")]
async fn pay(world: &mut CheckoutWorld) {
    let result = world.checkout().submit(Some(card())).await;
    world.last_result = Some(result);
}

#[then(expr = "the quantity is {int}")]
async fn check_quantity(world: &mut CheckoutWorld, quantity: u32) {
    assert_eq!(world.checkout().snapshot().await.quantity, quantity);
}

#[then(expr = "the total is ${float}")]
async fn check_total(world: &mut CheckoutWorld, dollars: f64) {
    let expected = Cents::from_dollars_f64(dollars).expect("Not a valid amount");
    assert_eq!(world.checkout().snapshot().await.total_price, expected);
}

#[then(expr = "I am told {string}")]
async fn check_notice(world: &mut CheckoutWorld, message: String) {
    let notice = world.last_quote.as_ref().and_then(|q| q.notice).expect("No quantity notice was given");
    assert_eq!(notice.to_string(), message);
}

#[then("I am not told anything")]
async fn check_no_notice(world: &mut CheckoutWorld) {
    let notice = world.last_quote.as_ref().and_then(|q| q.notice);
    assert!(notice.is_none(), "Unexpected notice: {notice:?}");
}

#[then(expr = "the checkout is {word}")]
async fn check_status(world: &mut CheckoutWorld, status: String) {
    let expected = status.parse::<PurchaseStatus>().expect("Not a valid status");
    assert_eq!(world.checkout().status().await, expected);
}

#[then(expr = "the failure is {string}")]
async fn check_failure_kind(world: &mut CheckoutWorld, kind: String) {
    assert_eq!(world.last_error().kind().to_string(), kind);
}

#[then("the failure can be retried")]
async fn check_retryable(world: &mut CheckoutWorld) {
    assert!(world.last_error().is_retryable());
}

#[then("the failure cannot be retried")]
async fn check_not_retryable(world: &mut CheckoutWorld) {
    assert!(!world.last_error().is_retryable());
}

#[then("the failure names the payment transaction")]
async fn check_failure_txid(world: &mut CheckoutWorld) {
    let txid = world.last_error().transaction_id().cloned().expect("No transaction id on the failure");
    let partial = world.checkout().partial_commit().await.expect("No partial commit was recorded");
    assert_eq!(partial.transaction_id, txid);
}

#[then(expr = "{int} order(s) was/were recorded")]
async fn check_orders(world: &mut CheckoutWorld, count: usize) {
    assert_eq!(world.checkout().backend().orders().len(), count);
}

#[then(expr = "the recorded order is for {int} units totalling ${float}")]
async fn check_recorded_order(world: &mut CheckoutWorld, quantity: u32, dollars: f64) {
    let order = &world.last_purchase().order.order;
    assert_eq!(order.quantity, quantity);
    assert_eq!(order.total_price, Cents::from_dollars_f64(dollars).expect("Not a valid amount"));
}

#[then(expr = "{int} unit(s) of {word} remain(s) in stock")]
async fn check_stock(world: &mut CheckoutWorld, available: u32, id: String) {
    assert_eq!(world.checkout().backend().stock_of(&id.into()), Some(available));
}

#[then("no stock adjustment was attempted")]
async fn check_no_adjustment(world: &mut CheckoutWorld) {
    assert!(world.checkout().backend().adjustments().is_empty());
}

#[then("the purchase is flagged with an inventory discrepancy")]
async fn check_discrepancy(world: &mut CheckoutWorld) {
    assert!(!world.last_purchase().inventory_adjusted());
}

#[then(expr = "the shipping address is still {string}")]
async fn check_address(world: &mut CheckoutWorld, address: String) {
    assert_eq!(world.checkout().snapshot().await.shipping_address, address);
}

#[then("the card was never charged")]
async fn check_not_charged(world: &mut CheckoutWorld) {
    assert!(world.checkout().processor().confirmed_secrets().is_empty());
}
