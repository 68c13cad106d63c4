//! # Checkout API
//!
//! The pieces of a checkout, from the smallest to the coordinator that drives them:
//!
//! * [`quantity_pricer`] clamps a requested quantity to what is in stock and prices it. Pure and synchronous.
//! * [`authorization_api`] obtains payment authorizations and decides which responses are still wanted.
//! * [`payment_confirmer`] hands the card to the payment processor and confirms the charge.
//! * [`order_committer`] records the order and decrements the stock once money has been captured.
//! * [`purchase_coordinator`] is the state machine that sequences all of the above for one checkout.
pub mod authorization_api;
pub mod checkout_objects;
pub mod errors;
pub mod order_committer;
pub mod payment_confirmer;
pub mod purchase_coordinator;
pub mod quantity_pricer;
