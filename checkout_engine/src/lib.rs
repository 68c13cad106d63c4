//! Checkout Engine
//!
//! The checkout engine coordinates the purchase of a catalog item with a card payment: pricing the requested quantity,
//! obtaining a payment authorization from the backend, confirming the charge with the card processor, and recording the
//! order and stock adjustment afterwards. It is provider-agnostic.
//!
//! The library is divided into three main sections:
//! 1. The collaborator contracts ([`mod@traits`]). The backend, the payment processor and the identity provider are
//!    expressed as traits, so the engine never reaches for a global client. HTTP implementations live in the
//!    `storefront_tools` crate.
//! 2. The checkout API ([`mod@checkout_api`]). [`PurchaseCoordinator`] is the entry point. It owns the state of a
//!    single checkout and delegates to the smaller components in that module.
//! 3. Outcome events ([`mod@events`]). The coordinator does not notify the buyer or navigate anywhere itself. It
//!    publishes typed events, and front ends subscribe to them with [`events::EventHooks`].
//!
//! A successful charge followed by a failed order write is the one outcome that must never be mistaken for either
//! success or an ordinary payment failure. It is reported as [`CheckoutError::OrderWriteError`] and published with
//! [`FailureKind::ChargedNotRecorded`].
pub mod checkout_api;
pub mod events;
pub mod purchase_types;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use checkout_api::{
    authorization_api::{AuthorizationRequester, AuthorizationTicket},
    checkout_objects,
    errors::{CheckoutError, FailureKind, ValidationError},
    order_committer::OrderCommitter,
    payment_confirmer::PaymentConfirmer,
    purchase_coordinator::PurchaseCoordinator,
    quantity_pricer::{parse_requested_quantity, QuantityPricer},
};
pub use traits::{BackendError, IdentityError, IdentityProvider, PaymentProcessor, ProcessorError, PurchaseBackend};
