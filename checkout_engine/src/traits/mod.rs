//! # Collaborator contracts
//!
//! The checkout coordinator talks to three external parties. Each one is expressed as a trait so that the coordinator
//! never reaches for a global client handle, and can be exercised in tests with doubles.
//!
//! * [`PurchaseBackend`] is the persistence service: it issues payment authorizations, records orders and adjusts the
//!   stock count of catalog items.
//! * [`PaymentProcessor`] is the client side of the card processor: it tokenises card details and confirms charges
//!   against an authorization secret.
//! * [`IdentityProvider`] supplies the signed-in buyer and a sign-out action.
mod identity_provider;
mod payment_processor;
mod purchase_backend;

pub use identity_provider::{IdentityError, IdentityProvider};
pub use payment_processor::{PaymentProcessor, ProcessorError};
pub use purchase_backend::{BackendError, PurchaseBackend};
