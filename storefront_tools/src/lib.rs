//! HTTP implementations of the checkout engine's collaborator traits.
//!
//! * [`StorefrontApi`] talks JSON to the storefront backend and implements
//!   [`PurchaseBackend`](checkout_engine::PurchaseBackend).
//! * [`CardProcessorApi`] talks to the card processor's public API with the publishable key and implements
//!   [`PaymentProcessor`](checkout_engine::PaymentProcessor).
mod backend_api;
mod config;
mod error;
mod processor_api;

pub mod data_objects;
pub mod helpers;

pub use backend_api::StorefrontApi;
pub use config::{BackendConfig, ProcessorConfig};
pub use error::StorefrontApiError;
pub use processor_api::CardProcessorApi;
