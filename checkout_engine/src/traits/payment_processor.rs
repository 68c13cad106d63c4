use checkout_common::Secret;
use thiserror::Error;

use crate::purchase_types::{BillingDetails, CardDetails, PaymentMethod, PaymentOutcome};

/// The client side of the card payment processor.
///
/// An instance is handed to the coordinator explicitly. It holds the processor's publishable key; the per-purchase
/// authorization secret is passed in on every confirmation.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    /// Whether the client has been initialised (e.g. a publishable key is configured). The coordinator checks this
    /// before touching the network.
    fn is_ready(&self) -> bool;

    /// Tokenises the card and billing details into a processor payment method.
    async fn create_payment_method(
        &self,
        card: &CardDetails,
        billing: &BillingDetails,
    ) -> Result<PaymentMethod, ProcessorError>;

    /// Confirms the charge identified by `client_secret` using `payment_method`.
    ///
    /// A declined card is not an `Err`: it is reported as [`PaymentOutcome::Failed`]. `Err` is reserved for cases where
    /// no outcome could be determined, or where the authorization itself is no longer usable.
    async fn confirm_card_payment(
        &self,
        client_secret: &Secret<String>,
        payment_method: &PaymentMethod,
    ) -> Result<PaymentOutcome, ProcessorError>;
}

#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("The payment processor client is not initialised. {0}")]
    NotInitialized(String),
    #[error("The card was rejected. {0}")]
    CardRejected(String),
    #[error("The payment authorization has expired or can no longer be confirmed. {0}")]
    AuthorizationExpired(String),
    #[error("Could not reach the payment processor. {0}")]
    Network(String),
    #[error("The payment processor sent a response that could not be understood. {0}")]
    InvalidResponse(String),
}
