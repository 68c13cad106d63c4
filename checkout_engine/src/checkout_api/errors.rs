use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    purchase_types::{ItemId, PurchaseStatus, TransactionId},
    traits::ProcessorError,
};

/// Problems with the buyer's input. These are always caught before anything is sent over the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A shipping address is required")]
    MissingShippingAddress,
    #[error("Card details are incomplete")]
    IncompleteCard,
    #[error("Item {0} is out of stock")]
    OutOfStock(ItemId),
    #[error("Item {0} has a price that cannot be charged")]
    UnchargeablePrice(ItemId),
    #[error("Nobody is signed in")]
    MissingBuyer,
    #[error("No payment authorization is held for the current quantity ({quantity})")]
    NoAuthorization { quantity: u32 },
    #[error("The payment authorization was issued for {issued_for} units, but the order is for {current}")]
    StaleAuthorization { issued_for: u32, current: u32 },
}

/// The coarse classification of a checkout failure, used by subscribers that decide what to show the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Validation,
    Authorization,
    ClientNotReady,
    PaymentMethod,
    ChargeFailed,
    /// Money was captured, but no order was recorded. Needs manual reconciliation.
    ChargedNotRecorded,
    /// The processor never said whether the charge went through. Needs manual reconciliation.
    OutcomeUnknown,
    InvalidState,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::ClientNotReady => "client not ready",
            Self::PaymentMethod => "payment method",
            Self::ChargeFailed => "charge failed",
            Self::ChargedNotRecorded => "charged but not recorded",
            Self::OutcomeUnknown => "charge outcome unknown",
            Self::InvalidState => "invalid state",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Could not obtain a payment authorization. {0}")]
    AuthorizationError(String),
    #[error("The payment authorization expired. A new one has been requested; please try again.")]
    AuthorizationExpired,
    #[error("The payment processor is not ready. {0}")]
    ClientNotReady(String),
    #[error("The card could not be used. {0}")]
    PaymentMethodError(String),
    #[error("The payment failed. {reason}")]
    ChargeFailed { reason: String },
    #[error(
        "Payment {transaction_id} succeeded, but the order could not be recorded. {reason}. Please contact support \
         with the transaction id so the order can be reconciled."
    )]
    OrderWriteError { transaction_id: TransactionId, reason: String },
    #[error(
        "The payment processor did not say whether payment {} went through. {reason}. Do not pay again; contact \
         support so the payment can be checked.",
        payment_reference(.transaction_id)
    )]
    ChargeOutcomeUnknown { transaction_id: Option<TransactionId>, reason: String },
    #[error("Payment {transaction_id} has already been captured for this checkout")]
    AlreadyCharged { transaction_id: TransactionId },
    #[error(
        "Payment {} for this checkout has an unknown outcome and must be checked first",
        payment_reference(.transaction_id)
    )]
    ChargeUnresolved { transaction_id: Option<TransactionId> },
    #[error("Cannot {action} while the checkout is {status}")]
    InvalidState { status: PurchaseStatus, action: &'static str },
    #[error("The checkout has been closed")]
    Closed,
}

impl CheckoutError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::AuthorizationError(_) | Self::AuthorizationExpired => FailureKind::Authorization,
            Self::ClientNotReady(_) => FailureKind::ClientNotReady,
            Self::PaymentMethodError(_) => FailureKind::PaymentMethod,
            Self::ChargeFailed { .. } => FailureKind::ChargeFailed,
            Self::OrderWriteError { .. } | Self::AlreadyCharged { .. } => FailureKind::ChargedNotRecorded,
            Self::ChargeOutcomeUnknown { .. } | Self::ChargeUnresolved { .. } => FailureKind::OutcomeUnknown,
            Self::InvalidState { .. } | Self::Closed => FailureKind::InvalidState,
        }
    }

    /// Whether the buyer can try again from the same checkout.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::OrderWriteError { .. }
                | Self::AlreadyCharged { .. }
                | Self::ChargeOutcomeUnknown { .. }
                | Self::ChargeUnresolved { .. }
                | Self::Closed
        )
    }

    /// Errors that refuse an operation the checkout's current state does not allow. Nothing was attempted.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::Closed | Self::AlreadyCharged { .. } | Self::ChargeUnresolved { .. }
        )
    }

    /// The processor transaction id, if money has or may have been captured.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match self {
            Self::OrderWriteError { transaction_id, .. } | Self::AlreadyCharged { transaction_id } => {
                Some(transaction_id)
            },
            Self::ChargeOutcomeUnknown { transaction_id, .. } | Self::ChargeUnresolved { transaction_id } => {
                transaction_id.as_ref()
            },
            _ => None,
        }
    }
}

fn payment_reference(transaction_id: &Option<TransactionId>) -> String {
    match transaction_id {
        Some(id) => id.to_string(),
        None => "(no reference)".to_string(),
    }
}

impl From<ProcessorError> for CheckoutError {
    fn from(e: ProcessorError) -> Self {
        match e {
            ProcessorError::NotInitialized(s) => Self::ClientNotReady(s),
            ProcessorError::CardRejected(s) => Self::PaymentMethodError(s),
            ProcessorError::AuthorizationExpired(_) => Self::AuthorizationExpired,
            // Without an answer, the charge may or may not have been captured
            ProcessorError::Network(s) | ProcessorError::InvalidResponse(s) => {
                Self::ChargeOutcomeUnknown { transaction_id: None, reason: s }
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn charged_not_recorded_is_distinct_from_charge_failed() {
        let write = CheckoutError::OrderWriteError { transaction_id: "pi_1".into(), reason: "timeout".into() };
        let charge = CheckoutError::ChargeFailed { reason: "insufficient_funds".into() };
        assert_eq!(write.kind(), FailureKind::ChargedNotRecorded);
        assert_eq!(charge.kind(), FailureKind::ChargeFailed);
        assert!(!write.is_retryable());
        assert!(charge.is_retryable());
        assert_eq!(write.transaction_id(), Some(&TransactionId::from("pi_1")));
        assert_eq!(charge.transaction_id(), None);
        assert!(write.to_string().contains("pi_1"));
    }

    #[test]
    fn processor_errors_map_onto_the_taxonomy() {
        let e: CheckoutError = ProcessorError::NotInitialized("no key".into()).into();
        assert_eq!(e.kind(), FailureKind::ClientNotReady);
        let e: CheckoutError = ProcessorError::CardRejected("incorrect_number".into()).into();
        assert_eq!(e.kind(), FailureKind::PaymentMethod);
        let e: CheckoutError = ProcessorError::AuthorizationExpired("canceled".into()).into();
        assert!(matches!(e, CheckoutError::AuthorizationExpired));
    }

    #[test]
    fn unanswered_confirmations_are_not_declines() {
        let e: CheckoutError = ProcessorError::Network("connection reset".into()).into();
        assert_eq!(e.kind(), FailureKind::OutcomeUnknown);
        assert!(!e.is_retryable());
        assert!(!e.is_refusal());
        let e: CheckoutError = ProcessorError::InvalidResponse("not json".into()).into();
        assert!(matches!(e, CheckoutError::ChargeOutcomeUnknown { transaction_id: None, .. }));
        let e = CheckoutError::ChargeOutcomeUnknown { transaction_id: Some("pi_4".into()), reason: "timeout".into() };
        assert_eq!(e.transaction_id(), Some(&TransactionId::from("pi_4")));
        assert!(e.to_string().contains("payment pi_4 went through"));
        let refused = CheckoutError::ChargeUnresolved { transaction_id: Some("pi_4".into()) };
        assert!(refused.is_refusal());
        assert_eq!(refused.kind(), FailureKind::OutcomeUnknown);
    }

    #[test]
    fn validation_errors_convert() {
        let e: CheckoutError = ValidationError::MissingShippingAddress.into();
        assert_eq!(e.kind(), FailureKind::Validation);
        assert_eq!(e.to_string(), "A shipping address is required");
    }
}
