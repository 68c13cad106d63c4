use log::*;

use crate::{
    checkout_api::errors::{CheckoutError, ValidationError},
    purchase_types::{BillingDetails, CardDetails, PaymentAuthorization, PaymentOutcome},
    traits::PaymentProcessor,
};

/// Drives the processor's client-side confirmation handshake.
///
/// The steps are strictly ordered:
/// 1. Card input must be present and the processor client ready. Otherwise the attempt fails with
///    [`CheckoutError::ClientNotReady`] without any network traffic.
/// 2. The card is tokenised into a payment method. A failure here ends the attempt with
///    [`CheckoutError::PaymentMethodError`].
/// 3. The charge is confirmed with the authorization secret and payment method. If the processor gives no usable
///    answer, the charge may have been captured: the attempt ends with [`CheckoutError::ChargeOutcomeUnknown`],
///    naming the payment the authorization belongs to.
pub struct PaymentConfirmer<'a, P> {
    processor: &'a P,
}

impl<'a, P> PaymentConfirmer<'a, P>
where P: PaymentProcessor
{
    pub fn new(processor: &'a P) -> Self {
        Self { processor }
    }

    pub async fn confirm(
        &self,
        authorization: &PaymentAuthorization,
        card: Option<&CardDetails>,
        billing: &BillingDetails,
    ) -> Result<PaymentOutcome, CheckoutError> {
        let card = match card {
            Some(card) if card.is_complete() => card,
            Some(_) => return Err(ValidationError::IncompleteCard.into()),
            None => return Err(CheckoutError::ClientNotReady("No card input was provided".to_string())),
        };
        if !self.processor.is_ready() {
            warn!("💳️ Payment processor client is not initialised. Refusing to confirm the payment.");
            return Err(CheckoutError::ClientNotReady("The payment processor client is not initialised".to_string()));
        }
        let payment_method = self.processor.create_payment_method(card, billing).await.map_err(|e| {
            warn!("💳️ Could not create a payment method. {e}");
            CheckoutError::PaymentMethodError(e.to_string())
        })?;
        debug!("💳️ Payment method {} created. Confirming charge.", payment_method.id);
        let outcome = self.processor.confirm_card_payment(&authorization.secret, &payment_method).await.map_err(|e| {
            warn!("💳️ Charge confirmation did not complete. {e}");
            match CheckoutError::from(e) {
                CheckoutError::ChargeOutcomeUnknown { reason, .. } => {
                    CheckoutError::ChargeOutcomeUnknown { transaction_id: authorization.intent_id(), reason }
                },
                e => e,
            }
        })?;
        match &outcome {
            PaymentOutcome::Succeeded { transaction_id } => info!("💳️ Payment {transaction_id} succeeded"),
            PaymentOutcome::RequiresAction { transaction_id } => {
                warn!("💳️ Payment {transaction_id} requires further action, which is not supported")
            },
            PaymentOutcome::Failed { reason } => info!("💳️ Payment failed: {reason}"),
        }
        Ok(outcome)
    }
}
