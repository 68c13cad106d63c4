use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use checkout_common::{helpers::intent_id_from_secret, Secret};
use checkout_engine::{
    purchase_types::{BillingDetails, CardDetails, PaymentMethod, PaymentOutcome, TransactionId},
    PaymentProcessor,
    ProcessorError,
};
use log::*;
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
    config::{join_url, ProcessorConfig},
    data_objects::{ProcessorErrorBody, ProcessorErrorEnvelope, ProcessorPaymentIntent, ProcessorPaymentMethod},
    StorefrontApiError,
};

/// Error codes meaning the payment intent behind a client secret can no longer be confirmed.
const EXPIRED_AUTHORIZATION_CODES: [&str; 2] = ["payment_intent_unexpected_state", "resource_missing"];

/// The card processor's client-side API, authenticated with the publishable key only.
///
/// Card details are sent straight to the processor and never touch the storefront backend.
///
/// The client remembers every payment intent whose confirmation got no usable answer. Such an intent may have been
/// charged, so a later "unexpected state" error for it is not reported as an expired authorization.
#[derive(Clone)]
pub struct CardProcessorApi {
    config: ProcessorConfig,
    client: Arc<Client>,
    unresolved_intents: Arc<Mutex<HashSet<String>>>,
}

enum FormError {
    Processor { status: StatusCode, body: ProcessorErrorBody },
    Api(StorefrontApiError),
}

impl From<StorefrontApiError> for FormError {
    fn from(e: StorefrontApiError) -> Self {
        Self::Api(e)
    }
}

impl CardProcessorApi {
    pub fn new(config: ProcessorConfig) -> Result<Self, StorefrontApiError> {
        join_url(&config.api_url, "").map_err(|e| StorefrontApiError::Initialization(e.to_string()))?;
        let client = Client::builder().build().map_err(|e| StorefrontApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), unresolved_intents: Arc::default() })
    }

    fn set_unresolved(&self, intent: &str, unresolved: bool) {
        let mut intents = self.unresolved_intents.lock().unwrap_or_else(|e| e.into_inner());
        if unresolved {
            intents.insert(intent.to_string());
        } else {
            intents.remove(intent);
        }
    }

    fn is_unresolved(&self, intent: &str) -> bool {
        self.unresolved_intents.lock().unwrap_or_else(|e| e.into_inner()).contains(intent)
    }

    async fn form_query<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T, FormError> {
        let url =
            join_url(&self.config.api_url, path).map_err(|e| StorefrontApiError::RestRequestError(e.to_string()))?;
        trace!("💳️ Sending form request to {url}");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.publishable_key.reveal()))
            .form(form)
            .send()
            .await
            .map_err(|e| StorefrontApiError::RestResponseError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| StorefrontApiError::JsonError(e.to_string()).into());
        }
        let text = response.text().await.map_err(|e| StorefrontApiError::RestResponseError(e.to_string()))?;
        match serde_json::from_str::<ProcessorErrorEnvelope>(&text) {
            Ok(envelope) => Err(FormError::Processor { status, body: envelope.error }),
            Err(_) => Err(StorefrontApiError::QueryError { status: status.as_u16(), message: text }.into()),
        }
    }
}

impl PaymentProcessor for CardProcessorApi {
    fn is_ready(&self) -> bool {
        !self.config.publishable_key.is_empty()
    }

    async fn create_payment_method(
        &self,
        card: &CardDetails,
        billing: &BillingDetails,
    ) -> Result<PaymentMethod, ProcessorError> {
        let form = [
            ("type", "card".to_string()),
            ("card[number]", card.number.reveal().clone()),
            ("card[exp_month]", card.exp_month.to_string()),
            ("card[exp_year]", card.exp_year.to_string()),
            ("card[cvc]", card.cvc.reveal().clone()),
            ("billing_details[name]", billing.name.clone()),
            ("billing_details[email]", billing.email.clone()),
        ];
        match self.form_query::<ProcessorPaymentMethod>("/v1/payment_methods", &form).await {
            Ok(pm) => {
                debug!("💳️ Created payment method {}", pm.id);
                Ok(PaymentMethod::new(pm.id))
            },
            Err(FormError::Processor { status, body }) if is_card_failure(status, &body) => {
                Err(ProcessorError::CardRejected(body.reason()))
            },
            Err(FormError::Processor { status, body }) => {
                Err(ProcessorError::InvalidResponse(format!("Error {status}. {}", body.reason())))
            },
            Err(FormError::Api(e)) => Err(e.into()),
        }
    }

    async fn confirm_card_payment(
        &self,
        client_secret: &Secret<String>,
        payment_method: &PaymentMethod,
    ) -> Result<PaymentOutcome, ProcessorError> {
        let intent = intent_id_from_secret(client_secret.reveal()).ok_or_else(|| {
            ProcessorError::AuthorizationExpired("The authorization secret is not in a recognised format".to_string())
        })?;
        let path = format!("/v1/payment_intents/{intent}/confirm");
        let form = [("client_secret", client_secret.reveal().clone()), ("payment_method", payment_method.id.clone())];
        match self.form_query::<ProcessorPaymentIntent>(&path, &form).await {
            Ok(pi) => {
                self.set_unresolved(intent, false);
                Ok(outcome_for(pi))
            },
            Err(FormError::Processor { body, .. })
                if body.code.as_deref().is_some_and(|c| EXPIRED_AUTHORIZATION_CODES.contains(&c)) =>
            {
                if self.is_unresolved(intent) {
                    warn!("💳️ Payment {intent} can no longer be confirmed after an unanswered confirmation");
                    return Err(ProcessorError::InvalidResponse(format!(
                        "Payment {intent} is in an unexpected state after an unanswered confirmation. {}",
                        body.reason()
                    )));
                }
                Err(ProcessorError::AuthorizationExpired(body.reason()))
            },
            Err(FormError::Processor { status, body }) if is_card_failure(status, &body) => {
                self.set_unresolved(intent, false);
                Ok(PaymentOutcome::Failed { reason: body.reason() })
            },
            Err(FormError::Processor { status, body }) => {
                self.set_unresolved(intent, true);
                Err(ProcessorError::InvalidResponse(format!("Error {status}. {}", body.reason())))
            },
            Err(FormError::Api(e)) => {
                self.set_unresolved(intent, true);
                Err(e.into())
            },
        }
    }
}

fn is_card_failure(status: StatusCode, body: &ProcessorErrorBody) -> bool {
    body.is_card_error() || status == StatusCode::PAYMENT_REQUIRED
}

fn outcome_for(intent: ProcessorPaymentIntent) -> PaymentOutcome {
    let transaction_id = TransactionId::from(intent.id);
    match intent.status.as_str() {
        "succeeded" => PaymentOutcome::Succeeded { transaction_id },
        "requires_action" => PaymentOutcome::RequiresAction { transaction_id },
        status => {
            let reason = intent.last_payment_error.map(|e| e.reason()).unwrap_or_else(|| status.to_string());
            PaymentOutcome::Failed { reason }
        },
    }
}
