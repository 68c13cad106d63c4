use std::sync::atomic::{AtomicU64, Ordering};

use log::*;

use crate::{
    checkout_api::errors::CheckoutError,
    purchase_types::{ItemId, PaymentAuthorization},
    traits::PurchaseBackend,
};

/// Identifies one authorization request. Tickets are issued in strictly increasing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationTicket {
    pub request_id: u64,
    pub item_id: ItemId,
    pub quantity: u32,
}

/// Obtains payment authorizations from the backend and decides which responses are still wanted.
///
/// Responses can arrive in any order. Only the response to the most recently issued ticket is current; everything else
/// is stale, no matter when it completes. Changing the quantity calls [`Self::invalidate`], which makes every
/// outstanding ticket stale.
#[derive(Debug, Default)]
pub struct AuthorizationRequester {
    latest: AtomicU64,
}

impl AuthorizationRequester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new ticket for `(item_id, quantity)`, superseding all earlier ones.
    pub fn issue_ticket(&self, item_id: ItemId, quantity: u32) -> AuthorizationTicket {
        let request_id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("🔑️ Issued authorization ticket #{request_id} for {quantity} x {item_id}");
        AuthorizationTicket { request_id, item_id, quantity }
    }

    /// Marks every outstanding ticket as stale without issuing a new one.
    pub fn invalidate(&self) {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("🔑️ Outstanding authorization requests invalidated (generation #{id})");
    }

    pub fn is_current(&self, ticket: &AuthorizationTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.request_id
    }

    /// Asks `backend` for an authorization matching `ticket`.
    ///
    /// This does not check whether the ticket is still current; the caller does that once the response is in.
    pub async fn request_authorization<B: PurchaseBackend>(
        &self,
        backend: &B,
        ticket: &AuthorizationTicket,
    ) -> Result<PaymentAuthorization, CheckoutError> {
        let AuthorizationTicket { request_id, item_id, quantity } = ticket;
        debug!("🔑️ Requesting payment authorization #{request_id} for {quantity} x {item_id}");
        match backend.create_authorization(&ticket.item_id, ticket.quantity).await {
            Ok(secret) if secret.is_empty() => {
                warn!("🔑️ Backend returned an empty authorization secret for request #{}", ticket.request_id);
                Err(CheckoutError::AuthorizationError("The backend returned an empty authorization".to_string()))
            },
            Ok(secret) => {
                debug!("🔑️ Authorization #{} received", ticket.request_id);
                Ok(PaymentAuthorization::new(secret, ticket.item_id.clone(), ticket.quantity))
            },
            Err(e) => {
                warn!("🔑️ Authorization request #{} failed. {e}", ticket.request_id);
                Err(CheckoutError::AuthorizationError(e.to_string()))
            },
        }
    }
}
