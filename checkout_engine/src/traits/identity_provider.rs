use thiserror::Error;

use crate::purchase_types::Buyer;

/// Supplies the identity of the signed-in buyer.
///
/// Data only flows one way: the checkout reads a snapshot of the buyer when it opens and never writes back.
pub trait IdentityProvider {
    /// The signed-in buyer, or `None` if nobody is signed in.
    fn current_buyer(&self) -> Option<Buyer>;

    /// Signs the current buyer out.
    fn sign_out(&mut self) -> Result<(), IdentityError>;
}

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("Nobody is signed in")]
    NotSignedIn,
    #[error("Could not persist the identity change. {0}")]
    Storage(String),
}
