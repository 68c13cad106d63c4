use checkout_common::Cents;

use crate::StorefrontApiError;

/// The largest unit price the storefront accepts, in dollars.
pub const MAX_PRICE_DOLLARS: f64 = 1_000_000_000.0;

/// The backend stores prices as floating point dollar amounts.
pub fn parse_dollar_price(price: f64) -> Result<Cents, StorefrontApiError> {
    if price < 0.0 {
        return Err(StorefrontApiError::InvalidCurrencyAmount(format!("Negative price: {price}")));
    }
    if price > MAX_PRICE_DOLLARS {
        return Err(StorefrontApiError::InvalidCurrencyAmount(format!("Price {price} exceeds {MAX_PRICE_DOLLARS}")));
    }
    Cents::from_dollars_f64(price).map_err(|e| StorefrontApiError::InvalidCurrencyAmount(e.to_string()))
}
