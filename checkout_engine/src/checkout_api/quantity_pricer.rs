use checkout_common::Cents;
use log::*;

use crate::{
    checkout_api::{
        checkout_objects::{PriceQuote, QuantityNotice},
        errors::ValidationError,
    },
    purchase_types::CatalogItem,
};

/// Maps a requested quantity onto a quantity the buyer may actually purchase, and the price for it.
///
/// The pricer works from a snapshot of the available stock taken when the checkout opened. It has no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityPricer {
    unit_price: Cents,
    available: u32,
}

impl QuantityPricer {
    pub fn new(unit_price: Cents, available: u32) -> Self {
        Self { unit_price, available }
    }

    /// A pricer for `item`. Items with no stock cannot be priced, and neither can items whose price for the whole
    /// stock is negative or does not fit in [`Cents`].
    pub fn for_item(item: &CatalogItem) -> Result<Self, ValidationError> {
        if item.available == 0 {
            return Err(ValidationError::OutOfStock(item.id.clone()));
        }
        let max_total = item.unit_price.checked_mul(i64::from(item.available));
        if item.unit_price < Cents::default() || max_total.is_none() {
            let (id, price, available) = (&item.id, item.unit_price, item.available);
            warn!("🛒️ Item {id} has an unchargeable price of {price} for {available} units");
            return Err(ValidationError::UnchargeablePrice(item.id.clone()));
        }
        Ok(Self::new(item.unit_price, item.available))
    }

    pub fn unit_price(&self) -> Cents {
        self.unit_price
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    /// Clamps `requested` to `[1, available]` and prices the result.
    ///
    /// `None` stands for input that was not a number, and is treated like any other quantity below the minimum.
    pub fn compute_quantity(&self, requested: Option<i64>) -> PriceQuote {
        let max = self.available.max(1);
        let (quantity, notice) = match requested {
            Some(n) if n > i64::from(max) => (max, Some(QuantityNotice::ExceedsStock { available: max })),
            Some(n) if n >= 1 => (u32::try_from(n).unwrap_or(max), None),
            _ => (1, Some(QuantityNotice::BelowMinimum)),
        };
        if let Some(notice) = notice {
            debug!("🛒️ Requested quantity {requested:?} adjusted to {quantity}. {notice}");
        }
        PriceQuote { quantity, total_price: self.unit_price * quantity, notice }
    }
}

/// Interprets free-form quantity input. Anything that is not an integer yields `None`.
pub fn parse_requested_quantity(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok()
}
