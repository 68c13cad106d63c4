use std::fmt::{Debug, Formatter};

use checkout_common::Cents;
use checkout_engine::{
    checkout_objects::{CompletedPurchase, PriceQuote},
    events::EventProducers,
    purchase_types::{Buyer, CatalogItem, PurchaseRequest},
    test_utils::fakes::{FakeBackend, FakeProcessor, StaticIdentity},
    CheckoutError,
    PurchaseCoordinator,
};
use cucumber::World;
use log::*;

pub type Checkout = PurchaseCoordinator<FakeBackend, FakeProcessor>;

#[derive(Default, World)]
pub struct CheckoutWorld {
    pub item: Option<CatalogItem>,
    pub identity: StaticIdentity,
    pub checkout: Option<Checkout>,
    pub last_quote: Option<PriceQuote>,
    pub last_result: Option<Result<CompletedPurchase, CheckoutError>>,
}

impl Debug for CheckoutWorld {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutWorld")
            .field("item", &self.item)
            .field("identity", &self.identity)
            .field("checkout_open", &self.checkout.is_some())
            .field("last_quote", &self.last_quote)
            .field("last_result", &self.last_result)
            .finish()
    }
}

impl CheckoutWorld {
    pub fn add_item(&mut self, id: &str, price: i64, available: u32) {
        self.item = Some(CatalogItem {
            id: id.into(),
            name: format!("Plant {id}"),
            category: "Indoor".into(),
            unit_price: Cents::from_dollars(price),
            available,
            seller_email: "seller@example.com".into(),
        });
    }

    pub fn sign_in(&mut self, name: &str) {
        let email = format!("{}@example.com", name.to_lowercase());
        self.identity = StaticIdentity::signed_in(Buyer::new(name.to_string(), email));
    }

    pub fn open_checkout(&mut self) -> Result<(), CheckoutError> {
        let item = self.item.clone().expect("No item has been listed");
        let backend = FakeBackend::with_item(item.clone());
        let processor = FakeProcessor::ready();
        let checkout = PurchaseCoordinator::open(backend, processor, &self.identity, &item, EventProducers::default())?;
        self.checkout = Some(checkout);
        Ok(())
    }

    pub fn checkout(&self) -> &Checkout {
        self.checkout.as_ref().expect("Checkout has not been opened")
    }

    pub async fn state(&self) -> Option<PurchaseRequest> {
        match &self.checkout {
            Some(c) => Some(c.snapshot().await),
            None => None,
        }
    }

    pub fn last_error(&self) -> &CheckoutError {
        match &self.last_result {
            Some(Err(e)) => e,
            other => panic!("Expected the last submission to fail, but got {other:?}"),
        }
    }

    pub fn last_purchase(&self) -> &CompletedPurchase {
        match &self.last_result {
            Some(Ok(p)) => p,
            other => panic!("Expected the last submission to succeed, but got {other:?}"),
        }
    }

    pub async fn close(&mut self) {
        if let Some(checkout) = self.checkout.take() {
            let outcome = checkout.close().await;
            debug!("🚀️ Checkout closed: {outcome:?}");
        }
    }
}
