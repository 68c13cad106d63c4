//! Wire formats for the storefront backend and the card processor.
use checkout_engine::purchase_types::{CatalogItem, NewOrder};
use serde::{Deserialize, Serialize};

use crate::{helpers::parse_dollar_price, StorefrontApiError};

//--------------------------------------   Storefront backend   --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub quantity: u32,
    pub plant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCustomer {
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

/// The order document the backend stores. Prices are in dollars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDocument {
    pub customer: OrderCustomer,
    pub plant_id: String,
    pub price: f64,
    pub quantity: u32,
    pub seller: String,
    pub address: String,
    pub status: String,
    pub transaction_id: String,
}

impl From<&NewOrder> for OrderDocument {
    fn from(order: &NewOrder) -> Self {
        Self {
            customer: OrderCustomer {
                name: order.buyer.name.clone(),
                email: order.buyer.email.clone(),
                image: order.buyer.avatar_url.clone(),
            },
            plant_id: order.item_id.to_string(),
            price: order.total_price.to_dollars_f64(),
            quantity: order.quantity,
            seller: order.seller_email.clone(),
            address: order.shipping_address.clone(),
            status: order.fulfilment_status.clone(),
            transaction_id: order.transaction_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOrderResponse {
    pub inserted_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityUpdate {
    pub quantity_to_update: u64,
    /// `increase` or `decrease`
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerInfo {
    pub email: String,
}

/// A catalog entry as the backend stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub price: f64,
    pub quantity: u32,
    pub seller: SellerInfo,
}

impl TryFrom<PlantDocument> for CatalogItem {
    type Error = StorefrontApiError;

    fn try_from(doc: PlantDocument) -> Result<Self, Self::Error> {
        let unit_price = parse_dollar_price(doc.price)?;
        Ok(Self {
            id: doc.id.into(),
            name: doc.name,
            category: doc.category,
            unit_price,
            available: doc.quantity,
            seller_email: doc.seller.email,
        })
    }
}

//--------------------------------------     Card processor     --------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorPaymentMethod {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorPaymentIntent {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub last_payment_error: Option<ProcessorErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessorErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProcessorErrorBody {
    /// The most specific reason available, for display to the buyer.
    pub fn reason(&self) -> String {
        self.decline_code
            .as_ref()
            .or(self.code.as_ref())
            .or(self.message.as_ref())
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn is_card_error(&self) -> bool {
        self.error_type.as_deref() == Some("card_error")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorErrorEnvelope {
    pub error: ProcessorErrorBody,
}
