use std::sync::Arc;

use checkout_common::Secret;
use checkout_engine::{
    purchase_types::{CatalogItem, InventoryAdjustment, ItemId, NewOrder, OrderId},
    BackendError,
    PurchaseBackend,
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::{join_url, BackendConfig},
    data_objects::{
        InsertOrderResponse,
        OrderDocument,
        PaymentIntentRequest,
        PaymentIntentResponse,
        PlantDocument,
        QuantityUpdate,
    },
    StorefrontApiError,
};

/// JSON client for the storefront backend.
#[derive(Clone)]
pub struct StorefrontApi {
    config: BackendConfig,
    client: Arc<Client>,
}

impl StorefrontApi {
    pub fn new(config: BackendConfig) -> Result<Self, StorefrontApiError> {
        join_url(&config.base_url, "").map_err(|e| StorefrontApiError::Initialization(e.to_string()))?;
        let mut headers = HeaderMap::with_capacity(2);
        if let Some(token) = &config.access_token {
            let val = HeaderValue::from_str(&format!("Bearer {}", token.reveal()))
                .map_err(|e| StorefrontApiError::Initialization(e.to_string()))?;
            headers.insert(AUTHORIZATION, val);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StorefrontApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, StorefrontApiError> {
        let url =
            join_url(&self.config.base_url, path).map_err(|e| StorefrontApiError::RestRequestError(e.to_string()))?;
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| StorefrontApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StorefrontApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StorefrontApiError::RestResponseError(e.to_string()))?;
            Err(StorefrontApiError::QueryError { status, message })
        }
    }

    pub async fn fetch_plant(&self, plant_id: &str) -> Result<PlantDocument, StorefrontApiError> {
        let path = format!("/plants/{plant_id}");
        debug!("Fetching plant {plant_id}");
        self.rest_query::<PlantDocument, ()>(Method::GET, &path, None).await
    }

    pub async fn create_payment_intent(
        &self,
        plant_id: &str,
        quantity: u32,
    ) -> Result<Secret<String>, StorefrontApiError> {
        let body = PaymentIntentRequest { quantity, plant_id: plant_id.to_string() };
        let result =
            self.rest_query::<PaymentIntentResponse, _>(Method::POST, "/create-payment-intent", Some(body)).await?;
        Ok(Secret::new(result.client_secret))
    }

    pub async fn insert_order(&self, order: &OrderDocument) -> Result<String, StorefrontApiError> {
        let result = self.rest_query::<InsertOrderResponse, _>(Method::POST, "/order", Some(order)).await?;
        Ok(result.inserted_id)
    }

    pub async fn update_plant_quantity(
        &self,
        plant_id: &str,
        update: &QuantityUpdate,
    ) -> Result<(), StorefrontApiError> {
        let path = format!("/plants/quantity/{plant_id}");
        // The acknowledgement body is not used
        let _ack = self.rest_query::<serde_json::Value, _>(Method::PATCH, &path, Some(update)).await?;
        Ok(())
    }
}

impl PurchaseBackend for StorefrontApi {
    async fn fetch_item(&self, item_id: &ItemId) -> Result<CatalogItem, BackendError> {
        match self.fetch_plant(item_id.as_str()).await {
            Ok(doc) => Ok(CatalogItem::try_from(doc)?),
            Err(StorefrontApiError::QueryError { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(BackendError::ItemNotFound(item_id.clone()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn create_authorization(&self, item_id: &ItemId, quantity: u32) -> Result<Secret<String>, BackendError> {
        Ok(self.create_payment_intent(item_id.as_str(), quantity).await?)
    }

    async fn create_order(&self, order: &NewOrder) -> Result<OrderId, BackendError> {
        let doc = OrderDocument::from(order);
        let id = self.insert_order(&doc).await?;
        info!("Order {id} stored for payment {}", order.transaction_id);
        Ok(OrderId::from(id))
    }

    async fn adjust_inventory(&self, adjustment: &InventoryAdjustment) -> Result<(), BackendError> {
        let update =
            QuantityUpdate { quantity_to_update: adjustment.magnitude(), status: adjustment.direction().to_string() };
        self.update_plant_quantity(adjustment.item_id.as_str(), &update).await?;
        Ok(())
    }
}
