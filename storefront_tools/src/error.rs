use checkout_engine::{BackendError, ProcessorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorefrontApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}

impl From<StorefrontApiError> for BackendError {
    fn from(e: StorefrontApiError) -> Self {
        match e {
            StorefrontApiError::QueryError { status, message } => Self::Rejected { status, message },
            StorefrontApiError::RestRequestError(s) | StorefrontApiError::Initialization(s) => Self::Network(s),
            StorefrontApiError::RestResponseError(s) => Self::Network(s),
            StorefrontApiError::JsonError(s) | StorefrontApiError::InvalidCurrencyAmount(s) => Self::InvalidResponse(s),
        }
    }
}

impl From<StorefrontApiError> for ProcessorError {
    fn from(e: StorefrontApiError) -> Self {
        match e {
            StorefrontApiError::Initialization(s) => Self::NotInitialized(s),
            StorefrontApiError::RestRequestError(s) | StorefrontApiError::RestResponseError(s) => Self::Network(s),
            e => Self::InvalidResponse(e.to_string()),
        }
    }
}
