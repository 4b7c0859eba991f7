//! # API Errors
//!
//! Every failure leaves the server as `{ "code": ..., "message": ... }`.
//!
//! ```text
//! ┌──────────────────────────────────────┬────────┬───────────────────────────────┐
//! │ Source                               │ Status │ code                          │
//! ├──────────────────────────────────────┼────────┼───────────────────────────────┤
//! │ bad JSON / query / path, validation  │ 400    │ INVALID_REQUEST               │
//! │ fractional quantity, unit product    │ 400    │ QUANTITY_GRANULARITY_MISMATCH │
//! │ unknown or inactive product          │ 404    │ PRODUCT_NOT_FOUND             │
//! │ missing category                     │ 404    │ CATEGORY_NOT_FOUND            │
//! │ unknown sale / tax kind              │ 404    │ NOT_FOUND                     │
//! │ stock too low                        │ 409    │ INSUFFICIENT_STOCK            │
//! │ duplicate unique value               │ 409    │ CONFLICT                      │
//! │ pool exhausted                       │ 503    │ STORAGE_FAILURE               │
//! │ any other storage error              │ 500    │ STORAGE_FAILURE               │
//! └──────────────────────────────────────┴────────┴───────────────────────────────┘
//! ```
//!
//! Storage details are logged, never returned.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::error;

use caja_core::CoreError;
use caja_db::{CheckoutError, DbError};

/// Handler error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Wire shape of an error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub available: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub requested: Option<Decimal>,
}

impl ErrorBody {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        ErrorBody {
            code,
            message: message.into(),
            product_id: None,
            available: None,
            requested: None,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Checkout(CheckoutError::Rejected(err)) => rejected(err),
            ApiError::Checkout(CheckoutError::Storage(err)) | ApiError::Db(err) => storage(err),
            ApiError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("INVALID_REQUEST", message),
            ),
        };

        (status, Json(body)).into_response()
    }
}

fn rejected(err: CoreError) -> (StatusCode, ErrorBody) {
    let message = err.to_string();

    match err {
        CoreError::Validation(_) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("INVALID_REQUEST", message),
        ),
        CoreError::QuantityGranularityMismatch { product_id, .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                product_id: Some(product_id),
                ..ErrorBody::new("QUANTITY_GRANULARITY_MISMATCH", message)
            },
        ),
        CoreError::ProductNotFound(product_id) => (
            StatusCode::NOT_FOUND,
            ErrorBody {
                product_id: Some(product_id),
                ..ErrorBody::new("PRODUCT_NOT_FOUND", message)
            },
        ),
        CoreError::CategoryNotFound(_) => (
            StatusCode::NOT_FOUND,
            ErrorBody::new("CATEGORY_NOT_FOUND", message),
        ),
        CoreError::InsufficientStock {
            product_id,
            available,
            requested,
        } => (
            StatusCode::CONFLICT,
            ErrorBody {
                product_id: Some(product_id),
                available: Some(available),
                requested: Some(requested),
                ..ErrorBody::new("INSUFFICIENT_STOCK", message)
            },
        ),
    }
}

fn storage(err: DbError) -> (StatusCode, ErrorBody) {
    match err {
        DbError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            ErrorBody::new("NOT_FOUND", err.to_string()),
        ),
        DbError::Validation(_) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("INVALID_REQUEST", err.to_string()),
        ),
        DbError::UniqueViolation { .. } => (
            StatusCode::CONFLICT,
            ErrorBody::new("CONFLICT", err.to_string()),
        ),
        DbError::PoolExhausted => {
            error!(error = %err, "Storage unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new("STORAGE_FAILURE", "Storage temporarily unavailable; retry the request"),
            )
        }
        other => {
            error!(error = %other, "Storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("STORAGE_FAILURE", "Storage failure; retry the request"),
            )
        }
    }
}
