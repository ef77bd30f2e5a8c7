//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, GatewayError};
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The request carries no buyer identity.
    Unauthorized(String),
    /// Checkout did not complete.
    Checkout(CheckoutError),
    /// Payment gateway call outside of checkout (client tokens).
    Gateway(GatewayError),
    /// Catalog or order store error.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Gateway(err) => (gateway_status(&err), err.to_string()),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::InvalidCart(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::UnknownProduct(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        CheckoutError::Catalog(_) => {
            tracing::error!(error = %err, "catalog unavailable during checkout");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "catalog unavailable, nothing was charged".to_string(),
            )
        }
        CheckoutError::GatewayDeclined(gateway) => (gateway_status(gateway), err.to_string()),
        CheckoutError::PersistenceFailed { transaction_id, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "payment {transaction_id} was received but the order could not be recorded; \
                 it has been flagged for follow-up"
            ),
        ),
    }
}

fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Declined { .. } | GatewayError::Rejected(_) => StatusCode::PAYMENT_REQUIRED,
        GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::Unavailable(_)
        | GatewayError::Transport(_)
        | GatewayError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        StoreError::Domain(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        _ => {
            tracing::error!(error = %err, "store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage error".to_string(),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use domain::{Money, ProductId};

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_checkout_error_statuses() {
        assert_eq!(
            status_of(CheckoutError::InvalidCart(DomainError::EmptyCart).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::UnknownProduct(ProductId::new("P9")).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(
                CheckoutError::GatewayDeclined(GatewayError::Declined {
                    reason: "Insufficient Funds".into()
                })
                .into()
            ),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(
                CheckoutError::GatewayDeclined(GatewayError::Timeout(Duration::from_secs(30)))
                    .into()
            ),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(
                CheckoutError::GatewayDeclined(GatewayError::Unavailable("503".into())).into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(
                CheckoutError::PersistenceFailed {
                    transaction_id: "txn-0001".into(),
                    amount: Money::from_cents(2000),
                    source: StoreError::Unavailable("down".into()),
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_statuses() {
        assert_eq!(
            status_of(StoreError::NotFound("P1".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StoreError::Conflict("slug".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::Unavailable("down".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
