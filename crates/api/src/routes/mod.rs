//! HTTP route handlers.

pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::BuyerId;

use crate::error::ApiError;

/// Header carrying the authenticated buyer, set by the upstream auth layer.
pub const BUYER_HEADER: &str = "x-buyer-id";

/// Extracts the buyer identity from [`BUYER_HEADER`].
#[derive(Debug, Clone, Copy)]
pub struct Buyer(pub BuyerId);

impl<S: Send + Sync> FromRequestParts<S> for Buyer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(BUYER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {BUYER_HEADER} header")))?;
        let value = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("{BUYER_HEADER} is not valid text")))?;
        BuyerId::parse(value.trim())
            .map(Buyer)
            .map_err(|e| ApiError::BadRequest(format!("invalid {BUYER_HEADER}: {e}")))
    }
}
