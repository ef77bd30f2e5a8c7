//! Buyer order history.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use domain::{CartLine, Order};
use serde::Serialize;

use super::Buyer;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub product_id: String,
    pub size: String,
    pub quantity: u32,
    pub unit_price: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub lines: Vec<OrderLineResponse>,
    pub amount: String,
    pub transaction_id: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
}

impl From<CartLine> for OrderLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            product_id: line.product_id.to_string(),
            size: line.size.to_string(),
            quantity: line.quantity,
            unit_price: line.unit_price.to_string(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            buyer_id: order.buyer_id.to_string(),
            amount: order.amount().to_string(),
            lines: order.lines.into_iter().map(OrderLineResponse::from).collect(),
            transaction_id: order.payment.transaction_id,
            payment_status: order.payment.status,
            created_at: order.created_at,
        }
    }
}

/// GET /api/v1/orders: the calling buyer's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Buyer(buyer_id): Buyer,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_for_buyer(buyer_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}
