//! Checkout endpoints: client token, payment, reconciliation view.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::{InventoryAdjustmentFailure, OrderReceipt, ReconciliationEntry, ReconciliationKind};
use chrono::{DateTime, Utc};
use domain::{CartLine, Money};
use serde::{Deserialize, Serialize};

use super::Buyer;
use super::orders::OrderLineResponse;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_token: String,
    pub cart: Vec<CartItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    pub product_id: String,
    pub size: String,
    pub quantity: u32,
    /// Unit price in major units, as shown to the buyer.
    pub unit_price: f64,
}

impl CartItemRequest {
    fn into_line(self) -> Result<CartLine, ApiError> {
        let unit_price = Money::from_major_units(self.unit_price)?;
        Ok(CartLine::new(
            self.product_id,
            self.size,
            self.quantity,
            unit_price,
        ))
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTokenResponse {
    pub client_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub ok: bool,
    pub order_id: String,
    pub transaction_id: String,
    pub amount: String,
    pub inventory_issues: Vec<InventoryAdjustmentFailure>,
}

impl From<OrderReceipt> for PaymentResponse {
    fn from(receipt: OrderReceipt) -> Self {
        Self {
            ok: true,
            order_id: receipt.order_id.to_string(),
            transaction_id: receipt.transaction_id,
            amount: receipt.amount.to_string(),
            inventory_issues: receipt.inventory_issues,
        }
    }
}

/// A reconciliation entry, with money rendered like order amounts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationEntryResponse {
    pub id: String,
    pub kind: ReconciliationKind,
    pub buyer_id: String,
    pub amount: String,
    pub transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub lines: Vec<OrderLineResponse>,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

impl From<ReconciliationEntry> for ReconciliationEntryResponse {
    fn from(entry: ReconciliationEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            kind: entry.kind,
            buyer_id: entry.buyer_id.to_string(),
            amount: entry.amount.to_string(),
            transaction_id: entry.transaction_id,
            order_id: entry.order_id.map(|id| id.to_string()),
            lines: entry.lines.into_iter().map(OrderLineResponse::from).collect(),
            detail: entry.detail,
            recorded_at: entry.recorded_at,
        }
    }
}

// -- Handlers --

/// POST /api/v1/checkout/token: issue a gateway client token.
#[tracing::instrument(skip(state))]
pub async fn token(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClientTokenResponse>, ApiError> {
    let token = state.tokens.generate_client_token().await?;
    Ok(Json(ClientTokenResponse {
        client_token: token.into_inner(),
    }))
}

/// POST /api/v1/checkout/pay: charge the cart and record the order.
///
/// The checkout runs on its own task so a client disconnect cannot cancel
/// a charge that is already in flight.
#[tracing::instrument(skip(state, req), fields(buyer_id = %buyer.0, lines = req.cart.len()))]
pub async fn pay(
    State(state): State<Arc<AppState>>,
    buyer: Buyer,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let lines = req
        .cart
        .into_iter()
        .map(CartItemRequest::into_line)
        .collect::<Result<Vec<_>, _>>()?;
    let payment_token = req.payment_token;
    let checkout = Arc::clone(&state.checkout);

    let receipt = tokio::spawn(async move {
        checkout.checkout(lines, &payment_token, buyer.0).await
    })
    .await
    .map_err(|e| ApiError::Internal(format!("checkout task failed: {e}")))??;

    Ok(Json(receipt.into()))
}

/// GET /api/v1/checkout/reconciliation: entries awaiting manual follow-up.
#[tracing::instrument(skip(state))]
pub async fn reconciliation(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReconciliationEntryResponse>>, ApiError> {
    let entries = state.reconciliation.entries().await?;
    Ok(Json(
        entries
            .into_iter()
            .map(ReconciliationEntryResponse::from)
            .collect(),
    ))
}
