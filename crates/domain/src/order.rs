//! Order records written after a successful sale.

use chrono::{DateTime, Utc};
use common::{BuyerId, OrderId};
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::value_objects::Money;

/// Settlement result returned by the payment gateway.
///
/// Only the transaction id and amount are read by this system; `raw` is
/// the gateway's full response, kept verbatim for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub transaction_id: String,
    pub amount: Money,
    pub status: String,
    pub raw: serde_json::Value,
}

/// An order ready to be inserted into the order store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub lines: Vec<CartLine>,
    pub payment: PaymentResult,
    pub buyer_id: BuyerId,
}

/// A persisted order. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub lines: Vec<CartLine>,
    pub payment: PaymentResult,
    pub buyer_id: BuyerId,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Assigns an id and creation time to a new order.
    pub fn from_new(new_order: NewOrder) -> Self {
        Self {
            id: OrderId::new(),
            lines: new_order.lines,
            payment: new_order.payment,
            buyer_id: new_order.buyer_id,
            created_at: Utc::now(),
        }
    }

    /// The amount actually charged for this order.
    pub fn amount(&self) -> Money {
        self.payment.amount
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}
