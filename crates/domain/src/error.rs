//! Domain error types.

use thiserror::Error;

/// Errors raised while building or validating domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A cart was submitted without any lines.
    #[error("Cart has no lines")]
    EmptyCart,

    /// A cart line requested zero units.
    #[error("Invalid quantity {quantity} for product {product_id} size {size} (must be greater than 0)")]
    InvalidQuantity {
        product_id: String,
        size: String,
        quantity: u32,
    },

    /// A price below zero was supplied.
    #[error("Invalid price {cents} cents for product {product_id} (must not be negative)")]
    NegativePrice { product_id: String, cents: i64 },

    /// A decimal amount could not be interpreted as money.
    #[error("Invalid money amount: {0}")]
    InvalidAmount(String),

    /// Summing or multiplying amounts exceeded the representable range.
    #[error("Amount overflow")]
    AmountOverflow,

    /// Two variations of one product share a size.
    #[error("Duplicate variation size: {0}")]
    DuplicateSize(String),
}
