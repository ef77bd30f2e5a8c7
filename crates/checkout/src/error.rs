//! Checkout and payment gateway error types.

use std::time::Duration;

use domain::{DomainError, Money, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors reported by a payment gateway client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The processor declined the sale (insufficient funds, invalid card...).
    #[error("Payment declined: {reason}")]
    Declined { reason: String },

    /// The gateway refused the request itself (credentials, malformed input).
    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),

    /// The gateway could not accept the request; nothing was processed.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// No answer within the configured limit; the outcome is unknown.
    #[error("Payment gateway timed out after {0:?}")]
    Timeout(Duration),

    /// The connection failed after the request was sent; the outcome is unknown.
    #[error("Payment gateway transport error: {0}")]
    Transport(String),

    /// The gateway answered with something we could not interpret.
    #[error("Invalid payment gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Returns true if retrying cannot double-charge: the gateway is known
    /// not to have processed the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }

    /// Returns true if a charge may have happened despite the error.
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout(_) | GatewayError::Transport(_) | GatewayError::InvalidResponse(_)
        )
    }
}

/// Errors that abort a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart failed validation; nothing was charged.
    #[error("Invalid cart: {0}")]
    InvalidCart(#[from] DomainError),

    /// A cart line references a product the catalog does not have.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// Reading the catalog failed before the charge.
    #[error("Catalog lookup failed: {0}")]
    Catalog(#[source] StoreError),

    /// The gateway did not settle the sale; no order, no stock change.
    #[error("Payment gateway declined the sale: {0}")]
    GatewayDeclined(#[from] GatewayError),

    /// The sale settled but the order could not be written.
    ///
    /// Money has been taken without an order on record; a reconciliation
    /// entry is written before this error is returned.
    #[error("Sale {transaction_id} for {amount} settled but the order was not saved: {source}")]
    PersistenceFailed {
        transaction_id: String,
        amount: Money,
        #[source]
        source: StoreError,
    },
}

impl CheckoutError {
    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::InvalidCart(_) => "invalid_cart",
            CheckoutError::UnknownProduct(_) => "unknown_product",
            CheckoutError::Catalog(_) => "catalog",
            CheckoutError::GatewayDeclined(_) => "gateway_declined",
            CheckoutError::PersistenceFailed { .. } => "persistence_failed",
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(GatewayError::Unavailable("503".into()).is_transient());
        assert!(!GatewayError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!GatewayError::Declined { reason: "x".into() }.is_transient());
    }

    #[test]
    fn unknown_outcomes() {
        assert!(GatewayError::Timeout(Duration::from_secs(1)).outcome_unknown());
        assert!(GatewayError::Transport("reset".into()).outcome_unknown());
        assert!(!GatewayError::Declined { reason: "x".into() }.outcome_unknown());
        assert!(!GatewayError::Unavailable("x".into()).outcome_unknown());
    }

    #[test]
    fn persistence_failure_is_distinct_from_decline() {
        let err = CheckoutError::PersistenceFailed {
            transaction_id: "txn-1".into(),
            amount: Money::from_cents(2000),
            source: StoreError::Unavailable("down".into()),
        };
        assert_eq!(err.kind(), "persistence_failed");
        assert!(err.to_string().contains("txn-1"));
        assert!(err.to_string().contains("20.00"));

        let declined = CheckoutError::from(GatewayError::Declined {
            reason: "insufficient funds".into(),
        });
        assert_eq!(declined.kind(), "gateway_declined");
    }
}
