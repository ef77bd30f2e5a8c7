//! Payment gateway trait and implementations.

mod braintree;
mod sandbox;

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Money, PaymentResult};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

pub use braintree::{BraintreeConfig, BraintreeEnvironment, BraintreeGateway};
pub use sandbox::{SANDBOX_DECLINED_TOKEN, SandboxGateway};

/// Opaque token handed to the browser so it can tokenize a payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientToken(String);

impl ClientToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A sale to submit to the gateway.
#[derive(Clone)]
pub struct SaleRequest {
    /// Amount to charge, in the store currency.
    pub amount: Money,
    /// Single-use payment method nonce produced by the client.
    pub payment_token: String,
    /// Submit for settlement in the same call instead of only authorizing.
    pub settle_immediately: bool,
}

impl SaleRequest {
    /// A sale that is submitted for settlement right away.
    pub fn settle(amount: Money, payment_token: impl Into<String>) -> Self {
        Self {
            amount,
            payment_token: payment_token.into(),
            settle_immediately: true,
        }
    }
}

impl std::fmt::Debug for SaleRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleRequest")
            .field("amount", &self.amount)
            .field("payment_token", &"<redacted>")
            .field("settle_immediately", &self.settle_immediately)
            .finish()
    }
}

/// Trait for payment gateway clients.
///
/// Implementations must be cheap to clone and safe to share between
/// concurrent checkouts.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Generates a client token for the browser-side payment form.
    async fn generate_client_token(&self) -> Result<ClientToken, GatewayError>;

    /// Submits a sale.
    ///
    /// An `Ok` result means the gateway accepted the charge. Declines are
    /// reported as [`GatewayError::Declined`].
    async fn sale(&self, request: SaleRequest) -> Result<PaymentResult, GatewayError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn generate_client_token(&self) -> Result<ClientToken, GatewayError> {
        (**self).generate_client_token().await
    }

    async fn sale(&self, request: SaleRequest) -> Result<PaymentResult, GatewayError> {
        (**self).sale(request).await
    }
}
