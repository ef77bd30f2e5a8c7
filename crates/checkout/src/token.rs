//! Client token provisioning.

use crate::error::GatewayError;
use crate::gateway::{ClientToken, PaymentGateway};

/// Hands out gateway client tokens to the storefront's payment form.
///
/// A thin passthrough: no caching, no retries.
#[derive(Debug, Clone)]
pub struct TokenProvisioner<G: PaymentGateway> {
    gateway: G,
}

impl<G: PaymentGateway> TokenProvisioner<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    #[tracing::instrument(skip(self))]
    pub async fn generate_client_token(&self) -> Result<ClientToken, GatewayError> {
        match self.gateway.generate_client_token().await {
            Ok(token) => {
                metrics::counter!("client_tokens_issued_total").increment(1);
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "client token generation failed");
                Err(e)
            }
        }
    }
}
