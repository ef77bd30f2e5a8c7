//! In-process payment gateway for local development and tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use domain::{Money, PaymentResult};
use serde_json::json;

use super::{ClientToken, PaymentGateway, SaleRequest};
use crate::error::GatewayError;

/// Payment token the sandbox always declines.
pub const SANDBOX_DECLINED_TOKEN: &str = "fake-processor-declined-visa-nonce";

#[derive(Debug, Default)]
struct SandboxState {
    sales: Vec<PaymentResult>,
    sale_attempts: u32,
    tokens_issued: u32,
    decline_reason: Option<String>,
    unavailable_failures: u32,
    hang_on_sale: bool,
    fail_on_token: bool,
}

/// In-memory payment gateway.
///
/// Approves every sale unless configured otherwise. Transaction ids are
/// sequential (`txn-0001`, `txn-0002`, ...).
#[derive(Debug, Clone, Default)]
pub struct SandboxGateway {
    state: Arc<Mutex<SandboxState>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declines every sale with the given reason until cleared with `None`.
    pub fn set_decline(&self, reason: Option<&str>) {
        self.state().decline_reason = reason.map(str::to_string);
    }

    /// Fails the next `count` sales with [`GatewayError::Unavailable`].
    pub fn set_unavailable_for(&self, count: u32) {
        self.state().unavailable_failures = count;
    }

    /// Makes sales never complete, to exercise caller timeouts.
    pub fn set_hang_on_sale(&self, hang: bool) {
        self.state().hang_on_sale = hang;
    }

    /// Fails client token generation.
    pub fn set_fail_on_token(&self, fail: bool) {
        self.state().fail_on_token = fail;
    }

    /// Number of sales that were approved.
    pub fn sale_count(&self) -> usize {
        self.state().sales.len()
    }

    /// Number of `sale` calls, approved or not.
    pub fn sale_attempts(&self) -> u32 {
        self.state().sale_attempts
    }

    /// Sum of all approved sales.
    pub fn charged_total(&self) -> Money {
        self.state().sales.iter().map(|sale| sale.amount).sum()
    }

    /// Approved sales, oldest first.
    pub fn sales(&self) -> Vec<PaymentResult> {
        self.state().sales.clone()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn generate_client_token(&self) -> Result<ClientToken, GatewayError> {
        let mut state = self.state();
        if state.fail_on_token {
            return Err(GatewayError::Unavailable(
                "sandbox token service disabled".to_string(),
            ));
        }
        state.tokens_issued += 1;
        Ok(ClientToken::new(format!(
            "sandbox-client-token-{:04}",
            state.tokens_issued
        )))
    }

    async fn sale(&self, request: SaleRequest) -> Result<PaymentResult, GatewayError> {
        let hang = {
            let mut state = self.state();
            state.sale_attempts += 1;
            state.hang_on_sale
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state();

        if state.unavailable_failures > 0 {
            state.unavailable_failures -= 1;
            return Err(GatewayError::Unavailable(
                "sandbox gateway unavailable".to_string(),
            ));
        }

        if let Some(reason) = state.decline_reason.clone() {
            return Err(GatewayError::Declined { reason });
        }
        if request.payment_token == SANDBOX_DECLINED_TOKEN {
            return Err(GatewayError::Declined {
                reason: "Processor Declined".to_string(),
            });
        }
        if request.payment_token.trim().is_empty() {
            return Err(GatewayError::Rejected(
                "payment method nonce is required".to_string(),
            ));
        }

        let transaction_id = format!("txn-{:04}", state.sales.len() + 1);
        let status = if request.settle_immediately {
            "SUBMITTED_FOR_SETTLEMENT"
        } else {
            "AUTHORIZED"
        };
        let result = PaymentResult {
            transaction_id: transaction_id.clone(),
            amount: request.amount,
            status: status.to_string(),
            raw: json!({
                "id": transaction_id,
                "status": status,
                "amount": { "value": request.amount.to_string(), "currencyCode": "USD" },
            }),
        };
        state.sales.push(result.clone());

        Ok(result)
    }
}
