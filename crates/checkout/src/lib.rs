//! Checkout flow for the storefront.
//!
//! A checkout runs these steps:
//! 1. Price the cart from the catalog
//! 2. Charge the buyer through the payment gateway
//! 3. Persist the order
//! 4. Decrement stock for every line, concurrently
//!
//! Nothing is rolled back once the charge succeeds. Failures after that
//! point are written to a reconciliation log instead.

pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod reconciliation;
pub mod steps;
pub mod token;

pub use error::{CheckoutError, GatewayError};
pub use gateway::{
    BraintreeConfig, BraintreeEnvironment, BraintreeGateway, ClientToken, PaymentGateway,
    SANDBOX_DECLINED_TOKEN, SaleRequest, SandboxGateway,
};
pub use orchestrator::{
    CheckoutConfig, CheckoutOrchestrator, InventoryAdjustmentFailure, InventoryFailureReason,
    OrderReceipt,
};
pub use reconciliation::{
    InMemoryReconciliationLog, PostgresReconciliationLog, ReconciliationEntry, ReconciliationKind,
    ReconciliationLog,
};
pub use token::TokenProvisioner;
