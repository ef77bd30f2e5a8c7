//! Shared application state.

use std::sync::Arc;

use checkout::{
    CheckoutConfig, CheckoutOrchestrator, InMemoryReconciliationLog, PaymentGateway,
    ReconciliationLog, SandboxGateway, TokenProvisioner,
};
use store::{CatalogStore, InMemoryCatalogStore, InMemoryOrderStore, OrderStore};

/// Checkout orchestrator over type-erased collaborators, chosen at startup.
pub type Checkout = CheckoutOrchestrator<
    Arc<dyn CatalogStore>,
    Arc<dyn OrderStore>,
    Arc<dyn PaymentGateway>,
    Arc<dyn ReconciliationLog>,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub orders: Arc<dyn OrderStore>,
    pub reconciliation: Arc<dyn ReconciliationLog>,
    pub tokens: TokenProvisioner<Arc<dyn PaymentGateway>>,
    pub checkout: Arc<Checkout>,
}

impl AppState {
    /// Wires the checkout flow over the given collaborators.
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        reconciliation: Arc<dyn ReconciliationLog>,
        config: CheckoutConfig,
    ) -> Self {
        let checkout = CheckoutOrchestrator::new(
            catalog.clone(),
            orders.clone(),
            gateway.clone(),
            reconciliation.clone(),
        )
        .with_config(config);

        Self {
            catalog,
            orders,
            reconciliation,
            tokens: TokenProvisioner::new(gateway),
            checkout: Arc::new(checkout),
        }
    }
}

/// Creates state backed by in-memory stores and the sandbox gateway.
///
/// The collaborators are cheap clones sharing their data, so callers can
/// keep handles to seed the catalog or inspect charges.
pub fn create_default_state(
    catalog: InMemoryCatalogStore,
    orders: InMemoryOrderStore,
    gateway: SandboxGateway,
    config: CheckoutConfig,
) -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(catalog),
        Arc::new(orders),
        Arc::new(gateway),
        Arc::new(InMemoryReconciliationLog::new()),
        config,
    ))
}
