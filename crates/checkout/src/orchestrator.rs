//! Checkout orchestrator.

use std::time::{Duration, Instant};

use common::{BuyerId, OrderId};
use domain::{Cart, CartLine, Money, NewOrder, Order, PaymentResult, ProductId, Size};
use futures_util::future::join_all;
use serde::Serialize;
use store::{CatalogStore, CatalogStoreExt, OrderStore, StoreError};

use crate::error::{CheckoutError, GatewayError, Result};
use crate::gateway::{PaymentGateway, SaleRequest};
use crate::reconciliation::{ReconciliationEntry, ReconciliationKind, ReconciliationLog};
use crate::steps::{STEP_ADJUST_INVENTORY, STEP_CHARGE, STEP_PERSIST_ORDER, STEP_PRICE_CART};

/// Sale attempts per checkout: the first call plus one retry.
const MAX_SALE_ATTEMPTS: u32 = 2;

/// Tunables for the checkout flow.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Upper bound on a single gateway sale call.
    pub gateway_timeout: Duration,
    /// Pause before retrying a sale the gateway reported as not processed.
    pub retry_delay: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_millis(250),
        }
    }
}

/// Why a line's stock was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum InventoryFailureReason {
    /// No variation matched, or stock was lower than the quantity.
    NoMatchingStock,
    /// The catalog store returned an error.
    Store(String),
}

impl std::fmt::Display for InventoryFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryFailureReason::NoMatchingStock => {
                f.write_str("no matching product/size with enough stock")
            }
            InventoryFailureReason::Store(message) => write!(f, "catalog store error: {message}"),
        }
    }
}

/// A line whose stock decrement did not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustmentFailure {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: u32,
    pub reason: InventoryFailureReason,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub amount: Money,
    /// Lines whose stock was not decremented. Never fails the checkout.
    pub inventory_issues: Vec<InventoryAdjustmentFailure>,
}

/// Drives a checkout: price, charge, persist, adjust stock.
///
/// Every collaborator is injected, so one orchestrator can be shared by
/// all request handlers.
pub struct CheckoutOrchestrator<C, O, G, R>
where
    C: CatalogStore,
    O: OrderStore,
    G: PaymentGateway,
    R: ReconciliationLog,
{
    catalog: C,
    orders: O,
    gateway: G,
    reconciliation: R,
    config: CheckoutConfig,
}

impl<C, O, G, R> CheckoutOrchestrator<C, O, G, R>
where
    C: CatalogStore,
    O: OrderStore,
    G: PaymentGateway,
    R: ReconciliationLog,
{
    /// Creates a new orchestrator with the default configuration.
    pub fn new(catalog: C, orders: O, gateway: G, reconciliation: R) -> Self {
        Self {
            catalog,
            orders,
            gateway,
            reconciliation,
            config: CheckoutConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn orders(&self) -> &O {
        &self.orders
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn reconciliation(&self) -> &R {
        &self.reconciliation
    }

    /// Runs a checkout for the given cart lines.
    ///
    /// Returns a receipt once the sale has settled and the order is
    /// persisted. Stock problems after that point are reported in the
    /// receipt and the reconciliation log, never as an error.
    #[tracing::instrument(skip(self, lines, payment_token), fields(buyer_id = %buyer_id, lines = lines.len()))]
    pub async fn checkout(
        &self,
        lines: Vec<CartLine>,
        payment_token: &str,
        buyer_id: BuyerId,
    ) -> Result<OrderReceipt> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.run(lines, payment_token, buyer_id).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_id = %receipt.order_id,
                    transaction_id = %receipt.transaction_id,
                    amount = %receipt.amount,
                    inventory_issues = receipt.inventory_issues.len(),
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "reason" => e.kind()).increment(1);
                tracing::warn!(reason = e.kind(), error = %e, "checkout failed");
            }
        }

        result
    }

    async fn run(
        &self,
        lines: Vec<CartLine>,
        payment_token: &str,
        buyer_id: BuyerId,
    ) -> Result<OrderReceipt> {
        let cart = Cart::new(lines)?;

        tracing::info!(step = STEP_PRICE_CART, "checkout step started");
        let cart = self.price_cart(cart).await?;
        let amount = cart.total()?;

        tracing::info!(step = STEP_CHARGE, amount = %amount, "checkout step started");
        let payment = self.charge(&cart, amount, payment_token, buyer_id).await?;
        let transaction_id = payment.transaction_id.clone();

        tracing::info!(
            step = STEP_PERSIST_ORDER,
            transaction_id = %transaction_id,
            "checkout step started"
        );
        let new_order = NewOrder {
            lines: cart.lines().to_vec(),
            payment,
            buyer_id,
        };
        let order = match self.orders.insert(new_order).await {
            Ok(order) => order,
            Err(source) => {
                return Err(self
                    .persistence_failed(cart, amount, transaction_id, buyer_id, source)
                    .await);
            }
        };

        tracing::info!(
            step = STEP_ADJUST_INVENTORY,
            order_id = %order.id,
            "checkout step started"
        );
        let inventory_issues = self.adjust_inventory(&order).await;

        Ok(OrderReceipt {
            order_id: order.id,
            transaction_id,
            amount,
            inventory_issues,
        })
    }

    /// Replaces every client-submitted unit price with the catalog price.
    async fn price_cart(&self, cart: Cart) -> Result<Cart> {
        let mut priced = Vec::with_capacity(cart.len());
        for line in cart.into_lines() {
            let product = self
                .catalog
                .get_product(&line.product_id)
                .await
                .map_err(CheckoutError::Catalog)?
                .ok_or_else(|| CheckoutError::UnknownProduct(line.product_id.clone()))?;

            if product.price != line.unit_price {
                tracing::warn!(
                    product_id = %line.product_id,
                    submitted = %line.unit_price,
                    catalog = %product.price,
                    "cart price differs from catalog, using catalog price"
                );
            }
            priced.push(line.repriced(product.price));
        }
        Ok(Cart::new(priced)?)
    }

    async fn charge(
        &self,
        cart: &Cart,
        amount: Money,
        payment_token: &str,
        buyer_id: BuyerId,
    ) -> Result<PaymentResult> {
        let request = SaleRequest::settle(amount, payment_token);
        let mut attempt = 1;

        loop {
            let outcome = self.sale_once(request.clone()).await;
            match outcome {
                Ok(payment) => return Ok(payment),
                Err(error) if error.is_transient() && attempt < MAX_SALE_ATTEMPTS => {
                    tracing::warn!(attempt, error = %error, "gateway unavailable, retrying sale");
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if error.outcome_unknown() {
                        self.record(
                            ReconciliationEntry::new(
                                ReconciliationKind::GatewayOutcomeUnknown,
                                buyer_id,
                                amount,
                                error.to_string(),
                            )
                            .with_lines(cart.lines().to_vec()),
                        )
                        .await;
                    }
                    return Err(error.into());
                }
            }
        }
    }

    async fn sale_once(&self, request: SaleRequest) -> std::result::Result<PaymentResult, GatewayError> {
        let started = Instant::now();
        let timeout = self.config.gateway_timeout;
        let outcome = match tokio::time::timeout(timeout, self.gateway.sale(request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        };
        metrics::histogram!("gateway_sale_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn persistence_failed(
        &self,
        cart: Cart,
        amount: Money,
        transaction_id: String,
        buyer_id: BuyerId,
        source: StoreError,
    ) -> CheckoutError {
        tracing::error!(
            transaction_id = %transaction_id,
            amount = %amount,
            buyer_id = %buyer_id,
            error = %source,
            "sale settled but the order was not saved, reconciliation required"
        );
        self.record(
            ReconciliationEntry::new(
                ReconciliationKind::PersistenceFailed,
                buyer_id,
                amount,
                source.to_string(),
            )
            .with_transaction(transaction_id.clone())
            .with_lines(cart.into_lines()),
        )
        .await;

        CheckoutError::PersistenceFailed {
            transaction_id,
            amount,
            source,
        }
    }

    /// Issues one conditional decrement per line, all at once.
    async fn adjust_inventory(&self, order: &Order) -> Vec<InventoryAdjustmentFailure> {
        let adjustments = order.lines.iter().map(|line| async move {
            let reason = match self
                .catalog
                .decrement_stock(&line.product_id, &line.size, line.quantity)
                .await
            {
                Ok(Some(_)) => return None,
                Ok(None) => InventoryFailureReason::NoMatchingStock,
                Err(e) => InventoryFailureReason::Store(e.to_string()),
            };
            Some((line, reason))
        });
        let failed: Vec<(&CartLine, InventoryFailureReason)> =
            join_all(adjustments).await.into_iter().flatten().collect();

        let mut issues = Vec::with_capacity(failed.len());
        for (line, reason) in failed {
            tracing::warn!(
                order_id = %order.id,
                product_id = %line.product_id,
                size = %line.size,
                quantity = line.quantity,
                reason = %reason,
                "inventory adjustment failed"
            );
            metrics::counter!("inventory_adjustment_failed_total").increment(1);
            self.record(
                ReconciliationEntry::new(
                    ReconciliationKind::InventoryAdjustmentFailed,
                    order.buyer_id,
                    line.line_total().unwrap_or_default(),
                    reason.to_string(),
                )
                .with_transaction(order.payment.transaction_id.clone())
                .with_order(order.id)
                .with_lines(vec![line.clone()]),
            )
            .await;

            issues.push(InventoryAdjustmentFailure {
                product_id: line.product_id.clone(),
                size: line.size.clone(),
                quantity: line.quantity,
                reason,
            });
        }
        issues
    }

    async fn record(&self, entry: ReconciliationEntry) {
        let kind = entry.kind;
        let detail = entry.detail.clone();
        if let Err(e) = self.reconciliation.record(entry).await {
            tracing::error!(
                kind = %kind,
                detail = %detail,
                error = %e,
                "failed to write reconciliation entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SandboxGateway;
    use crate::reconciliation::InMemoryReconciliationLog;
    use common::CategoryId;
    use domain::{NewProduct, Product, Variation};
    use store::{InMemoryCatalogStore, InMemoryOrderStore};

    type TestOrchestrator = CheckoutOrchestrator<
        InMemoryCatalogStore,
        InMemoryOrderStore,
        SandboxGateway,
        InMemoryReconciliationLog,
    >;

    fn product(id: &str, cents: i64, stock: u32) -> Product {
        Product::create_with_id(
            ProductId::new(id),
            NewProduct {
                name: format!("Product {id}"),
                description: String::new(),
                price: Money::from_cents(cents),
                category_id: CategoryId::new(),
                variations: vec![Variation::new("M", stock)],
                keywords: Vec::new(),
            },
        )
        .unwrap()
    }

    fn orchestrator(products: Vec<Product>) -> TestOrchestrator {
        CheckoutOrchestrator::new(
            InMemoryCatalogStore::with_products(products),
            InMemoryOrderStore::new(),
            SandboxGateway::new(),
            InMemoryReconciliationLog::new(),
        )
        .with_config(CheckoutConfig {
            gateway_timeout: Duration::from_millis(200),
            retry_delay: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_client_price_is_replaced_by_catalog_price() {
        let checkout = orchestrator(vec![product("P1", 1500, 5)]);

        let receipt = checkout
            .checkout(
                vec![CartLine::new("P1", "M", 2, Money::from_cents(1))],
                "fake-valid-nonce",
                BuyerId::new(),
            )
            .await
            .unwrap();

        assert_eq!(receipt.amount, Money::from_cents(3000));
        let orders = checkout.orders().all().await;
        assert_eq!(orders[0].lines[0].unit_price, Money::from_cents(1500));
        assert_eq!(checkout.gateway().charged_total(), Money::from_cents(3000));
    }

    #[tokio::test]
    async fn test_unknown_product_aborts_before_charge() {
        let checkout = orchestrator(vec![product("P1", 1000, 5)]);

        let result = checkout
            .checkout(
                vec![CartLine::new("NOPE", "M", 1, Money::from_cents(1000))],
                "fake-valid-nonce",
                BuyerId::new(),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::UnknownProduct(id)) if id.as_str() == "NOPE"));
        assert_eq!(checkout.gateway().sale_attempts(), 0);
    }

    #[tokio::test]
    async fn test_empty_cart_is_invalid() {
        let checkout = orchestrator(vec![]);

        let result = checkout
            .checkout(vec![], "fake-valid-nonce", BuyerId::new())
            .await;

        assert!(matches!(result, Err(CheckoutError::InvalidCart(_))));
        assert_eq!(checkout.gateway().sale_attempts(), 0);
    }

    #[tokio::test]
    async fn test_single_retry_on_unavailable() {
        let checkout = orchestrator(vec![product("P1", 1000, 5)]);
        checkout.gateway().set_unavailable_for(1);

        let receipt = checkout
            .checkout(
                vec![CartLine::new("P1", "M", 1, Money::from_cents(1000))],
                "fake-valid-nonce",
                BuyerId::new(),
            )
            .await
            .unwrap();

        assert_eq!(receipt.transaction_id, "txn-0001");
        assert_eq!(checkout.gateway().sale_attempts(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_unavailable() {
        let checkout = orchestrator(vec![product("P1", 1000, 5)]);
        checkout.gateway().set_unavailable_for(2);

        let result = checkout
            .checkout(
                vec![CartLine::new("P1", "M", 1, Money::from_cents(1000))],
                "fake-valid-nonce",
                BuyerId::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::GatewayDeclined(GatewayError::Unavailable(_)))
        ));
        assert_eq!(checkout.gateway().sale_attempts(), 2);
        assert!(checkout.reconciliation().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_not_retried_and_is_recorded() {
        let checkout = orchestrator(vec![product("P1", 1000, 5)]);
        checkout.gateway().set_hang_on_sale(true);

        let result = checkout
            .checkout(
                vec![CartLine::new("P1", "M", 1, Money::from_cents(1000))],
                "fake-valid-nonce",
                BuyerId::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::GatewayDeclined(GatewayError::Timeout(_)))
        ));
        assert_eq!(checkout.gateway().sale_attempts(), 1);
        assert_eq!(checkout.orders().count().await.unwrap(), 0);

        let entries = checkout
            .reconciliation()
            .entries_of(ReconciliationKind::GatewayOutcomeUnknown)
            .await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, Money::from_cents(1000));
    }

    #[test]
    fn test_receipt_serializes_camel_case() {
        let receipt = OrderReceipt {
            order_id: OrderId::new(),
            transaction_id: "txn-0001".to_string(),
            amount: Money::from_cents(2000),
            inventory_issues: vec![InventoryAdjustmentFailure {
                product_id: ProductId::new("P1"),
                size: Size::new("XL"),
                quantity: 1,
                reason: InventoryFailureReason::NoMatchingStock,
            }],
        };

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["transactionId"], "txn-0001");
        assert_eq!(json["inventoryIssues"][0]["productId"], "P1");
        assert_eq!(json["inventoryIssues"][0]["reason"]["kind"], "no_matching_stock");
    }
}
