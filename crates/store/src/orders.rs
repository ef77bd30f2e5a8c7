use std::sync::Arc;

use async_trait::async_trait;
use common::{BuyerId, OrderId};
use domain::{NewOrder, Order};

use crate::Result;

/// Core trait for order store implementations.
///
/// Orders are append-only from the point of view of checkout: they are
/// inserted once and never modified.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order, assigning its id and creation time.
    async fn insert(&self, order: NewOrder) -> Result<Order>;

    /// Retrieves an order by id.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves a buyer's orders, newest first.
    async fn list_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>>;

    /// Counts all orders.
    async fn count(&self) -> Result<u64>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        (**self).insert(order).await
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        (**self).get(id).await
    }

    async fn list_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        (**self).list_for_buyer(buyer_id).await
    }

    async fn count(&self) -> Result<u64> {
        (**self).count().await
    }
}
