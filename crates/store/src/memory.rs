use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{BuyerId, OrderId};
use domain::{NewOrder, NewProduct, Order, Product, ProductId, Size, slugify};
use tokio::sync::RwLock;

use crate::{CatalogStore, OrderStore, ProductQuery, Result, StoreError};

/// In-memory catalog store for testing and local runs.
///
/// Products are kept in insertion order; every adjustment runs under a
/// single write lock, which makes the check-and-decrement atomic.
#[derive(Clone, Default)]
pub struct InMemoryCatalogStore {
    products: Arc<RwLock<Vec<Product>>>,
    fail_on_adjust: Arc<AtomicBool>,
}

impl InMemoryCatalogStore {
    /// Creates a new empty in-memory catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-populated with products.
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(RwLock::new(products)),
            ..Self::default()
        }
    }

    /// Makes every quantity adjustment fail with `Unavailable`.
    pub fn set_fail_on_adjust(&self, fail: bool) {
        self.fail_on_adjust.store(fail, Ordering::SeqCst);
    }

    /// Returns the current quantity of one variation, if it exists.
    pub async fn quantity_of(&self, product_id: &ProductId, size: &Size) -> Option<u32> {
        let products = self.products.read().await;
        products
            .iter()
            .find(|p| &p.id == product_id)
            .and_then(|p| p.variation(size))
            .map(|v| v.quantity)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut products = self.products.write().await;
        if products.iter().any(|p| p.id == product.id) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        if products.iter().any(|p| p.slug == product.slug) {
            return Err(StoreError::Conflict(format!(
                "slug {} already taken",
                product.slug
            )));
        }
        products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: &ProductId, input: NewProduct) -> Result<Product> {
        let mut products = self.products.write().await;
        let index = products
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;

        let slug = slugify(&input.name);
        if products.iter().any(|p| &p.id != id && p.slug == slug) {
            return Err(StoreError::Conflict(format!("slug {slug} already taken")));
        }

        let product = &mut products[index];
        product.update(input)?;
        Ok(product.clone())
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| &p.id != id);
        Ok(products.len() != before)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| &p.id == id).cloned())
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.slug == slug).cloned())
    }

    async fn find_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        // Reverse insertion order first so equal timestamps stay newest first.
        let mut matched: Vec<Product> = products
            .iter()
            .rev()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn count_products(&self) -> Result<u64> {
        Ok(self.products.read().await.len() as u64)
    }

    async fn adjust_variation_quantity(
        &self,
        product_id: &ProductId,
        size: &Size,
        delta: i64,
    ) -> Result<Option<Product>> {
        if self.fail_on_adjust.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("catalog offline".to_string()));
        }

        let mut products = self.products.write().await;
        let adjusted = products
            .iter_mut()
            .find(|p| &p.id == product_id)
            .and_then(|product| product.adjust_variation(size, delta).map(|_| product.clone()));

        let outcome = if adjusted.is_some() { "applied" } else { "rejected" };
        metrics::counter!("stock_adjustments_total", "outcome" => outcome).increment(1);
        Ok(adjusted)
    }
}

/// In-memory order store for testing and local runs.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<Vec<Order>>>,
    fail_on_insert: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every insert fail with `Unavailable`.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.fail_on_insert.store(fail, Ordering::SeqCst);
    }

    /// Returns a snapshot of every stored order.
    pub async fn all(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        if self.fail_on_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order store offline".to_string()));
        }
        let order = Order::from_new(order);
        self.orders.write().await.push(order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matched: Vec<Order> = orders
            .iter()
            .rev()
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.orders.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CatalogStoreExt;
    use common::CategoryId;
    use domain::{CartLine, Money, PaymentResult, Variation};

    fn new_product(name: &str, cents: i64, category: CategoryId) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: format!("{name} description"),
            price: Money::from_cents(cents),
            category_id: category,
            variations: vec![Variation::new("M", 5), Variation::new("L", 1)],
            keywords: vec!["summer".to_string()],
        }
    }

    async fn seeded() -> (InMemoryCatalogStore, Product) {
        let store = InMemoryCatalogStore::new();
        let product = Product::create_with_id(
            ProductId::new("P1"),
            new_product("Blue Shirt", 1000, CategoryId::new()),
        )
        .unwrap();
        store.insert_product(product.clone()).await.unwrap();
        (store, product)
    }

    fn new_order(buyer_id: BuyerId) -> NewOrder {
        NewOrder {
            lines: vec![CartLine::new("P1", "M", 2, Money::from_cents(1000))],
            payment: PaymentResult {
                transaction_id: "txn".to_string(),
                amount: Money::from_cents(2000),
                status: "SETTLING".to_string(),
                raw: serde_json::Value::Null,
            },
            buyer_id,
        }
    }

    #[tokio::test]
    async fn insert_and_get_product() {
        let (store, product) = seeded().await;

        let by_id = store.get_product(&product.id).await.unwrap().unwrap();
        assert_eq!(by_id, product);

        let by_slug = store.get_product_by_slug("blue-shirt").await.unwrap();
        assert_eq!(by_slug.unwrap().id, product.id);
        assert_eq!(store.count_products().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts() {
        let (store, _) = seeded().await;
        let again = Product::create(new_product("Blue Shirt", 1000, CategoryId::new())).unwrap();
        let result = store.insert_product(again).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_and_delete_product() {
        let (store, product) = seeded().await;

        let updated = store
            .update_product(&product.id, new_product("Red Shirt", 1500, product.category_id))
            .await
            .unwrap();
        assert_eq!(updated.slug, "red-shirt");
        assert_eq!(updated.price.cents(), 1500);

        assert!(store.delete_product(&product.id).await.unwrap());
        assert!(!store.delete_product(&product.id).await.unwrap());
        assert!(store.get_product(&product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_onto_taken_slug_conflicts() {
        let (store, shirt) = seeded().await;
        let pants = Product::create(new_product("Pants", 2000, CategoryId::new())).unwrap();
        store.insert_product(pants.clone()).await.unwrap();

        let result = store
            .update_product(&pants.id, new_product("Blue Shirt", 2000, pants.category_id))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let unchanged = store.get_product(&pants.id).await.unwrap().unwrap();
        assert_eq!(unchanged.slug, "pants");
        let by_slug = store.get_product_by_slug("blue-shirt").await.unwrap();
        assert_eq!(by_slug.unwrap().id, shirt.id);

        // Keeping its own name is not a collision.
        let same = store
            .update_product(&shirt.id, new_product("Blue Shirt", 1200, shirt.category_id))
            .await
            .unwrap();
        assert_eq!(same.price.cents(), 1200);
    }

    #[tokio::test]
    async fn update_missing_product_not_found() {
        let store = InMemoryCatalogStore::new();
        let result = store
            .update_product(&ProductId::new("nope"), new_product("X", 1, CategoryId::new()))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn decrement_applies_and_returns_product() {
        let (store, product) = seeded().await;
        let size = Size::from("M");

        let updated = store.decrement_stock(&product.id, &size, 2).await.unwrap();
        assert_eq!(updated.unwrap().variation(&size).unwrap().quantity, 3);
        assert_eq!(store.quantity_of(&product.id, &size).await, Some(3));
    }

    #[tokio::test]
    async fn decrement_below_zero_is_rejected() {
        let (store, product) = seeded().await;
        let size = Size::from("L");

        let updated = store.decrement_stock(&product.id, &size, 2).await.unwrap();
        assert!(updated.is_none());
        assert_eq!(store.quantity_of(&product.id, &size).await, Some(1));
    }

    #[tokio::test]
    async fn decrement_unknown_size_matches_nothing() {
        let (store, product) = seeded().await;
        let updated = store
            .decrement_stock(&product.id, &Size::from("XXL"), 1)
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn concurrent_decrements_never_overdraw() {
        let (store, product) = seeded().await;
        let size = Size::from("M");

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                let id = product.id.clone();
                let size = size.clone();
                tokio::spawn(async move { store.decrement_stock(&id, &size, 1).await.unwrap() })
            })
            .collect();

        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap().is_some() {
                applied += 1;
            }
        }
        assert_eq!(applied, 5);
        assert_eq!(store.quantity_of(&product.id, &size).await, Some(0));
    }

    #[tokio::test]
    async fn fail_on_adjust_reports_unavailable() {
        let (store, product) = seeded().await;
        store.set_fail_on_adjust(true);
        let result = store.decrement_stock(&product.id, &Size::from("M"), 1).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn browsing_queries() {
        let store = InMemoryCatalogStore::new();
        let shirts = CategoryId::new();
        let shoes = CategoryId::new();

        for (name, cents, cat) in [
            ("Shirt A", 1000, shirts),
            ("Shirt B", 2000, shirts),
            ("Shirt C", 3000, shirts),
            ("Shirt D", 4000, shirts),
            ("Runner", 5000, shoes),
        ] {
            store
                .insert_product(Product::create(new_product(name, cents, cat)).unwrap())
                .await
                .unwrap();
        }

        let recent = store.list_recent().await.unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].name, "Runner");

        let in_range = store
            .filter(vec![shirts], Some((Money::from_cents(1500), Money::from_cents(3000))))
            .await
            .unwrap();
        let names: Vec<_> = in_range.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Shirt C", "Shirt B"]);

        let found = store.search("runner").await.unwrap();
        assert_eq!(found.len(), 1);

        let anchor = store.in_category(shirts).await.unwrap()[0].clone();
        let related = store.related(&anchor.id, shirts).await.unwrap();
        assert_eq!(related.len(), 3);
        assert!(related.iter().all(|p| p.id != anchor.id));
    }

    #[tokio::test]
    async fn order_insert_get_and_list() {
        let store = InMemoryOrderStore::new();
        let buyer = BuyerId::new();

        let first = store.insert(new_order(buyer)).await.unwrap();
        let second = store.insert(new_order(buyer)).await.unwrap();
        store.insert(new_order(BuyerId::new())).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.get(first.id).await.unwrap().unwrap(), first);

        let mine = store.list_for_buyer(buyer).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id);
    }

    #[tokio::test]
    async fn order_fail_on_insert() {
        let store = InMemoryOrderStore::new();
        store.set_fail_on_insert(true);
        let result = store.insert(new_order(BuyerId::new())).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
