use std::sync::Arc;

use async_trait::async_trait;
use common::CategoryId;
use domain::{Money, NewProduct, Product, ProductId, Size};

use crate::Result;
use crate::query::{MAX_LISTED_PRODUCTS, ProductQuery, RELATED_PRODUCTS_LIMIT};

/// Core trait for catalog store implementations.
///
/// The catalog owns product records. Checkout only ever reads products
/// and applies conditional quantity adjustments to one variation.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a new product.
    ///
    /// Fails with `Conflict` if the id or slug is already taken.
    async fn insert_product(&self, product: Product) -> Result<Product>;

    /// Replaces the editable fields of an existing product.
    ///
    /// Fails with `NotFound` if the product does not exist.
    async fn update_product(&self, id: &ProductId, input: NewProduct) -> Result<Product>;

    /// Deletes a product. Returns false if nothing was deleted.
    async fn delete_product(&self, id: &ProductId) -> Result<bool>;

    /// Retrieves a product by id.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Retrieves a product by slug.
    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>>;

    /// Retrieves products matching a query, newest first.
    async fn find_products(&self, query: ProductQuery) -> Result<Vec<Product>>;

    /// Counts all products.
    async fn count_products(&self) -> Result<u64>;

    /// Adds a signed `delta` to the quantity of the variation matching
    /// `product_id` and `size`.
    ///
    /// The check and the write are one atomic step: the adjustment only
    /// applies when the product and size exist and the resulting quantity
    /// is not negative. Returns the updated product, or `None` when
    /// nothing matched (no write happened).
    async fn adjust_variation_quantity(
        &self,
        product_id: &ProductId,
        size: &Size,
        delta: i64,
    ) -> Result<Option<Product>>;
}

/// Extension trait providing the catalog browsing queries.
#[async_trait]
pub trait CatalogStoreExt: CatalogStore {
    /// Lists the most recent products.
    async fn list_recent(&self) -> Result<Vec<Product>> {
        self.find_products(ProductQuery::new().limit(MAX_LISTED_PRODUCTS))
            .await
    }

    /// Searches name, description and keywords.
    async fn search(&self, keyword: &str) -> Result<Vec<Product>> {
        self.find_products(ProductQuery::new().keyword(keyword))
            .await
    }

    /// Filters by any of `categories` and an optional inclusive price range.
    async fn filter(
        &self,
        categories: Vec<CategoryId>,
        price_range: Option<(Money, Money)>,
    ) -> Result<Vec<Product>> {
        let mut query = ProductQuery::new().in_categories(categories);
        if let Some((min, max)) = price_range {
            query = query.price_between(min, max);
        }
        self.find_products(query).await
    }

    /// Products in the same category, excluding the given product.
    async fn related(&self, product_id: &ProductId, category: CategoryId) -> Result<Vec<Product>> {
        self.find_products(
            ProductQuery::new()
                .in_category(category)
                .excluding(product_id.clone())
                .limit(RELATED_PRODUCTS_LIMIT),
        )
        .await
    }

    /// All products of one category.
    async fn in_category(&self, category: CategoryId) -> Result<Vec<Product>> {
        self.find_products(ProductQuery::new().in_category(category))
            .await
    }

    /// Decrements one variation's stock, never below zero.
    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        size: &Size,
        quantity: u32,
    ) -> Result<Option<Product>> {
        self.adjust_variation_quantity(product_id, size, -i64::from(quantity))
            .await
    }
}

// Blanket implementation for all CatalogStore implementations
impl<T: CatalogStore + ?Sized> CatalogStoreExt for T {}

#[async_trait]
impl<T: CatalogStore + ?Sized> CatalogStore for Arc<T> {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        (**self).insert_product(product).await
    }

    async fn update_product(&self, id: &ProductId, input: NewProduct) -> Result<Product> {
        (**self).update_product(id, input).await
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool> {
        (**self).delete_product(id).await
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        (**self).get_product(id).await
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        (**self).get_product_by_slug(slug).await
    }

    async fn find_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        (**self).find_products(query).await
    }

    async fn count_products(&self) -> Result<u64> {
        (**self).count_products().await
    }

    async fn adjust_variation_quantity(
        &self,
        product_id: &ProductId,
        size: &Size,
        delta: i64,
    ) -> Result<Option<Product>> {
        (**self)
            .adjust_variation_quantity(product_id, size, delta)
            .await
    }
}
