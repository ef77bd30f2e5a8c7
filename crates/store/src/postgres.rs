use std::collections::HashMap;

use async_trait::async_trait;
use common::{BuyerId, CategoryId, OrderId};
use domain::{Money, NewOrder, NewProduct, Order, Product, ProductId, Size, Variation};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{CatalogStore, OrderStore, ProductQuery, Result, StoreError};

const PRODUCT_COLUMNS: &str =
    "id, name, slug, description, price_cents, category_id, keywords, created_at, updated_at";

/// Runs the database migrations for both stores.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

fn map_write_error(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(format!("{what} already exists"));
    }
    StoreError::Database(e)
}

/// PostgreSQL-backed catalog store.
#[derive(Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Creates a new PostgreSQL catalog store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_product(row: &PgRow, variations: Vec<Variation>) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            category_id: CategoryId::from_uuid(row.try_get::<Uuid, _>("category_id")?),
            variations,
            keywords: row.try_get("keywords")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Loads variations for the given products, keyed by product id.
    async fn load_variations<'e, E>(
        executor: E,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<Variation>>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query(
            r#"
            SELECT product_id, size, quantity
            FROM product_variations
            WHERE product_id = ANY($1)
            ORDER BY product_id, position
            "#,
        )
        .bind(ids)
        .fetch_all(executor)
        .await?;

        let mut by_product: HashMap<String, Vec<Variation>> = HashMap::new();
        for row in rows {
            let quantity: i32 = row.try_get("quantity")?;
            let quantity = u32::try_from(quantity)
                .map_err(|_| StoreError::InvalidRecord(format!("negative quantity {quantity}")))?;
            by_product
                .entry(row.try_get("product_id")?)
                .or_default()
                .push(Variation::new(row.try_get::<String, _>("size")?, quantity));
        }
        Ok(by_product)
    }

    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<Product>> {
        let ids = rows
            .iter()
            .map(|r| r.try_get::<String, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut variations = Self::load_variations(&self.pool, &ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                Self::row_to_product(row, variations.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn write_variations(
        tx: &mut Transaction<'_, Postgres>,
        product: &Product,
    ) -> Result<()> {
        sqlx::query("DELETE FROM product_variations WHERE product_id = $1")
            .bind(product.id.as_str())
            .execute(&mut **tx)
            .await?;

        for (position, variation) in product.variations.iter().enumerate() {
            let quantity = i32::try_from(variation.quantity).map_err(|_| {
                StoreError::InvalidRecord(format!("quantity {} too large", variation.quantity))
            })?;
            sqlx::query(
                r#"
                INSERT INTO product_variations (product_id, size, quantity, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(product.id.as_str())
            .bind(variation.size.as_str())
            .bind(quantity)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, slug, description, price_cents, category_id, keywords, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.category_id.as_uuid())
        .bind(&product.keywords)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &format!("product {}", product.id)))?;

        Self::write_variations(&mut tx, &product).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn update_product(&self, id: &ProductId, input: NewProduct) -> Result<Product> {
        let mut product = self
            .get_product(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        product.update(input)?;

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, slug = $3, description = $4, price_cents = $5,
                category_id = $6, keywords = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.category_id.as_uuid())
        .bind(&product.keywords)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &format!("slug {}", product.slug)))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {id}")));
        }

        Self::write_variations(&mut tx, &product).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(self.hydrate(rows).await?.into_iter().next())
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_all(&self.pool)
        .await?;
        Ok(self.hydrate(rows).await?.into_iter().next())
    }

    async fn find_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"));

        if let Some(ref categories) = query.categories {
            let ids: Vec<Uuid> = categories.iter().map(|c| c.as_uuid()).collect();
            builder.push(" AND category_id = ANY(").push_bind(ids).push(")");
        }
        if let Some(min) = query.min_price {
            builder.push(" AND price_cents >= ").push_bind(min.cents());
        }
        if let Some(max) = query.max_price {
            builder.push(" AND price_cents <= ").push_bind(max.cents());
        }
        if let Some(ref keyword) = query.keyword {
            let pattern = format!("%{}%", escape_like(keyword));
            builder
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(" OR ")
                .push_bind(keyword.clone())
                .push(" = ANY(keywords))");
        }
        if let Some(ref excluded) = query.exclude {
            builder.push(" AND id <> ").push_bind(excluded.as_str().to_string());
        }
        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn count_products(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    #[tracing::instrument(skip(self, product_id, size), fields(product_id = %product_id, size = %size))]
    async fn adjust_variation_quantity(
        &self,
        product_id: &ProductId,
        size: &Size,
        delta: i64,
    ) -> Result<Option<Product>> {
        let delta = i32::try_from(delta)
            .map_err(|_| StoreError::Conflict(format!("quantity delta {delta} out of range")))?;

        let mut tx = self.pool.begin().await?;

        // Check and write in one statement so concurrent adjustments cannot
        // both pass the non-negative guard.
        let updated = sqlx::query(
            r#"
            UPDATE product_variations
            SET quantity = quantity + $3
            WHERE product_id = $1 AND size = $2 AND quantity + $3 >= 0
            "#,
        )
        .bind(product_id.as_str())
        .bind(size.as_str())
        .bind(delta)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            metrics::counter!("stock_adjustments_total", "outcome" => "rejected").increment(1);
            tracing::debug!(delta, "no variation matched the adjustment");
            return Ok(None);
        }

        // Read back before commit; a failure here rolls the decrement back.
        let row = sqlx::query(&format!(
            "UPDATE products SET updated_at = NOW() WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product_id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            StoreError::InvalidRecord(format!("variation without product {product_id}"))
        })?;
        let mut variations =
            Self::load_variations(&mut *tx, &[product_id.as_str().to_string()]).await?;
        let product = Self::row_to_product(
            &row,
            variations.remove(product_id.as_str()).unwrap_or_default(),
        )?;

        tx.commit().await?;
        metrics::counter!("stock_adjustments_total", "outcome" => "applied").increment(1);
        Ok(Some(product))
    }
}

/// Escapes `%`, `_` and `\` so user input is matched literally by ILIKE.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            lines: serde_json::from_value(row.try_get("lines")?)?,
            payment: serde_json::from_value(row.try_get("payment")?)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let order = Order::from_new(order);

        sqlx::query(
            r#"
            INSERT INTO orders (id, buyer_id, lines, payment, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.buyer_id.as_uuid())
        .bind(serde_json::to_value(&order.lines)?)
        .bind(serde_json::to_value(&order.payment)?)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("order {}", order.id)))?;

        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, buyer_id, lines, payment, created_at FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn list_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, buyer_id, lines, payment, created_at
            FROM orders
            WHERE buyer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
