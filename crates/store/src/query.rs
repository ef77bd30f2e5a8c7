use common::CategoryId;
use domain::{Money, Product, ProductId};

/// Upper bound on products returned by an unfiltered listing.
pub const MAX_LISTED_PRODUCTS: usize = 99;

/// Number of products returned as "related" to another product.
pub const RELATED_PRODUCTS_LIMIT: usize = 3;

/// Builder for catalog queries.
///
/// Every set criterion must hold for a product to match. Results are
/// always ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Match products in any of these categories.
    pub categories: Option<Vec<CategoryId>>,

    /// Minimum price (inclusive).
    pub min_price: Option<Money>,

    /// Maximum price (inclusive).
    pub max_price: Option<Money>,

    /// Case-insensitive substring of name or description, or an exact keyword.
    pub keyword: Option<String>,

    /// Leave this product out of the results.
    pub exclude: Option<ProductId>,

    /// Maximum number of products to return.
    pub limit: Option<usize>,
}

impl ProductQuery {
    /// Creates a new empty query matching every product.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to products in any of the given categories.
    ///
    /// An empty list leaves the query unrestricted.
    pub fn in_categories(mut self, categories: Vec<CategoryId>) -> Self {
        self.categories = if categories.is_empty() {
            None
        } else {
            Some(categories)
        };
        self
    }

    /// Restricts to a single category.
    pub fn in_category(self, category: CategoryId) -> Self {
        self.in_categories(vec![category])
    }

    /// Restricts to an inclusive price range.
    pub fn price_between(mut self, min: Money, max: Money) -> Self {
        self.min_price = Some(min);
        self.max_price = Some(max);
        self
    }

    /// Restricts to products matching a search keyword.
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Leaves out one product.
    pub fn excluding(mut self, product_id: ProductId) -> Self {
        self.exclude = Some(product_id);
        self
    }

    /// Caps the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `product` satisfies every criterion except `limit`.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(ref categories) = self.categories
            && !categories.contains(&product.category_id)
        {
            return false;
        }
        if let Some(min) = self.min_price
            && product.price < min
        {
            return false;
        }
        if let Some(max) = self.max_price
            && product.price > max
        {
            return false;
        }
        if let Some(ref keyword) = self.keyword
            && !product.matches_keyword(keyword)
        {
            return false;
        }
        if let Some(ref excluded) = self.exclude
            && &product.id == excluded
        {
            return false;
        }
        true
    }
}
