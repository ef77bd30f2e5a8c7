//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::CategoryId;
use domain::{Money, NewProduct, Product, ProductId, Variation};
use serde::{Deserialize, Serialize};
use store::CatalogStoreExt;

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in major units.
    pub price: f64,
    pub category_id: CategoryId,
    #[serde(default)]
    pub variations: Vec<VariationDto>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ProductRequest {
    fn into_new_product(self) -> Result<NewProduct, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("name is required".to_string()));
        }
        Ok(NewProduct {
            name: self.name,
            description: self.description,
            price: Money::from_major_units(self.price)?,
            category_id: self.category_id,
            variations: self
                .variations
                .into_iter()
                .map(|v| Variation::new(v.size, v.quantity))
                .collect(),
            keywords: self.keywords,
        })
    }
}

/// Body of `POST /product-filters`.
#[derive(Debug, Default, Deserialize)]
pub struct FilterRequest {
    /// Category ids; empty means any category.
    #[serde(default)]
    pub checked: Vec<CategoryId>,
    /// `[min, max]` in major units; empty means any price.
    #[serde(default)]
    pub radio: Vec<f64>,
}

impl FilterRequest {
    fn price_range(&self) -> Result<Option<(Money, Money)>, ApiError> {
        match self.radio.as_slice() {
            [] => Ok(None),
            [min, max] => Ok(Some((
                Money::from_major_units(*min)?,
                Money::from_major_units(*max)?,
            ))),
            _ => Err(ApiError::BadRequest(
                "radio must be empty or [min, max]".to_string(),
            )),
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize, Deserialize)]
pub struct VariationDto {
    pub size: String,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: f64,
    pub category_id: String,
    pub variations: Vec<VariationDto>,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            slug: product.slug,
            description: product.description,
            price: product.price.as_major_units(),
            category_id: product.category_id.to_string(),
            variations: product
                .variations
                .into_iter()
                .map(|v| VariationDto {
                    size: v.size.to_string(),
                    quantity: v.quantity,
                })
                .collect(),
            keywords: product.keywords,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub count: usize,
    pub products: Vec<ProductResponse>,
}

impl From<Vec<Product>> for ProductListResponse {
    fn from(products: Vec<Product>) -> Self {
        Self {
            count: products.len(),
            products: products.into_iter().map(ProductResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductCountResponse {
    pub total: u64,
}

// -- Handlers --

/// POST /api/v1/product/create-product
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = Product::create(req.into_new_product()?)?;
    let product = state.catalog.insert_product(product).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /api/v1/product/update-product/{id}
#[tracing::instrument(skip(state, req))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .catalog
        .update_product(&ProductId::new(id), req.into_new_product()?)
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /api/v1/product/delete-product/{id}
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.catalog.delete_product(&ProductId::new(id.clone())).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Product {id} not found")))
    }
}

/// GET /api/v1/product/get-product: newest products first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let products = state.catalog.list_recent().await?;
    Ok(Json(products.into()))
}

/// GET /api/v1/product/get-product/{slug}
#[tracing::instrument(skip(state))]
pub async fn get_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .catalog
        .get_product_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {slug} not found")))?;
    Ok(Json(product.into()))
}

/// POST /api/v1/product/product-filters
#[tracing::instrument(skip(state))]
pub async fn filter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let price_range = req.price_range()?;
    let products = state.catalog.filter(req.checked, price_range).await?;
    Ok(Json(products.into()))
}

/// GET /api/v1/product/product-count
#[tracing::instrument(skip(state))]
pub async fn count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductCountResponse>, ApiError> {
    let total = state.catalog.count_products().await?;
    Ok(Json(ProductCountResponse { total }))
}

/// GET /api/v1/product/search/{keyword}
#[tracing::instrument(skip(state))]
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let products = state.catalog.search(&keyword).await?;
    Ok(Json(products.into()))
}

/// GET /api/v1/product/related-product/{pid}/{cid}
#[tracing::instrument(skip(state))]
pub async fn related(
    State(state): State<Arc<AppState>>,
    Path((pid, cid)): Path<(String, String)>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let category = parse_category_id(&cid)?;
    let products = state
        .catalog
        .related(&ProductId::new(pid), category)
        .await?;
    Ok(Json(products.into()))
}

/// GET /api/v1/product/product-category/{category_id}
#[tracing::instrument(skip(state))]
pub async fn by_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<String>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let category = parse_category_id(&category_id)?;
    let products = state.catalog.in_category(category).await?;
    Ok(Json(products.into()))
}

fn parse_category_id(s: &str) -> Result<CategoryId, ApiError> {
    CategoryId::parse(s).map_err(|e| ApiError::BadRequest(format!("Invalid category id: {e}")))
}
