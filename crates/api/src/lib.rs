//! HTTP API server for the storefront.
//!
//! Provides the checkout endpoints (client token, pay), the product
//! catalog, buyer order history and operator views, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let checkout = Router::new()
        .route("/token", post(routes::checkout::token))
        .route("/pay", post(routes::checkout::pay))
        .route("/reconciliation", get(routes::checkout::reconciliation));

    let products = Router::new()
        .route("/create-product", post(routes::products::create))
        .route("/update-product/{id}", put(routes::products::update))
        .route("/delete-product/{id}", delete(routes::products::remove))
        .route("/get-product", get(routes::products::list))
        .route("/get-product/{slug}", get(routes::products::get_by_slug))
        .route("/product-filters", post(routes::products::filter))
        .route("/product-count", get(routes::products::count))
        .route("/search/{keyword}", get(routes::products::search))
        .route(
            "/related-product/{pid}/{cid}",
            get(routes::products::related),
        )
        .route(
            "/product-category/{category_id}",
            get(routes::products::by_category),
        );

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1/checkout", checkout)
        .nest("/api/v1/product", products)
        .route("/api/v1/orders", get(routes::orders::list))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
