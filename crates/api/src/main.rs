//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::{Config, GatewaySettings, LogFormat};
use checkout::{
    BraintreeGateway, CheckoutConfig, InMemoryReconciliationLog, PaymentGateway,
    PostgresReconciliationLog, ReconciliationLog, SandboxGateway,
};
use sqlx::postgres::PgPoolOptions;
use store::{
    CatalogStore, InMemoryCatalogStore, InMemoryOrderStore, OrderStore, PostgresCatalogStore,
    PostgresOrderStore,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn describe_metrics() {
    metrics::describe_counter!("checkout_attempts_total", "Checkouts started");
    metrics::describe_counter!("checkout_completed_total", "Checkouts that produced an order");
    metrics::describe_counter!("checkout_failed_total", "Checkouts that failed, by reason");
    metrics::describe_histogram!(
        "checkout_duration_seconds",
        metrics::Unit::Seconds,
        "End-to-end checkout latency"
    );
    metrics::describe_histogram!(
        "gateway_sale_duration_seconds",
        metrics::Unit::Seconds,
        "Latency of a single gateway sale call"
    );
    metrics::describe_counter!(
        "inventory_adjustment_failed_total",
        "Order lines whose stock was not decremented"
    );
    metrics::describe_counter!(
        "reconciliation_entries_total",
        "Reconciliation entries written, by kind"
    );
    metrics::describe_counter!(
        "stock_adjustments_total",
        "Conditional stock updates, by outcome"
    );
    metrics::describe_counter!("client_tokens_issued_total", "Gateway client tokens issued");
}

struct Stores {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    reconciliation: Arc<dyn ReconciliationLog>,
}

async fn build_stores(config: &Config) -> Stores {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to Postgres");
            store::run_migrations(&pool)
                .await
                .expect("failed to run migrations");
            tracing::info!("using Postgres stores");
            Stores {
                catalog: Arc::new(PostgresCatalogStore::new(pool.clone())),
                orders: Arc::new(PostgresOrderStore::new(pool.clone())),
                reconciliation: Arc::new(PostgresReconciliationLog::new(pool)),
            }
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            Stores {
                catalog: Arc::new(InMemoryCatalogStore::new()),
                orders: Arc::new(InMemoryOrderStore::new()),
                reconciliation: Arc::new(InMemoryReconciliationLog::new()),
            }
        }
    }
}

fn build_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    match &config.gateway {
        GatewaySettings::Sandbox => {
            tracing::warn!("using the sandbox payment gateway, no real charges are made");
            Arc::new(SandboxGateway::new())
        }
        GatewaySettings::Braintree(braintree) => Arc::new(
            BraintreeGateway::new(braintree.clone()).expect("failed to build Braintree client"),
        ),
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration (.env first, if present)
    let _ = dotenvy::dotenv();
    let config = Config::from_env().expect("invalid configuration");

    // 2. Initialize tracing
    init_tracing(&config);

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe_metrics();

    // 4. Wire stores, gateway and checkout
    let stores = build_stores(&config).await;
    let gateway = build_gateway(&config);
    let state = Arc::new(AppState::new(
        stores.catalog,
        stores.orders,
        gateway,
        stores.reconciliation,
        CheckoutConfig {
            gateway_timeout: config.gateway_timeout,
            ..CheckoutConfig::default()
        },
    ));

    // 5. Build the application
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
