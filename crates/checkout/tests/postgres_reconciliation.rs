//! PostgreSQL reconciliation log tests
//!
//! These need Docker and are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p checkout --test postgres_reconciliation -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use checkout::{
    PostgresReconciliationLog, ReconciliationEntry, ReconciliationKind, ReconciliationLog,
};
use common::{BuyerId, OrderId};
use domain::{CartLine, Money};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            store::run_migrations(&temp_pool).await.unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;
    let pool = PgPool::connect(&info.connection_string).await.unwrap();
    sqlx::query("TRUNCATE TABLE reconciliation_entries")
        .execute(&pool)
        .await
        .unwrap();
    pool
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn entries_survive_a_new_log_instance() {
    let pool = get_test_pool().await;
    let buyer = BuyerId::new();
    let order_id = OrderId::new();
    let lines = vec![CartLine::new("P1", "M", 2, Money::from_cents(1000))];

    let log = PostgresReconciliationLog::new(pool.clone());
    log.record(
        ReconciliationEntry::new(
            ReconciliationKind::PersistenceFailed,
            buyer,
            Money::from_cents(2000),
            "order insert failed",
        )
        .with_transaction("txn-0001")
        .with_lines(lines.clone()),
    )
    .await
    .unwrap();
    log.record(
        ReconciliationEntry::new(
            ReconciliationKind::InventoryAdjustmentFailed,
            buyer,
            Money::from_cents(1000),
            "no matching stock",
        )
        .with_order(order_id),
    )
    .await
    .unwrap();

    // A fresh instance over the same database sees both entries.
    let reopened = PostgresReconciliationLog::new(pool);
    let entries = reopened.entries().await.unwrap();
    assert_eq!(entries.len(), 2);

    let charged = &entries[0];
    assert_eq!(charged.kind, ReconciliationKind::PersistenceFailed);
    assert_eq!(charged.buyer_id, buyer);
    assert_eq!(charged.amount, Money::from_cents(2000));
    assert_eq!(charged.transaction_id.as_deref(), Some("txn-0001"));
    assert_eq!(charged.order_id, None);
    assert_eq!(charged.lines, lines);

    let stock = &entries[1];
    assert_eq!(stock.kind, ReconciliationKind::InventoryAdjustmentFailed);
    assert_eq!(stock.order_id, Some(order_id));
    assert!(stock.transaction_id.is_none());
    assert!(stock.lines.is_empty());
}
