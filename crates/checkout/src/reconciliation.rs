//! Reconciliation log for money-versus-records mismatches.
//!
//! Once a sale has settled, later failures are not rolled back. They are
//! recorded here so an operator can refund the buyer, recreate the order, or
//! correct stock by hand.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BuyerId, OrderId};
use domain::{CartLine, Money};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use store::StoreError;
use tokio::sync::RwLock;
use uuid::Uuid;

/// What went wrong after (or around) the charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationKind {
    /// Charged but no order record exists.
    PersistenceFailed,
    /// Order saved but a line's stock was not decremented.
    InventoryAdjustmentFailed,
    /// The gateway call ended without a definite answer.
    GatewayOutcomeUnknown,
}

impl ReconciliationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationKind::PersistenceFailed => "persistence_failed",
            ReconciliationKind::InventoryAdjustmentFailed => "inventory_adjustment_failed",
            ReconciliationKind::GatewayOutcomeUnknown => "gateway_outcome_unknown",
        }
    }
}

impl std::str::FromStr for ReconciliationKind {
    type Err = StoreError;

    fn from_str(s: &str) -> store::Result<Self> {
        match s {
            "persistence_failed" => Ok(ReconciliationKind::PersistenceFailed),
            "inventory_adjustment_failed" => Ok(ReconciliationKind::InventoryAdjustmentFailed),
            "gateway_outcome_unknown" => Ok(ReconciliationKind::GatewayOutcomeUnknown),
            other => Err(StoreError::InvalidRecord(format!(
                "unknown reconciliation kind {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ReconciliationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reconciliation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub id: Uuid,
    pub kind: ReconciliationKind,
    pub buyer_id: BuyerId,
    pub amount: Money,
    pub transaction_id: Option<String>,
    pub order_id: Option<OrderId>,
    /// Lines affected: the whole cart, or the single line whose stock
    /// adjustment failed.
    pub lines: Vec<CartLine>,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

impl ReconciliationEntry {
    pub fn new(
        kind: ReconciliationKind,
        buyer_id: BuyerId,
        amount: Money,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            buyer_id,
            amount,
            transaction_id: None,
            order_id: None,
            lines: Vec::new(),
            detail: detail.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_lines(mut self, lines: Vec<CartLine>) -> Self {
        self.lines = lines;
        self
    }
}

/// Durable sink for reconciliation entries.
#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    /// Records an entry.
    async fn record(&self, entry: ReconciliationEntry) -> store::Result<()>;

    /// Returns all entries, oldest first.
    async fn entries(&self) -> store::Result<Vec<ReconciliationEntry>>;
}

#[async_trait]
impl<T: ReconciliationLog + ?Sized> ReconciliationLog for Arc<T> {
    async fn record(&self, entry: ReconciliationEntry) -> store::Result<()> {
        (**self).record(entry).await
    }

    async fn entries(&self) -> store::Result<Vec<ReconciliationEntry>> {
        (**self).entries().await
    }
}

/// In-memory reconciliation log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReconciliationLog {
    entries: Arc<RwLock<Vec<ReconciliationEntry>>>,
}

impl InMemoryReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one kind, oldest first.
    pub async fn entries_of(&self, kind: ReconciliationKind) -> Vec<ReconciliationEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.kind == kind)
            .cloned()
            .collect()
    }
}

fn announce(entry: &ReconciliationEntry) {
    tracing::warn!(
        kind = %entry.kind,
        buyer_id = %entry.buyer_id,
        amount = %entry.amount,
        transaction_id = entry.transaction_id.as_deref().unwrap_or("-"),
        detail = %entry.detail,
        "reconciliation entry recorded"
    );
    metrics::counter!("reconciliation_entries_total", "kind" => entry.kind.as_str())
        .increment(1);
}

#[async_trait]
impl ReconciliationLog for InMemoryReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> store::Result<()> {
        announce(&entry);
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> store::Result<Vec<ReconciliationEntry>> {
        Ok(self.entries.read().await.clone())
    }
}

/// PostgreSQL-backed reconciliation log.
///
/// Entries survive restarts; the table comes from the shared migrations run
/// by [`store::run_migrations`].
#[derive(Clone)]
pub struct PostgresReconciliationLog {
    pool: PgPool,
}

impl PostgresReconciliationLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: PgRow) -> store::Result<ReconciliationEntry> {
        Ok(ReconciliationEntry {
            id: row.try_get("id")?,
            kind: row.try_get::<String, _>("kind")?.parse()?,
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            transaction_id: row.try_get("transaction_id")?,
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            lines: serde_json::from_value(row.try_get("lines")?)?,
            detail: row.try_get("detail")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

#[async_trait]
impl ReconciliationLog for PostgresReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> store::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_entries
                (id, kind, buyer_id, amount_cents, transaction_id, order_id, lines, detail, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.kind.as_str())
        .bind(entry.buyer_id.as_uuid())
        .bind(entry.amount.cents())
        .bind(entry.transaction_id.as_deref())
        .bind(entry.order_id.map(|id| id.as_uuid()))
        .bind(serde_json::to_value(&entry.lines)?)
        .bind(&entry.detail)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;

        announce(&entry);
        Ok(())
    }

    async fn entries(&self) -> store::Result<Vec<ReconciliationEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, buyer_id, amount_cents, transaction_id, order_id, lines, detail, recorded_at
            FROM reconciliation_entries
            ORDER BY sequence
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_entry).collect()
    }
}
