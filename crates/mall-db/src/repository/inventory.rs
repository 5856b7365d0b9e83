//! # Inventory Repository
//!
//! Stock counters live on `product_skus.stock` (lines with a SKU) and
//! `products.stock` (lines without one).
//!
//! ## Check-and-Decrement
//! ```text
//! UPDATE product_skus SET stock = stock - :qty
//!  WHERE id = :id AND stock >= :qty        ← one statement, no read first
//!
//! rows_affected = 1  → Reserved
//! rows_affected = 0  → re-read: Insufficient { available } | UnknownUnit
//! ```
//!
//! The `*_on` functions run on any connection so that order placement and
//! cancellation can move stock inside their own transactions.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::{InventoryLedger, ReserveOutcome};
use mall_core::StockUnit;

/// Repository for stock counters.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }
}

#[async_trait]
impl InventoryLedger for InventoryRepository {
    async fn reserve(&self, unit: StockUnit, quantity: i64) -> DbResult<ReserveOutcome> {
        let mut conn = self.pool.acquire().await?;
        reserve_on(&mut conn, unit, quantity).await
    }

    async fn release(&self, unit: StockUnit, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        release_on(&mut conn, unit, quantity).await
    }

    async fn available(&self, unit: StockUnit) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        available_on(&mut conn, unit).await
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

fn table(unit: StockUnit) -> (&'static str, i64) {
    match unit {
        StockUnit::Product(id) => ("products", id),
        StockUnit::Sku(id) => ("product_skus", id),
    }
}

fn ensure_positive(quantity: i64) -> DbResult<()> {
    if quantity <= 0 {
        return Err(DbError::Internal(format!(
            "stock movement must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

/// Atomic check-and-decrement of one unit.
pub(crate) async fn reserve_on(
    conn: &mut SqliteConnection,
    unit: StockUnit,
    quantity: i64,
) -> DbResult<ReserveOutcome> {
    ensure_positive(quantity)?;
    let (table, id) = table(unit);

    let sql = format!(
        "UPDATE {table} SET stock = stock - ?1, updated_at = ?2 WHERE id = ?3 AND stock >= ?1"
    );
    let result = sqlx::query(&sql)
        .bind(quantity)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 1 {
        debug!(unit = %unit, quantity, "Stock reserved");
        return Ok(ReserveOutcome::Reserved);
    }

    let outcome = match available_on(conn, unit).await? {
        Some(available) => ReserveOutcome::Insufficient { available },
        None => ReserveOutcome::UnknownUnit,
    };
    debug!(unit = %unit, quantity, ?outcome, "Stock reservation refused");
    Ok(outcome)
}

/// Returns stock to one unit.
pub(crate) async fn release_on(
    conn: &mut SqliteConnection,
    unit: StockUnit,
    quantity: i64,
) -> DbResult<()> {
    ensure_positive(quantity)?;
    let (table, id) = table(unit);

    let sql = format!("UPDATE {table} SET stock = stock + ?1, updated_at = ?2 WHERE id = ?3");
    sqlx::query(&sql)
        .bind(quantity)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

    debug!(unit = %unit, quantity, "Stock released");
    Ok(())
}

pub(crate) async fn available_on(
    conn: &mut SqliteConnection,
    unit: StockUnit,
) -> DbResult<Option<i64>> {
    let (table, id) = table(unit);
    let sql = format!("SELECT stock FROM {table} WHERE id = ?1");
    let stock: Option<i64> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(stock)
}

// =============================================================================
// Unit Tests
// =============================================================================
