//! # Payment Repository
//!
//! Payment attempts and their terminal transitions.
//!
//! ## Payment Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Payment Lifecycle                                 │
//! │                                                                         │
//! │  INSERT (Pending) ── partial UNIQUE(order_id) WHERE status IN (0, 1)   │
//! │     │                                                                   │
//! │     ├── cancel_payment  UPDATE … WHERE status = Pending → Cancelled    │
//! │     ├── fail_payment    UPDATE … WHERE status = Pending → Failed       │
//! │     └── settle_payment  (one transaction)                              │
//! │           ├── UPDATE payment → Success WHERE status = Pending          │
//! │           │     RETURNING order_id                                     │
//! │           └── UPDATE order → AwaitingShipment                          │
//! │                 WHERE status = PendingPayment                          │
//! │                 (0 rows → ROLLBACK → OrderNotPayable)                  │
//! │                                                                         │
//! │  Whichever UPDATE commits first wins; every other caller sees 0 rows   │
//! │  and reads back the winner's terminal status.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::order::transition_on;
use crate::error::{DbError, DbResult};
use crate::store::{PaymentStore, PaymentTransition};
use mall_core::{NewPayment, OrderStatus, Payment, PaymentStatus};

const PAYMENT_COLUMNS: &str = r#"
    id, payment_no, order_id, method, amount_cents, status,
    trade_no, paid_at, created_at, updated_at
"#;

/// Repository for payment attempts.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// `Pending` → `to` for cancel / fail.
    async fn close(&self, payment_no: &str, to: PaymentStatus) -> DbResult<PaymentTransition> {
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query(
            r#"
            UPDATE order_payments SET status = ?2, updated_at = ?3
            WHERE payment_no = ?1 AND status = ?4
            "#,
        )
        .bind(payment_no)
        .bind(to)
        .bind(Utc::now())
        .bind(PaymentStatus::Pending)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            info!(payment_no = %payment_no, status = %to, "Payment closed");
            return Ok(PaymentTransition::Applied);
        }

        Ok(match status_on(&mut conn, payment_no).await? {
            Some(current) => PaymentTransition::AlreadyTerminal(current),
            None => PaymentTransition::NotFound,
        })
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn insert_payment(&self, payment: &NewPayment) -> DbResult<Payment> {
        debug!(
            payment_no = %payment.payment_no,
            order_id = payment.order_id,
            method = %payment.method,
            "Inserting payment"
        );
        let now = Utc::now();

        let sql = format!(
            r#"
            INSERT INTO order_payments (
                payment_no, order_id, method, amount_cents, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, Payment>(&sql)
            .bind(&payment.payment_no)
            .bind(payment.order_id)
            .bind(payment.method)
            .bind(payment.amount.cents())
            .bind(PaymentStatus::Pending)
            .bind(now)
            .fetch_one(&self.pool)
            .await;

        match inserted {
            Ok(row) => Ok(row),
            // Anything but the payment number is the one-active-payment index.
            Err(e) => match DbError::from(e) {
                DbError::UniqueViolation { field, .. } if !field.contains("payment_no") => Err(
                    DbError::duplicate("order_payments.order_id", payment.order_id.to_string()),
                ),
                other => Err(other),
            },
        }
    }

    async fn get_payment(&self, payment_no: &str) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM order_payments WHERE payment_no = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_no)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    async fn active_payment(&self, order_id: i64) -> DbResult<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM order_payments WHERE order_id = ?1 AND status IN (?2, ?3)"
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .bind(PaymentStatus::Pending)
            .bind(PaymentStatus::Success)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    async fn list_order_payments(&self, order_id: i64) -> DbResult<Vec<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM order_payments WHERE order_id = ?1 ORDER BY id");
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }

    async fn cancel_payment(&self, payment_no: &str) -> DbResult<PaymentTransition> {
        self.close(payment_no, PaymentStatus::Cancelled).await
    }

    async fn fail_payment(&self, payment_no: &str) -> DbResult<PaymentTransition> {
        self.close(payment_no, PaymentStatus::Failed).await
    }

    async fn settle_payment(
        &self,
        payment_no: &str,
        trade_no: &str,
        paid_at: DateTime<Utc>,
    ) -> DbResult<PaymentTransition> {
        let mut tx = self.pool.begin().await?;

        let order_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE order_payments SET
                status = ?2, trade_no = ?3, paid_at = ?4, updated_at = ?4
            WHERE payment_no = ?1 AND status = ?5
            RETURNING order_id
            "#,
        )
        .bind(payment_no)
        .bind(PaymentStatus::Success)
        .bind(trade_no)
        .bind(paid_at)
        .bind(PaymentStatus::Pending)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order_id) = order_id else {
            let current = status_on(&mut tx, payment_no).await?;
            tx.rollback().await?;
            return Ok(match current {
                Some(current) => PaymentTransition::AlreadyTerminal(current),
                None => PaymentTransition::NotFound,
            });
        };

        let paid = transition_on(
            &mut tx,
            order_id,
            OrderStatus::PendingPayment,
            OrderStatus::AwaitingShipment,
        )
        .await?;

        if !paid {
            let current: Option<OrderStatus> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = ?1")
                    .bind(order_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return match current {
                Some(current) => Ok(PaymentTransition::OrderNotPayable(current)),
                None => Err(DbError::not_found("Order", order_id)),
            };
        }

        tx.commit().await?;
        info!(
            payment_no = %payment_no,
            order_id,
            trade_no = %trade_no,
            "Payment settled, order paid"
        );
        Ok(PaymentTransition::Applied)
    }
}

async fn status_on(conn: &mut SqliteConnection, payment_no: &str) -> DbResult<Option<PaymentStatus>> {
    let status: Option<PaymentStatus> =
        sqlx::query_scalar("SELECT status FROM order_payments WHERE payment_no = ?1")
            .bind(payment_no)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(status)
}

// =============================================================================
// Unit Tests
// =============================================================================
