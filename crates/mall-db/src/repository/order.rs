//! # Order Repository
//!
//! The order aggregate (order + line items) and its status transitions.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. PLACE (one transaction)                                            │
//! │     ├── reserve stock per line, lines sorted by StockUnit              │
//! │     │   └── first short line → ROLLBACK → OutOfStock                   │
//! │     ├── INSERT orders (PendingPayment, unpaid, not shipped)            │
//! │     └── INSERT order_items (price snapshots)                           │
//! │                                                                         │
//! │  2a. CANCEL (one transaction)                                          │
//! │     ├── UPDATE status WHERE status = PendingPayment                    │
//! │     └── release every line's stock                                     │
//! │                                                                         │
//! │  2b. PAY → see PaymentRepository::settle_payment                       │
//! │                                                                         │
//! │  3. SHIP / CONFIRM: transition_order(from, to), conditional UPDATE     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::inventory::{release_on, reserve_on};
use crate::error::DbResult;
use crate::store::{OrderStore, PlaceOrderOutcome, ReserveOutcome};
use mall_core::{NewOrder, Order, OrderItem, OrderStatus, PageRequest};

pub(crate) const ORDER_COLUMNS: &str = r#"
    id, order_no, user_id,
    total_amount_cents, freight_amount_cents, discount_amount_cents, pay_amount_cents,
    status, payment_status, delivery_status,
    receiver_name, receiver_phone, receiver_address, buyer_message,
    created_at, updated_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, order_id, product_id, sku_id,
    product_name, sku_name, sku_code,
    unit_price_cents, quantity, total_amount_cents, created_at
"#;

/// Repository for orders and order items.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn place_order(&self, order: &NewOrder) -> DbResult<PlaceOrderOutcome> {
        debug!(order_no = %order.order_no, lines = order.items.len(), "Placing order");

        let mut tx = self.pool.begin().await?;

        // Consistent lock order across concurrent orders.
        let mut lines: Vec<_> = order.items.iter().enumerate().collect();
        lines.sort_by_key(|(index, item)| (item.stock_unit(), *index));

        for (index, item) in lines {
            let unit = item.stock_unit();
            let available = match reserve_on(&mut tx, unit, item.quantity).await? {
                ReserveOutcome::Reserved => continue,
                ReserveOutcome::Insufficient { available } => available,
                ReserveOutcome::UnknownUnit => 0,
            };

            tx.rollback().await?;
            debug!(
                order_no = %order.order_no,
                line = index,
                unit = %unit,
                available,
                requested = item.quantity,
                "Order rejected, stock rolled back"
            );
            return Ok(PlaceOrderOutcome::OutOfStock {
                line: index,
                unit,
                available,
                requested: item.quantity,
            });
        }

        let now = Utc::now();
        let status = OrderStatus::PendingPayment;

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                order_no, user_id,
                total_amount_cents, freight_amount_cents, discount_amount_cents, pay_amount_cents,
                status, payment_status, delivery_status,
                receiver_name, receiver_phone, receiver_address, buyer_message,
                created_at, updated_at
            ) VALUES (
                ?1, ?2,
                ?3, ?4, ?5, ?6,
                ?7, ?8, ?9,
                ?10, ?11, ?12, ?13,
                ?14, ?14
            )
            RETURNING id
            "#,
        )
        .bind(&order.order_no)
        .bind(order.user_id)
        .bind(order.total_amount.cents())
        .bind(order.freight_amount.cents())
        .bind(order.discount_amount.cents())
        .bind(order.pay_amount.cents())
        .bind(status)
        .bind(status.payment_status())
        .bind(status.delivery_status())
        .bind(&order.shipping.receiver_name)
        .bind(&order.shipping.receiver_phone)
        .bind(&order.shipping.receiver_address)
        .bind(&order.buyer_message)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, product_id, sku_id,
                    product_name, sku_name, sku_code,
                    unit_price_cents, quantity, total_amount_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.sku_id)
            .bind(&item.product_name)
            .bind(&item.sku_name)
            .bind(&item.sku_code)
            .bind(item.unit_price.cents())
            .bind(item.quantity)
            .bind(item.total_amount.cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let placed = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(
            order_id,
            order_no = %order.order_no,
            pay_amount = %order.pay_amount,
            "Order placed"
        );

        // Just inserted inside the committed transaction.
        match placed {
            Some(placed) => Ok(PlaceOrderOutcome::Placed(placed)),
            None => Err(crate::error::DbError::not_found("Order", order_id)),
        }
    }

    async fn get_order(&self, id: i64) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    async fn get_order_items(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id");
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn list_user_orders(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> DbResult<(Vec<Order>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC, id DESC
            LIMIT ?3 OFFSET ?4
            "#
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((orders, total))
    }

    async fn transition_order(&self, id: i64, from: OrderStatus, to: OrderStatus) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let moved = transition_on(&mut conn, id, from, to).await?;
        if moved {
            info!(order_id = id, from = %from, to = %to, "Order status changed");
        }
        Ok(moved)
    }

    async fn cancel_order(&self, id: i64) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        if !transition_on(&mut tx, id, OrderStatus::PendingPayment, OrderStatus::Cancelled).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id");
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

        for item in &items {
            release_on(&mut tx, item.stock_unit(), item.quantity).await?;
        }

        tx.commit().await?;
        info!(order_id = id, lines = items.len(), "Order cancelled, stock released");
        Ok(true)
    }

    async fn set_order_status(&self, id: i64, status: OrderStatus) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?2,
                payment_status = ?3,
                delivery_status = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(status.payment_status())
        .bind(status.delivery_status())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() == 1;
        if updated {
            info!(order_id = id, status = %status, "Order status set administratively");
        }
        Ok(updated)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn fetch_order(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(order)
}

/// Conditional `from` → `to` update keeping the facets in step.
pub(crate) async fn transition_on(
    conn: &mut SqliteConnection,
    id: i64,
    from: OrderStatus,
    to: OrderStatus,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = ?3,
            payment_status = ?4,
            delivery_status = ?5,
            updated_at = ?6
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(to.payment_status())
    .bind(to.delivery_status())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InventoryLedger;
    use crate::{Database, DbConfig};
    use mall_core::{
        DeliveryStatus, Money, NewOrderItem, OrderPaymentStatus, SaleStatus, ShippingInfo,
        StockUnit, UserStatus,
    };

    struct Fixture {
        db: Database,
        user_id: i64,
        mug: i64,
        sku: i64,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let user = catalog.insert_user("bob", UserStatus::Active).await.unwrap();
        let mug = catalog
            .insert_product("Mug", Money::from_cents(1500), 3, SaleStatus::OnSale)
            .await
            .unwrap();
        let shirt = catalog
            .insert_product("Shirt", Money::from_cents(5000), 0, SaleStatus::OnSale)
            .await
            .unwrap();
        let sku = catalog
            .insert_sku(shirt.id, "SH-M-RED", "Red / M", Money::from_cents(9900), 5, SaleStatus::OnSale)
            .await
            .unwrap();
        Fixture {
            db,
            user_id: user.id,
            mug: mug.id,
            sku: sku.id,
        }
    }

    fn item(product_id: i64, sku_id: Option<i64>, price: i64, quantity: i64) -> NewOrderItem {
        NewOrderItem {
            product_id,
            sku_id,
            product_name: "Item".to_string(),
            sku_name: sku_id.map(|_| "Variant".to_string()),
            sku_code: None,
            unit_price: Money::from_cents(price),
            quantity,
            total_amount: Money::from_cents(price * quantity),
        }
    }

    fn new_order(order_no: &str, user_id: i64, items: Vec<NewOrderItem>) -> NewOrder {
        let total = items.iter().map(|i| i.total_amount.cents()).sum();
        NewOrder {
            order_no: order_no.to_string(),
            user_id,
            total_amount: Money::from_cents(total),
            freight_amount: Money::zero(),
            discount_amount: Money::zero(),
            pay_amount: Money::from_cents(total),
            shipping: ShippingInfo {
                receiver_name: "Bob".to_string(),
                receiver_phone: "13800138000".to_string(),
                receiver_address: "2 Main St".to_string(),
            },
            buyer_message: None,
            items,
        }
    }

    fn placed(outcome: PlaceOrderOutcome) -> Order {
        match outcome {
            PlaceOrderOutcome::Placed(order) => order,
            other => panic!("expected Placed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_place_order_persists_lines_and_reserves() {
        let f = fixture().await;
        let orders = f.db.orders();

        let order = placed(
            orders
                .place_order(&new_order(
                    "ORD1",
                    f.user_id,
                    vec![item(f.mug, None, 1500, 2), item(0, Some(f.sku), 9900, 1)],
                ))
                .await
                .unwrap(),
        );

        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.payment_status, OrderPaymentStatus::Unpaid);
        assert_eq!(order.delivery_status, DeliveryStatus::NotShipped);
        assert_eq!(order.pay_amount_cents, 12900);

        let items = orders.get_order_items(order.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].sku_id, Some(f.sku));

        let ledger = f.db.inventory();
        assert_eq!(ledger.available(StockUnit::Product(f.mug)).await.unwrap(), Some(1));
        assert_eq!(ledger.available(StockUnit::Sku(f.sku)).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_short_line_rolls_back_everything() {
        let f = fixture().await;
        let orders = f.db.orders();

        let outcome = orders
            .place_order(&new_order(
                "ORD2",
                f.user_id,
                vec![item(0, Some(f.sku), 9900, 2), item(f.mug, None, 1500, 4)],
            ))
            .await
            .unwrap();

        match outcome {
            PlaceOrderOutcome::OutOfStock {
                line,
                available,
                requested,
                ..
            } => {
                assert_eq!(line, 1);
                assert_eq!(available, 3);
                assert_eq!(requested, 4);
            }
            other => panic!("expected OutOfStock, got {:?}", other),
        }

        let ledger = f.db.inventory();
        assert_eq!(ledger.available(StockUnit::Sku(f.sku)).await.unwrap(), Some(5));
        assert_eq!(ledger.available(StockUnit::Product(f.mug)).await.unwrap(), Some(3));

        let (listed, total) = orders
            .list_user_orders(f.user_id, None, PageRequest { page: 1, page_size: 20 })
            .await
            .unwrap();
        assert!(listed.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_cancel_releases_stock_once() {
        let f = fixture().await;
        let orders = f.db.orders();
        let order = placed(
            orders
                .place_order(&new_order("ORD3", f.user_id, vec![item(f.mug, None, 1500, 3)]))
                .await
                .unwrap(),
        );

        assert!(orders.cancel_order(order.id).await.unwrap());
        assert!(!orders.cancel_order(order.id).await.unwrap());

        let ledger = f.db.inventory();
        assert_eq!(ledger.available(StockUnit::Product(f.mug)).await.unwrap(), Some(3));

        let cancelled = orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let f = fixture().await;
        let orders = f.db.orders();
        let order = placed(
            orders
                .place_order(&new_order("ORD4", f.user_id, vec![item(f.mug, None, 1500, 1)]))
                .await
                .unwrap(),
        );

        assert!(!orders
            .transition_order(order.id, OrderStatus::Shipped, OrderStatus::Completed)
            .await
            .unwrap());
        assert!(orders
            .transition_order(order.id, OrderStatus::PendingPayment, OrderStatus::AwaitingShipment)
            .await
            .unwrap());

        let paid = orders.get_order(order.id).await.unwrap().unwrap();
        assert!(paid.is_paid());
    }

    #[tokio::test]
    async fn test_set_status_updates_facets() {
        let f = fixture().await;
        let orders = f.db.orders();
        let order = placed(
            orders
                .place_order(&new_order("ORD5", f.user_id, vec![item(f.mug, None, 1500, 1)]))
                .await
                .unwrap(),
        );

        assert!(orders.set_order_status(order.id, OrderStatus::Shipped).await.unwrap());
        let shipped = orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(shipped.delivery_status, DeliveryStatus::Shipped);
        assert_eq!(shipped.payment_status, OrderPaymentStatus::Paid);

        assert!(!orders.set_order_status(9999, OrderStatus::Shipped).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_filters_and_pages_newest_first() {
        let f = fixture().await;
        let orders = f.db.orders();
        let mut ids = Vec::new();
        for n in 0..3 {
            let order = placed(
                orders
                    .place_order(&new_order(&format!("ORD-L{n}"), f.user_id, vec![item(f.mug, None, 1500, 1)]))
                    .await
                    .unwrap(),
            );
            ids.push(order.id);
        }
        orders.cancel_order(ids[0]).await.unwrap();

        let (page, total) = orders
            .list_user_orders(f.user_id, None, PageRequest { page: 1, page_size: 2 })
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.iter().map(|o| o.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let (cancelled, total) = orders
            .list_user_orders(
                f.user_id,
                Some(OrderStatus::Cancelled),
                PageRequest { page: 1, page_size: 20 },
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(cancelled[0].id, ids[0]);
    }
}
