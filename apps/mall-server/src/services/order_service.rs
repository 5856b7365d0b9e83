//! # Order Lifecycle
//!
//! ## Create Order Flow
//! ```text
//! CreateOrderRequest
//!      │
//!      ▼
//! validate_order_request()        malformed? ──► ValidationError
//!      │
//!      ▼
//! user exists and active?         no ──► UserNotFound / UserInactive
//!      │
//!      ▼
//! price_line() per line           missing / off sale / wrong SKU ──► error
//!      │   (catalog snapshot, client never sends a price)
//!      ▼
//! OrderTotals::from_items()
//!      │
//!      ▼
//! OrderStore::place_order()       one transaction: reserve every line,
//!      │                          insert order + lines
//!      ├── OutOfStock ──► InsufficientStock (1-based line, name)
//!      ▼
//! Order (PendingPayment)
//! ```
//!
//! ## State Machine
//! ```text
//! PendingPayment ──pay──► AwaitingShipment ──ship──► Shipped ──confirm──► Completed
//!       │
//!       └──cancel (stock returned)──► Cancelled
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mall_core::numbering;
use mall_core::pricing::{price_line, OrderTotals};
use mall_core::validation::{normalize_page, validate_order_request, LineRequest};
use mall_core::{
    CoreError, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Payment, ShippingInfo,
    StockUnit,
};
use mall_db::{CatalogReader, InventoryLedger, OrderStore, PaymentStore, PlaceOrderOutcome};

use super::Stores;
use crate::error::ServiceResult;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of `POST /api/v1/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<LineRequest>,
    #[serde(flatten)]
    pub shipping: ShippingInfo,
    #[serde(default)]
    pub buyer_message: Option<String>,
}

/// An order with its lines and payment attempts.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

/// One page of a user's orders.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

// =============================================================================
// Service
// =============================================================================

#[derive(Clone)]
pub struct OrderService {
    catalog: Arc<dyn CatalogReader>,
    inventory: Arc<dyn InventoryLedger>,
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentStore>,
}

impl OrderService {
    pub fn new(stores: &Stores) -> Self {
        OrderService {
            catalog: stores.catalog.clone(),
            inventory: stores.inventory.clone(),
            orders: stores.orders.clone(),
            payments: stores.payments.clone(),
        }
    }

    /// Prices the request from the catalog, reserves stock, and persists
    /// the order in `PendingPayment`. Nothing is reserved or stored on error.
    pub async fn create_order(&self, user_id: i64, request: CreateOrderRequest) -> ServiceResult<Order> {
        validate_order_request(
            &request.items,
            &request.shipping,
            request.buyer_message.as_deref(),
        )?;

        let user = self
            .catalog
            .get_user(user_id)
            .await?
            .ok_or(CoreError::UserNotFound(user_id))?;
        if !user.is_active() {
            return Err(CoreError::UserInactive(user_id).into());
        }

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            items.push(self.price(line).await?);
        }
        let totals = OrderTotals::from_items(&items)?;

        let order_no = numbering::order_no(Utc::now(), &mut rand::thread_rng());
        let new_order = NewOrder {
            order_no,
            user_id,
            total_amount: totals.total_amount,
            freight_amount: totals.freight_amount,
            discount_amount: totals.discount_amount,
            pay_amount: totals.pay_amount,
            shipping: request.shipping,
            buyer_message: request
                .buyer_message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            items,
        };

        match self.orders.place_order(&new_order).await? {
            PlaceOrderOutcome::Placed(order) => {
                info!(
                    order_no = %order.order_no,
                    user_id,
                    lines = new_order.items.len(),
                    pay_amount = %order.pay_amount(),
                    "Order created"
                );
                Ok(order)
            }
            PlaceOrderOutcome::OutOfStock {
                line,
                unit,
                available,
                requested,
            } => {
                let name = new_order
                    .items
                    .get(line)
                    .map(line_name)
                    .unwrap_or_default();
                debug!(user_id, %unit, available, requested, "Order rejected, insufficient stock");
                Err(CoreError::InsufficientStock {
                    line: line + 1,
                    unit,
                    name,
                    available,
                    requested,
                }
                .into())
            }
        }
    }

    async fn price(&self, line: &LineRequest) -> ServiceResult<NewOrderItem> {
        let product = self
            .catalog
            .get_product(line.product_id)
            .await?
            .ok_or(CoreError::ProductNotFound(line.product_id))?;

        let sku = match line.sku_id {
            Some(sku_id) => Some(
                self.catalog
                    .get_sku(sku_id)
                    .await?
                    .ok_or(CoreError::SkuNotFound(sku_id))?,
            ),
            None => None,
        };

        Ok(price_line(line, &product, sku.as_ref())?)
    }

    /// The order with its lines and payment attempts.
    pub async fn get_order_detail(&self, user_id: i64, order_id: i64) -> ServiceResult<OrderDetail> {
        let order = self.owned_order(user_id, order_id).await?;
        let items = self.orders.get_order_items(order.id).await?;
        let payments = self.payments.list_order_payments(order.id).await?;
        Ok(OrderDetail {
            order,
            items,
            payments,
        })
    }

    /// A user's orders, newest first.
    pub async fn list_orders(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ServiceResult<OrderPage> {
        let page = normalize_page(page, page_size);
        let (orders, total) = self.orders.list_user_orders(user_id, status, page).await?;
        Ok(OrderPage {
            orders,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    /// Cancels a pending order and returns its stock.
    pub async fn cancel_order(&self, user_id: i64, order_id: i64) -> ServiceResult<Order> {
        let order = self.owned_order(user_id, order_id).await?;
        if order.status != OrderStatus::PendingPayment {
            return Err(invalid_status(&order, order.status, "cancel"));
        }

        if !self.orders.cancel_order(order.id).await? {
            // Paid or cancelled between the read and the update.
            let current = self.reload(order.id).await?;
            return Err(invalid_status(&order, current.status, "cancel"));
        }

        info!(order_no = %order.order_no, user_id, "Order cancelled, stock released");
        self.reload(order.id).await
    }

    /// `Shipped` → `Completed`.
    pub async fn confirm_receipt(&self, user_id: i64, order_id: i64) -> ServiceResult<Order> {
        let order = self.owned_order(user_id, order_id).await?;

        let moved = self
            .orders
            .transition_order(order.id, OrderStatus::Shipped, OrderStatus::Completed)
            .await?;
        if !moved {
            let current = self.reload(order.id).await?;
            return Err(invalid_status(&order, current.status, "confirm receipt"));
        }

        info!(order_no = %order.order_no, user_id, "Order receipt confirmed");
        self.reload(order.id).await
    }

    /// Sets any status without checking the lifecycle. Trusted callers only.
    pub async fn update_status(&self, order_id: i64, status: OrderStatus) -> ServiceResult<Order> {
        if !self.orders.set_order_status(order_id, status).await? {
            return Err(CoreError::OrderNotFound(order_id).into());
        }
        warn!(order_id, %status, "Order status set administratively");
        self.reload(order_id).await
    }

    /// Current stock of a product, or of one of its SKUs.
    pub async fn stock_level(&self, product_id: i64, sku_id: Option<i64>) -> ServiceResult<i64> {
        let unit = StockUnit::for_line(product_id, sku_id);
        let available = self.inventory.available(unit).await?;
        available.ok_or_else(|| {
            match unit {
                StockUnit::Product(id) => CoreError::ProductNotFound(id),
                StockUnit::Sku(id) => CoreError::SkuNotFound(id),
            }
            .into()
        })
    }

    async fn owned_order(&self, user_id: i64, order_id: i64) -> ServiceResult<Order> {
        let order = self.reload(order_id).await?;
        if order.user_id != user_id {
            debug!(order_id, user_id, "Order access denied");
            return Err(CoreError::AccessDenied {
                order_no: order.order_no,
            }
            .into());
        }
        Ok(order)
    }

    async fn reload(&self, order_id: i64) -> ServiceResult<Order> {
        Ok(self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?)
    }
}

fn invalid_status(order: &Order, current: OrderStatus, operation: &'static str) -> crate::error::ServiceError {
    CoreError::InvalidOrderStatus {
        order_no: order.order_no.clone(),
        current,
        operation,
    }
    .into()
}

fn line_name(item: &NewOrderItem) -> String {
    match &item.sku_name {
        Some(sku) => format!("{} / {}", item.product_name, sku),
        None => item.product_name.clone(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use mall_core::{Money, OrderPaymentStatus, SaleStatus, UserStatus};
    use mall_db::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: OrderService,
        user_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("alice", UserStatus::Active).await;
        let service = OrderService::new(&Stores::memory(store.clone()));
        Fixture {
            store,
            service,
            user_id: user.id,
        }
    }

    fn request(items: Vec<LineRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            items,
            shipping: ShippingInfo {
                receiver_name: "Li Lei".to_string(),
                receiver_phone: "13800138000".to_string(),
                receiver_address: "1 Nanjing Rd, Shanghai".to_string(),
            },
            buyer_message: None,
        }
    }

    fn line(product_id: i64, sku_id: Option<i64>, quantity: i64) -> LineRequest {
        LineRequest {
            product_id,
            sku_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_create_order_prices_from_catalog() {
        let f = fixture().await;
        let phone = f.store.add_product("Nova Phone", Money::from_cents(100_000), 0, SaleStatus::OnSale).await;
        let sku = f
            .store
            .add_sku(phone.id, "PHN-1-BLK", "Black", Money::from_cents(9_900), 5, SaleStatus::OnSale)
            .await;
        let mug = f.store.add_product("Ceramic Mug", Money::from_cents(1_250), 10, SaleStatus::OnSale).await;

        let order = f
            .service
            .create_order(
                f.user_id,
                request(vec![line(phone.id, Some(sku.id), 2), line(mug.id, None, 1)]),
            )
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.payment_status, OrderPaymentStatus::Unpaid);
        assert_eq!(order.total_amount(), Money::from_cents(2 * 9_900 + 1_250));
        assert_eq!(order.pay_amount(), order.total_amount());
        assert!(order.order_no.starts_with("ORD"));

        let detail = f.service.get_order_detail(f.user_id, order.id).await.unwrap();
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].sku_code.as_deref(), Some("PHN-1-BLK"));
        assert!(detail.payments.is_empty());

        assert_eq!(f.service.stock_level(phone.id, Some(sku.id)).await.unwrap(), 3);
        assert_eq!(f.service.stock_level(mug.id, None).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_line_and_releases_earlier_lines() {
        let f = fixture().await;
        let mug = f.store.add_product("Ceramic Mug", Money::from_cents(1_250), 10, SaleStatus::OnSale).await;
        let lamp = f.store.add_product("Desk Lamp", Money::from_cents(4_500), 1, SaleStatus::OnSale).await;

        let err = f
            .service
            .create_order(f.user_id, request(vec![line(mug.id, None, 3), line(lamp.id, None, 2)]))
            .await
            .unwrap_err();

        match err {
            ServiceError::Core(CoreError::InsufficientStock {
                line,
                name,
                available,
                requested,
                ..
            }) => {
                assert_eq!(line, 2);
                assert_eq!(name, "Desk Lamp");
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }

        assert_eq!(f.service.stock_level(mug.id, None).await.unwrap(), 10);
        assert_eq!(f.service.stock_level(lamp.id, None).await.unwrap(), 1);
        let page = f.service.list_orders(f.user_id, None, None, None).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_create_order_rejects_bad_references() {
        let f = fixture().await;
        let off_sale = f.store.add_product("Old Radio", Money::from_cents(500), 5, SaleStatus::OffSale).await;
        let phone = f.store.add_product("Nova Phone", Money::from_cents(100_000), 0, SaleStatus::OnSale).await;
        let mug = f.store.add_product("Ceramic Mug", Money::from_cents(1_250), 10, SaleStatus::OnSale).await;
        let mug_sku = f
            .store
            .add_sku(mug.id, "HOM-MUG-WHT", "White", Money::from_cents(1_250), 5, SaleStatus::OnSale)
            .await;

        let err = f.service.create_order(f.user_id, request(vec![line(999, None, 1)])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::ProductNotFound(999))));

        let err = f
            .service
            .create_order(f.user_id, request(vec![line(off_sale.id, None, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::ProductUnavailable { .. })));

        let err = f
            .service
            .create_order(f.user_id, request(vec![line(phone.id, Some(mug_sku.id), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::SkuMismatch { .. })));

        let err = f
            .service
            .create_order(f.user_id, request(vec![line(phone.id, Some(4242), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::SkuNotFound(4242))));

        let err = f.service.create_order(f.user_id, request(vec![])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_order_checks_user() {
        let f = fixture().await;
        let mug = f.store.add_product("Ceramic Mug", Money::from_cents(1_250), 10, SaleStatus::OnSale).await;
        let disabled = f.store.add_user("mallory", UserStatus::Disabled).await;

        let err = f.service.create_order(777, request(vec![line(mug.id, None, 1)])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::UserNotFound(777))));

        let err = f
            .service
            .create_order(disabled.id, request(vec![line(mug.id, None, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::UserInactive(_))));
    }

    #[tokio::test]
    async fn test_cancel_returns_stock_once() {
        let f = fixture().await;
        let mug = f.store.add_product("Ceramic Mug", Money::from_cents(1_250), 10, SaleStatus::OnSale).await;
        let order = f
            .service
            .create_order(f.user_id, request(vec![line(mug.id, None, 4)]))
            .await
            .unwrap();
        assert_eq!(f.service.stock_level(mug.id, None).await.unwrap(), 6);

        let cancelled = f.service.cancel_order(f.user_id, order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(f.service.stock_level(mug.id, None).await.unwrap(), 10);

        let err = f.service.cancel_order(f.user_id, order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidOrderStatus {
                current: OrderStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(f.service.stock_level(mug.id, None).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_other_users_order_is_denied() {
        let f = fixture().await;
        let bob = f.store.add_user("bob", UserStatus::Active).await;
        let mug = f.store.add_product("Ceramic Mug", Money::from_cents(1_250), 10, SaleStatus::OnSale).await;
        let order = f
            .service
            .create_order(f.user_id, request(vec![line(mug.id, None, 1)]))
            .await
            .unwrap();

        let err = f.service.get_order_detail(bob.id, order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::AccessDenied { .. })));

        let err = f.service.cancel_order(bob.id, order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::AccessDenied { .. })));
        assert_eq!(f.service.stock_level(mug.id, None).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_confirm_receipt_requires_shipped() {
        let f = fixture().await;
        let mug = f.store.add_product("Ceramic Mug", Money::from_cents(1_250), 10, SaleStatus::OnSale).await;
        let order = f
            .service
            .create_order(f.user_id, request(vec![line(mug.id, None, 1)]))
            .await
            .unwrap();

        let err = f.service.confirm_receipt(f.user_id, order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidOrderStatus {
                current: OrderStatus::PendingPayment,
                ..
            })
        ));

        f.service.update_status(order.id, OrderStatus::Shipped).await.unwrap();
        let completed = f.service.confirm_receipt(f.user_id, order.id).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_update_status_unknown_order() {
        let f = fixture().await;
        let err = f.service.update_status(404, OrderStatus::Shipped).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::OrderNotFound(404))));
    }

    #[tokio::test]
    async fn test_list_orders_paginates_newest_first() {
        let f = fixture().await;
        let mug = f.store.add_product("Ceramic Mug", Money::from_cents(1_250), 10, SaleStatus::OnSale).await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let order = f
                .service
                .create_order(f.user_id, request(vec![line(mug.id, None, 1)]))
                .await
                .unwrap();
            ids.push(order.id);
        }
        f.service.cancel_order(f.user_id, ids[0]).await.unwrap();

        let page = f.service.list_orders(f.user_id, None, Some(1), Some(2)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.orders.len(), 2);
        assert_eq!(page.orders[0].id, ids[2]);

        let pending = f
            .service
            .list_orders(f.user_id, Some(OrderStatus::PendingPayment), None, None)
            .await
            .unwrap();
        assert_eq!(pending.total, 2);
        assert_eq!(pending.page_size, mall_core::DEFAULT_PAGE_SIZE);
    }
}
