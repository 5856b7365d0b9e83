//! # In-Memory Store
//!
//! An adapter implementing every storage capability over plain maps behind
//! one async mutex. Each trait method takes the lock once, so every method
//! is atomic with respect to every other, the same guarantee the SQLite
//! repositories give with conditional updates and transactions.
//!
//! Used by service tests and by anything that wants the lifecycle without a
//! database file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::error::{DbError, DbResult};
use crate::store::{
    CatalogReader, InventoryLedger, OrderStore, PaymentStore, PaymentTransition,
    PlaceOrderOutcome, ReserveOutcome,
};
use mall_core::{
    Money, NewOrder, NewPayment, Order, OrderItem, OrderStatus, PageRequest, Payment,
    PaymentStatus, Product, ProductSku, SaleStatus, StockUnit, User, UserStatus,
};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, User>,
    products: BTreeMap<i64, Product>,
    skus: BTreeMap<i64, ProductSku>,
    orders: BTreeMap<i64, Order>,
    items: Vec<OrderItem>,
    payments: Vec<Payment>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn stock_mut(&mut self, unit: StockUnit) -> Option<&mut i64> {
        match unit {
            StockUnit::Product(id) => self.products.get_mut(&id).map(|p| &mut p.stock),
            StockUnit::Sku(id) => self.skus.get_mut(&id).map(|s| &mut s.stock),
        }
    }

    fn reserve(&mut self, unit: StockUnit, quantity: i64) -> ReserveOutcome {
        match self.stock_mut(unit) {
            Some(stock) if *stock >= quantity => {
                *stock -= quantity;
                ReserveOutcome::Reserved
            }
            Some(stock) => ReserveOutcome::Insufficient { available: *stock },
            None => ReserveOutcome::UnknownUnit,
        }
    }

    fn release(&mut self, unit: StockUnit, quantity: i64) {
        if let Some(stock) = self.stock_mut(unit) {
            *stock += quantity;
        }
    }

    fn transition(&mut self, id: i64, from: OrderStatus, to: OrderStatus) -> bool {
        match self.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                set_status(order, to);
                true
            }
            _ => false,
        }
    }

    fn payment_mut(&mut self, payment_no: &str) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.payment_no == payment_no)
    }

    fn close(&mut self, payment_no: &str, to: PaymentStatus) -> PaymentTransition {
        match self.payment_mut(payment_no) {
            Some(payment) if payment.status == PaymentStatus::Pending => {
                payment.status = to;
                payment.updated_at = Utc::now();
                PaymentTransition::Applied
            }
            Some(payment) => PaymentTransition::AlreadyTerminal(payment.status),
            None => PaymentTransition::NotFound,
        }
    }
}

fn set_status(order: &mut Order, status: OrderStatus) {
    order.status = status;
    order.payment_status = status.payment_status();
    order.delivery_status = status.delivery_status();
    order.updated_at = Utc::now();
}

fn positive(quantity: i64) -> DbResult<()> {
    if quantity <= 0 {
        return Err(DbError::Internal(format!(
            "stock movement must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

/// Map-backed implementation of every storage capability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, username: &str, status: UserStatus) -> User {
        let mut state = self.state.lock().await;
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            status,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_product(&self, name: &str, price: Money, stock: i64, status: SaleStatus) -> Product {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let product = Product {
            id: state.next_id(),
            name: name.to_string(),
            price_cents: price.cents(),
            stock,
            status,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        product
    }

    pub async fn add_sku(
        &self,
        product_id: i64,
        sku_code: &str,
        name: &str,
        price: Money,
        stock: i64,
        status: SaleStatus,
    ) -> ProductSku {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let sku = ProductSku {
            id: state.next_id(),
            product_id,
            sku_code: sku_code.to_string(),
            name: name.to_string(),
            price_cents: price.cents(),
            stock,
            status,
            created_at: now,
            updated_at: now,
        };
        state.skus.insert(sku.id, sku.clone());
        sku
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn get_user(&self, id: i64) -> DbResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn get_product(&self, id: i64) -> DbResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_sku(&self, id: i64) -> DbResult<Option<ProductSku>> {
        Ok(self.state.lock().await.skus.get(&id).cloned())
    }
}

#[async_trait]
impl InventoryLedger for MemoryStore {
    async fn reserve(&self, unit: StockUnit, quantity: i64) -> DbResult<ReserveOutcome> {
        positive(quantity)?;
        Ok(self.state.lock().await.reserve(unit, quantity))
    }

    async fn release(&self, unit: StockUnit, quantity: i64) -> DbResult<()> {
        positive(quantity)?;
        self.state.lock().await.release(unit, quantity);
        Ok(())
    }

    async fn available(&self, unit: StockUnit) -> DbResult<Option<i64>> {
        let mut state = self.state.lock().await;
        Ok(state.stock_mut(unit).map(|stock| *stock))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, order: &NewOrder) -> DbResult<PlaceOrderOutcome> {
        for item in &order.items {
            positive(item.quantity)?;
        }

        let mut state = self.state.lock().await;

        if state.orders.values().any(|o| o.order_no == order.order_no) {
            return Err(DbError::duplicate("orders.order_no", order.order_no.clone()));
        }
        if !state.users.contains_key(&order.user_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("user {} does not exist", order.user_id),
            });
        }

        let mut lines: Vec<_> = order.items.iter().enumerate().collect();
        lines.sort_by_key(|(index, item)| (item.stock_unit(), *index));

        let mut reserved: Vec<(StockUnit, i64)> = Vec::new();
        for (index, item) in lines {
            let unit = item.stock_unit();
            let available = match state.reserve(unit, item.quantity) {
                ReserveOutcome::Reserved => {
                    reserved.push((unit, item.quantity));
                    continue;
                }
                ReserveOutcome::Insufficient { available } => available,
                ReserveOutcome::UnknownUnit => 0,
            };

            for (unit, quantity) in reserved {
                state.release(unit, quantity);
            }
            return Ok(PlaceOrderOutcome::OutOfStock {
                line: index,
                unit,
                available,
                requested: item.quantity,
            });
        }

        let now = Utc::now();
        let status = OrderStatus::PendingPayment;
        let placed = Order {
            id: state.next_id(),
            order_no: order.order_no.clone(),
            user_id: order.user_id,
            total_amount_cents: order.total_amount.cents(),
            freight_amount_cents: order.freight_amount.cents(),
            discount_amount_cents: order.discount_amount.cents(),
            pay_amount_cents: order.pay_amount.cents(),
            status,
            payment_status: status.payment_status(),
            delivery_status: status.delivery_status(),
            receiver_name: order.shipping.receiver_name.clone(),
            receiver_phone: order.shipping.receiver_phone.clone(),
            receiver_address: order.shipping.receiver_address.clone(),
            buyer_message: order.buyer_message.clone(),
            created_at: now,
            updated_at: now,
        };

        for item in &order.items {
            let id = state.next_id();
            state.items.push(OrderItem {
                id,
                order_id: placed.id,
                product_id: item.product_id,
                sku_id: item.sku_id,
                product_name: item.product_name.clone(),
                sku_name: item.sku_name.clone(),
                sku_code: item.sku_code.clone(),
                unit_price_cents: item.unit_price.cents(),
                quantity: item.quantity,
                total_amount_cents: item.total_amount.cents(),
                created_at: now,
            });
        }

        state.orders.insert(placed.id, placed.clone());
        Ok(PlaceOrderOutcome::Placed(placed))
    }

    async fn get_order(&self, id: i64) -> DbResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn get_order_items(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_user_orders(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> DbResult<(Vec<Order>, i64)> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id && status.map_or(true, |s| o.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let orders = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((orders, total))
    }

    async fn transition_order(&self, id: i64, from: OrderStatus, to: OrderStatus) -> DbResult<bool> {
        Ok(self.state.lock().await.transition(id, from, to))
    }

    async fn cancel_order(&self, id: i64) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        if !state.transition(id, OrderStatus::PendingPayment, OrderStatus::Cancelled) {
            return Ok(false);
        }

        let lines: Vec<(StockUnit, i64)> = state
            .items
            .iter()
            .filter(|item| item.order_id == id)
            .map(|item| (item.stock_unit(), item.quantity))
            .collect();
        for (unit, quantity) in lines {
            state.release(unit, quantity);
        }
        Ok(true)
    }

    async fn set_order_status(&self, id: i64, status: OrderStatus) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(&id) {
            Some(order) => {
                set_status(order, status);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, payment: &NewPayment) -> DbResult<Payment> {
        let mut state = self.state.lock().await;

        if !state.orders.contains_key(&payment.order_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("order {} does not exist", payment.order_id),
            });
        }
        if state.payments.iter().any(|p| p.payment_no == payment.payment_no) {
            return Err(DbError::duplicate(
                "order_payments.payment_no",
                payment.payment_no.clone(),
            ));
        }
        if state
            .payments
            .iter()
            .any(|p| p.order_id == payment.order_id && p.status.is_active())
        {
            return Err(DbError::duplicate(
                "order_payments.order_id",
                payment.order_id.to_string(),
            ));
        }

        let now = Utc::now();
        let row = Payment {
            id: state.next_id(),
            payment_no: payment.payment_no.clone(),
            order_id: payment.order_id,
            method: payment.method,
            amount_cents: payment.amount.cents(),
            status: PaymentStatus::Pending,
            trade_no: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        state.payments.push(row.clone());
        Ok(row)
    }

    async fn get_payment(&self, payment_no: &str) -> DbResult<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .find(|p| p.payment_no == payment_no)
            .cloned())
    }

    async fn active_payment(&self, order_id: i64) -> DbResult<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .find(|p| p.order_id == order_id && p.status.is_active())
            .cloned())
    }

    async fn list_order_payments(&self, order_id: i64) -> DbResult<Vec<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn cancel_payment(&self, payment_no: &str) -> DbResult<PaymentTransition> {
        Ok(self.state.lock().await.close(payment_no, PaymentStatus::Cancelled))
    }

    async fn fail_payment(&self, payment_no: &str) -> DbResult<PaymentTransition> {
        Ok(self.state.lock().await.close(payment_no, PaymentStatus::Failed))
    }

    async fn settle_payment(
        &self,
        payment_no: &str,
        trade_no: &str,
        paid_at: DateTime<Utc>,
    ) -> DbResult<PaymentTransition> {
        let mut state = self.state.lock().await;

        let order_id = match state.payment_mut(payment_no) {
            Some(payment) if payment.status == PaymentStatus::Pending => payment.order_id,
            Some(payment) => return Ok(PaymentTransition::AlreadyTerminal(payment.status)),
            None => return Ok(PaymentTransition::NotFound),
        };

        let order_status = state
            .orders
            .get(&order_id)
            .map(|o| o.status)
            .ok_or_else(|| DbError::not_found("Order", order_id))?;
        if order_status != OrderStatus::PendingPayment {
            return Ok(PaymentTransition::OrderNotPayable(order_status));
        }

        state.transition(order_id, OrderStatus::PendingPayment, OrderStatus::AwaitingShipment);
        if let Some(payment) = state.payment_mut(payment_no) {
            payment.status = PaymentStatus::Success;
            payment.trade_no = Some(trade_no.to_string());
            payment.paid_at = Some(paid_at);
            payment.updated_at = paid_at;
        }
        Ok(PaymentTransition::Applied)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mall_core::{NewOrderItem, PaymentMethod, ShippingInfo};
    use std::sync::Arc;

    fn order_for(order_no: &str, user_id: i64, lines: &[(i64, Option<i64>, i64)]) -> NewOrder {
        let items: Vec<NewOrderItem> = lines
            .iter()
            .map(|&(product_id, sku_id, quantity)| NewOrderItem {
                product_id,
                sku_id,
                product_name: "Thing".to_string(),
                sku_name: None,
                sku_code: None,
                unit_price: Money::from_cents(100),
                quantity,
                total_amount: Money::from_cents(100 * quantity),
            })
            .collect();
        let total = Money::from_cents(items.iter().map(|i| i.total_amount.cents()).sum());
        NewOrder {
            order_no: order_no.to_string(),
            user_id,
            total_amount: total,
            freight_amount: Money::zero(),
            discount_amount: Money::zero(),
            pay_amount: total,
            shipping: ShippingInfo {
                receiver_name: "Dan".to_string(),
                receiver_phone: "13800138000".to_string(),
                receiver_address: "4 Hill Rd".to_string(),
            },
            buyer_message: None,
            items,
        }
    }

    #[tokio::test]
    async fn test_failed_order_restores_earlier_lines() {
        let store = MemoryStore::new();
        let user = store.add_user("dan", UserStatus::Active).await;
        let a = store.add_product("A", Money::from_cents(100), 5, SaleStatus::OnSale).await;
        let b = store.add_product("B", Money::from_cents(100), 1, SaleStatus::OnSale).await;

        let outcome = store
            .place_order(&order_for("ORD-M1", user.id, &[(a.id, None, 3), (b.id, None, 2)]))
            .await
            .unwrap();
        assert!(matches!(outcome, PlaceOrderOutcome::OutOfStock { line: 1, available: 1, .. }));

        assert_eq!(store.available(StockUnit::Product(a.id)).await.unwrap(), Some(5));
        assert_eq!(store.available(StockUnit::Product(b.id)).await.unwrap(), Some(1));
        assert!(store.get_order_items(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payment_slot_and_settlement() {
        let store = MemoryStore::new();
        let user = store.add_user("erin", UserStatus::Active).await;
        let p = store.add_product("P", Money::from_cents(100), 2, SaleStatus::OnSale).await;
        let PlaceOrderOutcome::Placed(order) = store
            .place_order(&order_for("ORD-M2", user.id, &[(p.id, None, 1)]))
            .await
            .unwrap()
        else {
            panic!("order not placed");
        };

        let new = |no: &str| NewPayment {
            payment_no: no.to_string(),
            order_id: order.id,
            method: PaymentMethod::Alipay,
            amount: Money::from_cents(100),
        };

        store.insert_payment(&new("PAY-1")).await.unwrap();
        assert!(store
            .insert_payment(&new("PAY-2"))
            .await
            .unwrap_err()
            .is_unique_violation_on("order_payments.order_id"));

        assert_eq!(
            store.settle_payment("PAY-1", "T", Utc::now()).await.unwrap(),
            PaymentTransition::Applied
        );
        assert_eq!(
            store.cancel_payment("PAY-1").await.unwrap(),
            PaymentTransition::AlreadyTerminal(PaymentStatus::Success)
        );
        assert!(store.get_order(order.id).await.unwrap().unwrap().is_paid());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations() {
        let store = Arc::new(MemoryStore::new());
        let p = store.add_product("Hot", Money::from_cents(100), 7, SaleStatus::OnSale).await;
        let unit = StockUnit::Product(p.id);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.reserve(unit, 1).await })
            })
            .collect();

        let mut reserved = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == ReserveOutcome::Reserved {
                reserved += 1;
            }
        }
        assert_eq!(reserved, 7);
        assert_eq!(store.available(unit).await.unwrap(), Some(0));
    }
}
