//! # Storage Capabilities
//!
//! One trait per concern. Services depend on these traits, never on a
//! concrete adapter, so the SQLite repositories and [`MemoryStore`] are
//! interchangeable.
//!
//! ```text
//! ┌────────────────┐  ┌─────────────────┐  ┌────────────┐  ┌──────────────┐
//! │ CatalogReader  │  │ InventoryLedger │  │ OrderStore │  │ PaymentStore │
//! └───────┬────────┘  └────────┬────────┘  └─────┬──────┘  └──────┬───────┘
//!         │ implemented by     │                 │                │
//!         ├── CatalogRepository├── InventoryRepo ├── OrderRepo    ├── PaymentRepo   (SQLite)
//!         └── MemoryStore ─────┴─────────────────┴────────────────┘                 (tests)
//! ```
//!
//! ## Atomicity Guarantees
//! Every method is one unit of work:
//! - `reserve` is a single check-and-decrement; it never reads then writes.
//! - `place_order` reserves every line and persists the order with its
//!   lines, or changes nothing.
//! - `cancel_order` flips the status and returns the stock together.
//! - `settle_payment` marks the payment successful and the order paid
//!   together, or changes nothing.
//! - Payment transitions apply only from `Pending`; a losing concurrent
//!   caller observes the winner's terminal status.
//!
//! [`MemoryStore`]: crate::memory::MemoryStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mall_core::{
    NewOrder, NewPayment, Order, OrderItem, OrderStatus, PageRequest, Payment, PaymentStatus,
    Product, ProductSku, StockUnit, User,
};

use crate::error::DbResult;

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a stock reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    /// Not enough stock; nothing was decremented.
    Insufficient { available: i64 },
    /// The product or SKU does not exist.
    UnknownUnit,
}

/// Result of placing an order.
#[derive(Debug, Clone)]
pub enum PlaceOrderOutcome {
    Placed(Order),
    /// A line could not be reserved; nothing was persisted and no stock moved.
    OutOfStock {
        /// Index into `NewOrder::items`.
        line: usize,
        unit: StockUnit,
        available: i64,
        requested: i64,
    },
}

/// Result of a conditional payment transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTransition {
    /// The payment left `Pending` (and, for settlement, the order was paid).
    Applied,
    /// The payment was already terminal; nothing changed.
    AlreadyTerminal(PaymentStatus),
    /// Settlement only: the order is no longer awaiting payment; nothing changed.
    OrderNotPayable(OrderStatus),
    NotFound,
}

// =============================================================================
// Capabilities
// =============================================================================

/// Read path for users and catalog snapshots.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn get_user(&self, id: i64) -> DbResult<Option<User>>;

    async fn get_product(&self, id: i64) -> DbResult<Option<Product>>;

    async fn get_sku(&self, id: i64) -> DbResult<Option<ProductSku>>;
}

/// Per-unit stock counters.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Atomically takes `quantity` units if at least that many are available.
    async fn reserve(&self, unit: StockUnit, quantity: i64) -> DbResult<ReserveOutcome>;

    /// Returns `quantity` units. Unknown units are ignored.
    async fn release(&self, unit: StockUnit, quantity: i64) -> DbResult<()>;

    /// Current stock snapshot, `None` for an unknown unit.
    async fn available(&self, unit: StockUnit) -> DbResult<Option<i64>>;
}

/// Orders and their line items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Reserves stock for every line (in [`StockUnit`] order) and persists
    /// the order in `PendingPayment` with its lines, all or nothing.
    async fn place_order(&self, order: &NewOrder) -> DbResult<PlaceOrderOutcome>;

    async fn get_order(&self, id: i64) -> DbResult<Option<Order>>;

    async fn get_order_items(&self, order_id: i64) -> DbResult<Vec<OrderItem>>;

    /// A user's orders, newest first, with the total matching count.
    async fn list_user_orders(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> DbResult<(Vec<Order>, i64)>;

    /// Moves `from` → `to` and updates the derived facets.
    /// Returns `false` when the order is not (or no longer) in `from`.
    async fn transition_order(&self, id: i64, from: OrderStatus, to: OrderStatus) -> DbResult<bool>;

    /// `PendingPayment` → `Cancelled`, returning every line's stock.
    /// Returns `false` when the order is not pending.
    async fn cancel_order(&self, id: i64) -> DbResult<bool>;

    /// Unconditional status set for trusted callers. Facets follow the
    /// status; stock is not touched. Returns `false` for an unknown order.
    async fn set_order_status(&self, id: i64, status: OrderStatus) -> DbResult<bool>;
}

/// Payment attempts.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a `Pending` payment.
    ///
    /// Fails with `DbError::UniqueViolation` on `order_payments.order_id`
    /// when the order already has a pending or successful payment.
    async fn insert_payment(&self, payment: &NewPayment) -> DbResult<Payment>;

    async fn get_payment(&self, payment_no: &str) -> DbResult<Option<Payment>>;

    /// The pending or successful payment of an order, if any.
    async fn active_payment(&self, order_id: i64) -> DbResult<Option<Payment>>;

    /// All attempts of an order, oldest first.
    async fn list_order_payments(&self, order_id: i64) -> DbResult<Vec<Payment>>;

    /// `Pending` → `Cancelled`.
    async fn cancel_payment(&self, payment_no: &str) -> DbResult<PaymentTransition>;

    /// `Pending` → `Failed`.
    async fn fail_payment(&self, payment_no: &str) -> DbResult<PaymentTransition>;

    /// `Pending` → `Success` with the provider reference, and the owning
    /// order `PendingPayment` → `AwaitingShipment`, as one unit.
    async fn settle_payment(
        &self,
        payment_no: &str,
        trade_no: &str,
        paid_at: DateTime<Utc>,
    ) -> DbResult<PaymentTransition>;
}
