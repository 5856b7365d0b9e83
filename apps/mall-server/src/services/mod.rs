//! # Services
//!
//! Request-level operations over the storage capabilities.
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────────┐
//! │  OrderService    │   │  PaymentService  │   │  CallbackReconciler  │
//! │  create / cancel │   │  create / cancel │   │  verify → settle     │
//! │  confirm / list  │   │  status          │   │  literal ack         │
//! └────────┬─────────┘   └────────┬─────────┘   └──────────┬───────────┘
//!          │                      │                        │
//!          ▼                      ▼                        ▼
//!     Stores { catalog, inventory, orders, payments }  + GatewayRegistry
//! ```
//!
//! Services are built from [`Stores`], so the same code runs against
//! SQLite in production and [`MemoryStore`] in tests.

pub mod callback_service;
pub mod order_service;
pub mod payment_service;

use std::sync::Arc;

use mall_db::{CatalogReader, Database, InventoryLedger, MemoryStore, OrderStore, PaymentStore};

pub use callback_service::{CallbackAck, CallbackReconciler};
pub use order_service::{CreateOrderRequest, OrderDetail, OrderPage, OrderService};
pub use payment_service::{PaymentIntent, PaymentService};

/// One handle per storage capability.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogReader>,
    pub inventory: Arc<dyn InventoryLedger>,
    pub orders: Arc<dyn OrderStore>,
    pub payments: Arc<dyn PaymentStore>,
}

impl Stores {
    /// SQLite repositories sharing the database's pool.
    pub fn sqlite(db: &Database) -> Self {
        Stores {
            catalog: Arc::new(db.catalog()),
            inventory: Arc::new(db.inventory()),
            orders: Arc::new(db.orders()),
            payments: Arc::new(db.payments()),
        }
    }

    /// Every capability served by one in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Stores {
            catalog: store.clone(),
            inventory: store.clone(),
            orders: store.clone(),
            payments: store,
        }
    }
}
