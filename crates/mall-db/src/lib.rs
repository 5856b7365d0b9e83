//! # mall-db: Database Layer for the Mall Backend
//!
//! SQLite storage for catalog snapshots, stock counters, orders, and
//! payments, behind one capability trait per concern.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mall Data Flow                                   │
//! │                                                                         │
//! │  HTTP handler → OrderService / PaymentService / CallbackReconciler     │
//! │       │            (hold Arc<dyn OrderStore>, Arc<dyn PaymentStore>…)  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     mall-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CatalogRepo   │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ InventoryRepo │    │   _schema    │  │   │
//! │  │   │               │    │ OrderRepo     │    │              │  │   │
//! │  │   │               │    │ PaymentRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   MemoryStore ── same traits, plain maps (tests)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (mall.db)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`store`] - Capability traits and their outcome types
//! - [`repository`] - SQLite implementations
//! - [`memory`] - In-memory implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mall_db::{Database, DbConfig, OrderStore};
//!
//! let db = Database::new(DbConfig::new("mall.db")).await?;
//! let order = db.orders().get_order(42).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use pool::{Database, DbConfig};
pub use store::{
    CatalogReader, InventoryLedger, OrderStore, PaymentStore, PaymentTransition,
    PlaceOrderOutcome, ReserveOutcome,
};

// Repository re-exports for convenience
pub use repository::{CatalogRepository, InventoryRepository, OrderRepository, PaymentRepository};
