//! # Repository Module
//!
//! SQLite adapters for the capabilities in [`crate::store`].
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OrderService                                                          │
//! │       │  orders.place_order(&new_order)   (via dyn OrderStore)         │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── BEGIN                                                             │
//! │  ├── inventory::reserve_on(tx, unit, qty)   × each line, sorted        │
//! │  ├── INSERT orders / order_items                                       │
//! │  └── COMMIT (or ROLLBACK on the first short line)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`] - Users, products, SKUs (reads plus seeding)
//! - [`InventoryRepository`] - Stock check-and-decrement / release
//! - [`OrderRepository`] - Order aggregate and status transitions
//! - [`PaymentRepository`] - Payment attempts and settlement

pub mod catalog;
pub mod inventory;
pub mod order;
pub mod payment;

pub use catalog::CatalogRepository;
pub use inventory::InventoryRepository;
pub use order::OrderRepository;
pub use payment::PaymentRepository;
