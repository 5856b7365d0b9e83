//! # mall-core: Pure Business Logic for the Mall Backend
//!
//! Everything that decides *whether* an order, payment, or stock movement is
//! allowed lives here, as pure functions over plain data. Storage and HTTP
//! live in `mall-db` and `mall-server`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Mall Backend Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               mall-server (axum + services)                     │   │
//! │  │  OrderService ──► PaymentService ──► CallbackReconciler         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mall-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ │   │
//! │  │  │  types  │ │ status  │ │ pricing │ │numbering │ │provider │ │   │
//! │  │  │ Order   │ │ Order   │ │ lines   │ │ ORD...   │ │ WeChat  │ │   │
//! │  │  │ Payment │ │ Payment │ │ totals  │ │ PAY...   │ │ Alipay  │ │   │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └──────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    mall-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (User, Product, Order, Payment, ...)
//! - [`status`] - Order and payment state machines
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Line pricing from catalog snapshots and order totals
//! - [`numbering`] - Order and payment number generation
//! - [`provider`] - Payment provider intents and callback verification
//! - [`validation`] - Request validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use mall_core::money::Money;
//!
//! let price = Money::from_cents(9900);
//! assert_eq!(price.to_decimal_string(), "99.00");
//! assert_eq!(Money::parse_decimal("99.00").unwrap(), price);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod numbering;
pub mod pricing;
pub mod provider;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use provider::{
    CallbackFields, CallbackNotice, CallbackOutcome, GatewayRegistry, IntentRequest,
    PaymentGateway, ProviderError, ProviderParams,
};
pub use status::{DeliveryStatus, OrderPaymentStatus, OrderStatus, PaymentStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines in a single order.
pub const MAX_ORDER_LINES: usize = 50;

/// Maximum quantity of a single order line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of the buyer's note, in characters.
pub const MAX_BUYER_MESSAGE_CHARS: usize = 500;

/// Page size used when a listing request does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a listing request may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;
