//! # Error Types
//!
//! Domain-specific error types for mall-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mall-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Malformed input                                │
//! │                                                                         │
//! │  mall-core provider errors (provider module)                           │
//! │  └── ProviderError    - Signing / callback verification failures       │
//! │                                                                         │
//! │  mall-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  mall-server errors                                                    │
//! │  ├── ServiceError     - Union of the above                             │
//! │  └── ApiError         - What HTTP clients see (code + message)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Classes
//! - **Not found / access**: the referenced entity is missing or foreign
//! - **Validation**: bad references, inactive entities, malformed requests
//! - **Conflict**: stock exhausted, wrong state, duplicate payment attempt
//!
//! None of these are retried by the core; they are reported to the caller.

use thiserror::Error;

use crate::status::{OrderStatus, PaymentStatus};
use crate::types::StockUnit;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations of the order / payment lifecycle.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The ordering user does not exist.
    #[error("User not found: {0}")]
    UserNotFound(i64),

    /// The ordering user exists but is disabled.
    #[error("User {0} is disabled")]
    UserInactive(i64),

    /// A line references a product that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// A line references a product that is not on sale.
    #[error("Product '{name}' ({product_id}) is not on sale")]
    ProductUnavailable { product_id: i64, name: String },

    /// A line references a SKU that does not exist.
    #[error("SKU not found: {0}")]
    SkuNotFound(i64),

    /// A line references a SKU of a different product.
    #[error("SKU {sku_id} does not belong to product {product_id}")]
    SkuMismatch { sku_id: i64, product_id: i64 },

    /// A line references a SKU that is not on sale.
    #[error("SKU '{name}' ({sku_id}) is not on sale")]
    SkuUnavailable { sku_id: i64, name: String },

    /// Not enough stock to reserve a line.
    ///
    /// ## User Workflow
    /// ```text
    /// Create order (line 2: SKU 7 × 5)
    ///      │
    ///      ▼
    /// reserve(sku:7, 5)  ── stock=3 ──► rejected
    ///      │
    ///      ▼
    /// release lines reserved earlier in this attempt
    ///      │
    ///      ▼
    /// InsufficientStock { line: 2, unit: sku:7, available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for line {line} ({name}, {unit}): available {available}, requested {requested}")]
    InsufficientStock {
        line: usize,
        unit: StockUnit,
        name: String,
        available: i64,
        requested: i64,
    },

    /// Order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    /// The requesting user does not own the order.
    #[error("Access denied to order {order_no}")]
    AccessDenied { order_no: String },

    /// The order's state does not permit the requested operation.
    #[error("Order {order_no} is {current}, cannot {operation}")]
    InvalidOrderStatus {
        order_no: String,
        current: OrderStatus,
        operation: &'static str,
    },

    /// A payment was requested for an order that is not awaiting payment.
    #[error("Order {order_no} is not pending payment (status: {current})")]
    OrderNotPending {
        order_no: String,
        current: OrderStatus,
    },

    /// The order already has a successful payment.
    #[error("Order {order_no} is already paid")]
    AlreadyPaid { order_no: String },

    /// The order already has an open payment attempt.
    ///
    /// ## When This Occurs
    /// The client asked for a second payment while the first is still
    /// pending. Cancel the open payment, then retry.
    #[error("Order {order_no} already has a pending payment {payment_no}")]
    PaymentInProgress {
        order_no: String,
        payment_no: String,
    },

    /// The order's pay amount is zero; no provider accepts it.
    #[error("Order {order_no} has nothing to pay")]
    NothingToPay { order_no: String },

    /// Payment number is unknown.
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// The payment's state does not permit the requested operation.
    #[error("Payment {payment_no} is {current}, cannot {operation}")]
    InvalidPaymentStatus {
        payment_no: String,
        current: PaymentStatus,
        operation: &'static str,
    },

    /// Payment method is unknown or not configured.
    #[error("Unsupported payment method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Malformed order or payment input, rejected before any stock moves.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Quantities, ids, page numbers and amounts outside their bounds.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Phone numbers, decimal amounts, payment method names.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
