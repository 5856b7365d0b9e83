//! # Status State Machines
//!
//! Order and payment status values and the transitions between them.
//!
//! ## Order Status
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   PendingPayment(1) ──cancel──────────────────► Cancelled(5)  ■         │
//! │         │                                                               │
//! │         │ payment success                                               │
//! │         ▼                                                               │
//! │   AwaitingShipment(2) ──ship──► Shipped(3) ──confirm──► Completed(4) ■  │
//! │                                                                         │
//! │   ■ = terminal, no transition leaves it                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Status
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ┌──success──► Success(1)   ■                      │
//! │   PendingPayment(0) ──┼──failure──► Failed(2)    ■                      │
//! │                       └──cancel───► Cancelled(3) ■                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The numeric codes are the persisted values.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Order Status
// =============================================================================

/// Authoritative status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, stock reserved, waiting for the buyer to pay.
    PendingPayment = 1,
    /// Paid, waiting for fulfillment.
    AwaitingShipment = 2,
    /// Handed to the carrier.
    Shipped = 3,
    /// Buyer confirmed receipt.
    Completed = 4,
    /// Cancelled before payment; stock returned.
    Cancelled = 5,
}

impl OrderStatus {
    /// Persisted numeric code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Parses a persisted numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(OrderStatus::PendingPayment),
            2 => Some(OrderStatus::AwaitingShipment),
            3 => Some(OrderStatus::Shipped),
            4 => Some(OrderStatus::Completed),
            5 => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states accept no further transition.
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// ## Example
    /// ```rust
    /// use mall_core::OrderStatus;
    ///
    /// assert!(OrderStatus::PendingPayment.can_transition_to(OrderStatus::Cancelled));
    /// assert!(!OrderStatus::AwaitingShipment.can_transition_to(OrderStatus::Cancelled));
    /// assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Shipped));
    /// ```
    pub const fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::PendingPayment, OrderStatus::AwaitingShipment)
                | (OrderStatus::PendingPayment, OrderStatus::Cancelled)
                | (OrderStatus::AwaitingShipment, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Completed)
        )
    }

    /// The payment facet implied by this status.
    pub const fn payment_status(self) -> OrderPaymentStatus {
        match self {
            OrderStatus::PendingPayment | OrderStatus::Cancelled => OrderPaymentStatus::Unpaid,
            OrderStatus::AwaitingShipment | OrderStatus::Shipped | OrderStatus::Completed => {
                OrderPaymentStatus::Paid
            }
        }
    }

    /// The delivery facet implied by this status.
    pub const fn delivery_status(self) -> DeliveryStatus {
        match self {
            OrderStatus::PendingPayment
            | OrderStatus::AwaitingShipment
            | OrderStatus::Cancelled => DeliveryStatus::NotShipped,
            OrderStatus::Shipped => DeliveryStatus::Shipped,
            OrderStatus::Completed => DeliveryStatus::Received,
        }
    }

    /// Stable lower-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::AwaitingShipment => "awaiting_shipment",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Facets
// =============================================================================

/// Whether the order has been paid. Derived from [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Unpaid = 0,
    Paid = 1,
}

/// Where the goods are. Derived from [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    NotShipped = 0,
    Shipped = 1,
    Received = 2,
}

// =============================================================================
// Payment Status
// =============================================================================

/// Status of one payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Issued to the client, waiting for the provider.
    Pending = 0,
    /// Provider confirmed the payment.
    Success = 1,
    /// Provider reported a failed payment.
    Failed = 2,
    /// Cancelled by the user or an operator.
    Cancelled = 3,
}

impl PaymentStatus {
    /// Persisted numeric code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Parses a persisted numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(PaymentStatus::Pending),
            1 => Some(PaymentStatus::Success),
            2 => Some(PaymentStatus::Failed),
            3 => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    /// Everything except `Pending` is terminal.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Whether this status blocks a new payment attempt for the same order.
    pub const fn is_active(self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Success)
    }

    /// Only a pending payment may move, and only to a terminal state.
    pub const fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(self, PaymentStatus::Pending) && next.is_terminal()
    }

    /// Stable lower-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
