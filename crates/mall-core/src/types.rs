//! # Domain Types
//!
//! Core domain records of the mall backend.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog (read-only here)           Order aggregate                     │
//! │  ┌─────────────┐ ┌─────────────┐    ┌─────────────┐   ┌─────────────┐  │
//! │  │  Product    │ │ ProductSku  │    │   Order     │──►│ OrderItem   │  │
//! │  │  price      │◄│ product_id  │    │  order_no   │ * │ (snapshot)  │  │
//! │  │  stock      │ │ price/stock │    │  status     │   └─────────────┘  │
//! │  │  status     │ │ status      │    │  pay_amount │                    │
//! │  └─────────────┘ └─────────────┘    └──────┬──────┘                    │
//! │         └──── StockUnit ────┘              │ 1                         │
//! │                                            ▼ *                         │
//! │                                     ┌─────────────┐                    │
//! │                                     │  Payment    │ ≤1 Pending/Success │
//! │                                     │  payment_no │    per order       │
//! │                                     └─────────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Orders and payments carry:
//! - `id`: storage key, used for relations
//! - Business number (`order_no`, `payment_no`): human-legible, sent to
//!   providers, never reused

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;
use crate::status::{DeliveryStatus, OrderPaymentStatus, OrderStatus, PaymentStatus};

// =============================================================================
// Catalog Status
// =============================================================================

/// Account status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Disabled = 0,
    Active = 1,
}

/// Sale status of a product or SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    OffSale = 0,
    OnSale = 1,
}

// =============================================================================
// User
// =============================================================================

/// The slice of a user account the order lifecycle needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub username: String,
    pub status: UserStatus,
}

impl User {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

// =============================================================================
// Product / SKU
// =============================================================================

/// A product. Holds stock itself when ordered without a SKU.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Price in cents, used when no SKU is ordered.
    pub price_cents: i64,
    /// Product-level stock, used when no SKU is ordered.
    pub stock: i64,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn is_on_sale(&self) -> bool {
        self.status == SaleStatus::OnSale
    }
}

/// A sellable variant of a product with its own price and stock.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductSku {
    pub id: i64,
    pub product_id: i64,
    /// Merchant SKU code, e.g. `IP15-256-BLK`.
    pub sku_code: String,
    /// Variant label, e.g. `Black / 256G`.
    pub name: String,
    pub price_cents: i64,
    pub stock: i64,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductSku {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn is_on_sale(&self) -> bool {
        self.status == SaleStatus::OnSale
    }
}

// =============================================================================
// Stock Unit
// =============================================================================

/// The granularity at which inventory is tracked and reserved.
///
/// A line with a SKU draws from the SKU's stock; a line without one draws
/// from the product's own stock.
///
/// ## Ordering
/// `Ord` gives the lock order used when an order reserves several units:
/// products before SKUs, then by id. Two orders touching the same units
/// therefore always reserve them in the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockUnit {
    Product(i64),
    Sku(i64),
}

impl StockUnit {
    /// The unit an order line draws from.
    pub fn for_line(product_id: i64, sku_id: Option<i64>) -> Self {
        match sku_id {
            Some(sku_id) => StockUnit::Sku(sku_id),
            None => StockUnit::Product(product_id),
        }
    }
}

impl fmt::Display for StockUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockUnit::Product(id) => write!(f, "product:{}", id),
            StockUnit::Sku(id) => write!(f, "sku:{}", id),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// Supported payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// WeChat Pay (JSAPI).
    Wechat,
    /// Alipay (app pay).
    Alipay,
}

impl PaymentMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::Alipay => "alipay",
        }
    }

    /// The literal body the provider expects in reply to a callback.
    ///
    /// The providers retry until they see their success literal, so these
    /// strings are part of the wire contract.
    ///
    /// ## Example
    /// ```rust
    /// use mall_core::PaymentMethod;
    ///
    /// assert_eq!(PaymentMethod::Wechat.ack_literal(true), "SUCCESS");
    /// assert_eq!(PaymentMethod::Wechat.ack_literal(false), "FAIL");
    /// assert_eq!(PaymentMethod::Alipay.ack_literal(true), "success");
    /// assert_eq!(PaymentMethod::Alipay.ack_literal(false), "failure");
    /// ```
    pub const fn ack_literal(self, accepted: bool) -> &'static str {
        match (self, accepted) {
            (PaymentMethod::Wechat, true) => "SUCCESS",
            (PaymentMethod::Wechat, false) => "FAIL",
            (PaymentMethod::Alipay, true) => "success",
            (PaymentMethod::Alipay, false) => "failure",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wechat" => Ok(PaymentMethod::Wechat),
            "alipay" => Ok(PaymentMethod::Alipay),
            other => Err(CoreError::UnsupportedMethod(other.to_string())),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// Shipping destination captured at order time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingInfo {
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    /// Sum of line totals.
    pub total_amount_cents: i64,
    pub freight_amount_cents: i64,
    pub discount_amount_cents: i64,
    /// total − discount + freight. Every payment attempt charges this.
    pub pay_amount_cents: i64,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub delivery_status: DeliveryStatus,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub buyer_message: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    #[inline]
    pub fn pay_amount(&self) -> Money {
        Money::from_cents(self.pay_amount_cents)
    }

    #[inline]
    pub fn is_paid(&self) -> bool {
        self.payment_status == OrderPaymentStatus::Paid
    }
}

/// One line of an order, frozen at creation.
///
/// Uses the snapshot pattern: name and price are copied from the catalog,
/// so later catalog edits never change a placed order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub sku_id: Option<i64>,
    pub product_name: String,
    pub sku_name: Option<String>,
    pub sku_code: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub total_amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn stock_unit(&self) -> StockUnit {
        StockUnit::for_line(self.product_id, self.sku_id)
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

/// An order ready to be persisted, with its lines.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: String,
    pub user_id: i64,
    pub total_amount: Money,
    pub freight_amount: Money,
    pub discount_amount: Money,
    pub pay_amount: Money,
    pub shipping: ShippingInfo,
    pub buyer_message: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// A priced order line ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub sku_id: Option<i64>,
    pub product_name: String,
    pub sku_name: Option<String>,
    pub sku_code: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
    pub total_amount: Money,
}

impl NewOrderItem {
    #[inline]
    pub fn stock_unit(&self) -> StockUnit {
        StockUnit::for_line(self.product_id, self.sku_id)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// One attempt to pay for an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: i64,
    pub payment_no: String,
    pub order_id: i64,
    pub method: PaymentMethod,
    /// Equal to the order's pay amount at creation.
    pub amount_cents: i64,
    pub status: PaymentStatus,
    /// Provider's transaction id, set only on success.
    pub trade_no: Option<String>,
    /// Set only on success.
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// A payment ready to be persisted in `Pending` status.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_no: String,
    pub order_id: i64,
    pub method: PaymentMethod,
    pub amount: Money,
}

// =============================================================================
// Paging
// =============================================================================

/// A normalized page request (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Rows to skip.
    #[inline]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    /// Rows to return.
    #[inline]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
