//! # Pricing
//!
//! Turns requested lines plus catalog snapshots into priced order lines and
//! order totals. The client never supplies a price.
//!
//! ## Flow
//! ```text
//! LineRequest { product 12, sku 40, qty 2 }
//!      │
//!      ├── Product 12 (on sale?)
//!      ├── SKU 40 (belongs to 12? on sale?)
//!      ▼
//! price_line() ── unit = SKU price (else product price)
//!      │          total = unit × qty
//!      ▼
//! NewOrderItem (snapshot) ──► OrderTotals::from_items()
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{NewOrderItem, Product, ProductSku};
use crate::validation::LineRequest;

/// Prices one line from the current catalog snapshot.
///
/// `sku` must be the SKU named by `request.sku_id` (or `None` when the line
/// has no SKU).
pub fn price_line(
    request: &LineRequest,
    product: &Product,
    sku: Option<&ProductSku>,
) -> CoreResult<NewOrderItem> {
    if !product.is_on_sale() {
        return Err(CoreError::ProductUnavailable {
            product_id: product.id,
            name: product.name.clone(),
        });
    }

    let (unit_price, sku_name, sku_code) = match sku {
        Some(sku) => {
            if sku.product_id != product.id {
                return Err(CoreError::SkuMismatch {
                    sku_id: sku.id,
                    product_id: product.id,
                });
            }
            if !sku.is_on_sale() {
                return Err(CoreError::SkuUnavailable {
                    sku_id: sku.id,
                    name: sku.name.clone(),
                });
            }
            (sku.price(), Some(sku.name.clone()), Some(sku.sku_code.clone()))
        }
        None => (product.price(), None, None),
    };

    let total_amount = unit_price
        .checked_mul_quantity(request.quantity)
        .ok_or_else(|| overflow("line total"))?;

    Ok(NewOrderItem {
        product_id: product.id,
        sku_id: sku.map(|s| s.id),
        product_name: product.name.clone(),
        sku_name,
        sku_code,
        unit_price,
        quantity: request.quantity,
        total_amount,
    })
}

// =============================================================================
// Order Totals
// =============================================================================

/// Money figures of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub total_amount: Money,
    pub freight_amount: Money,
    pub discount_amount: Money,
    pub pay_amount: Money,
}

impl OrderTotals {
    /// Sums line totals; freight and discount are zero.
    pub fn from_items(items: &[NewOrderItem]) -> CoreResult<Self> {
        Self::with_adjustments(items, Money::zero(), Money::zero())
    }

    /// Sums line totals and applies freight and discount.
    ///
    /// `pay = total − discount + freight`, never negative.
    pub fn with_adjustments(
        items: &[NewOrderItem],
        freight_amount: Money,
        discount_amount: Money,
    ) -> CoreResult<Self> {
        let total_amount = items.iter().try_fold(Money::zero(), |sum, item| {
            sum.checked_add(item.total_amount)
                .ok_or_else(|| overflow("order total"))
        })?;

        if freight_amount.is_negative() || discount_amount.is_negative() {
            return Err(ValidationError::InvalidFormat {
                field: "adjustment".to_string(),
                reason: "freight and discount must not be negative".to_string(),
            }
            .into());
        }

        let pay_amount = total_amount
            .checked_add(freight_amount)
            .and_then(|gross| gross.checked_sub(discount_amount))
            .ok_or_else(|| overflow("pay amount"))?;

        if pay_amount.is_negative() {
            return Err(ValidationError::InvalidFormat {
                field: "discount_amount".to_string(),
                reason: "discount exceeds order total".to_string(),
            }
            .into());
        }

        Ok(OrderTotals {
            total_amount,
            freight_amount,
            discount_amount,
            pay_amount,
        })
    }
}

fn overflow(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
