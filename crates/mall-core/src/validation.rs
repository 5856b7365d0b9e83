//! # Validation Module
//!
//! Request validation for order placement and listings.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP (axum)                                                  │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Line count and quantities                                         │
//! │  └── Receiver fields and buyer note                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Catalog checks (pricing module, against live snapshots)      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: Database                                                     │
//! │  └── CHECK (stock >= 0), UNIQUE, FOREIGN KEY                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here touches the catalog; a request that passes can still be
//! rejected for an unknown product or missing stock.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::{PageRequest, ShippingInfo};
use crate::{DEFAULT_PAGE_SIZE, MAX_BUYER_MESSAGE_CHARS, MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PAGE_SIZE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// One requested line of a new order. Carries no price on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub product_id: i64,
    #[serde(default)]
    pub sku_id: Option<i64>,
    pub quantity: i64,
}

// =============================================================================
// Order Request
// =============================================================================

/// Validates a whole order request before any catalog lookup.
///
/// ## Rules
/// - 1..=`MAX_ORDER_LINES` lines, each quantity 1..=`MAX_ITEM_QUANTITY`
/// - receiver name, phone, and address present
/// - buyer message at most `MAX_BUYER_MESSAGE_CHARS` characters
pub fn validate_order_request(
    lines: &[LineRequest],
    shipping: &ShippingInfo,
    buyer_message: Option<&str>,
) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    for line in lines {
        validate_quantity(line.quantity)?;
    }

    validate_required("receiver_name", &shipping.receiver_name, 50)?;
    validate_phone(&shipping.receiver_phone)?;
    validate_required("receiver_address", &shipping.receiver_address, 200)?;

    if let Some(message) = buyer_message {
        if message.chars().count() > MAX_BUYER_MESSAGE_CHARS {
            return Err(ValidationError::TooLong {
                field: "buyer_message".to_string(),
                max: MAX_BUYER_MESSAGE_CHARS,
            });
        }
    }

    Ok(())
}

/// Validates a line quantity.
///
/// ## Example
/// ```rust
/// use mall_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(1000).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a receiver phone number.
///
/// Accepts digits with an optional leading `+` and inner `-`/spaces,
/// 5 to 20 digits in total. Carrier-specific formats are not enforced.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "receiver_phone".to_string(),
        });
    }

    let body = phone.strip_prefix('+').unwrap_or(phone);
    let well_formed = body
        .chars()
        .all(|c| c.is_ascii_digit() || c == '-' || c == ' ');
    let digits = body.chars().filter(char::is_ascii_digit).count();

    if !well_formed || !(5..=20).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "receiver_phone".to_string(),
            reason: "expected 5-20 digits".to_string(),
        });
    }

    Ok(())
}

fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Paging
// =============================================================================

/// Normalizes listing parameters.
///
/// Missing or zero page becomes 1. A size that is missing, zero, or above
/// `MAX_PAGE_SIZE` falls back to `DEFAULT_PAGE_SIZE`.
pub fn normalize_page(page: Option<u32>, page_size: Option<u32>) -> PageRequest {
    let page = page.filter(|p| *p > 0).unwrap_or(1);
    let page_size = page_size
        .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
        .unwrap_or(DEFAULT_PAGE_SIZE);
    PageRequest { page, page_size }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            receiver_name: "Li Lei".to_string(),
            receiver_phone: "13800138000".to_string(),
            receiver_address: "1 Nanjing Rd, Shanghai".to_string(),
        }
    }

    fn line(quantity: i64) -> LineRequest {
        LineRequest {
            product_id: 1,
            sku_id: None,
            quantity,
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(validate_order_request(&[line(1), line(3)], &shipping(), Some("ring the bell")).is_ok());
    }

    #[test]
    fn test_empty_order_rejected() {
        let err = validate_order_request(&[], &shipping(), None).unwrap_err();
        assert!(matches!(err, ValidationError::Required { field } if field == "items"));
    }

    #[test]
    fn test_too_many_lines_rejected() {
        let lines = vec![line(1); MAX_ORDER_LINES + 1];
        assert!(validate_order_request(&lines, &shipping(), None).is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_order_request(&[line(0)], &shipping(), None).is_err());
        assert!(validate_order_request(&[line(-2)], &shipping(), None).is_err());
        assert!(validate_order_request(&[line(MAX_ITEM_QUANTITY)], &shipping(), None).is_ok());
    }

    #[test]
    fn test_receiver_fields_required() {
        let mut info = shipping();
        info.receiver_address = "   ".to_string();
        assert!(validate_order_request(&[line(1)], &info, None).is_err());

        let mut info = shipping();
        info.receiver_phone = "call me".to_string();
        assert!(validate_order_request(&[line(1)], &info, None).is_err());
    }

    #[test]
    fn test_phone_formats() {
        assert!(validate_phone("13800138000").is_ok());
        assert!(validate_phone("+86 138-0013-8000").is_ok());
        assert!(validate_phone("1234").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_buyer_message_length_counts_characters() {
        let note = "好".repeat(MAX_BUYER_MESSAGE_CHARS);
        assert!(validate_order_request(&[line(1)], &shipping(), Some(&note)).is_ok());
        let note = "好".repeat(MAX_BUYER_MESSAGE_CHARS + 1);
        assert!(validate_order_request(&[line(1)], &shipping(), Some(&note)).is_err());
    }

    #[test]
    fn test_normalize_page() {
        assert_eq!(normalize_page(None, None), PageRequest { page: 1, page_size: 20 });
        assert_eq!(normalize_page(Some(0), Some(0)), PageRequest { page: 1, page_size: 20 });
        assert_eq!(normalize_page(Some(4), Some(100)), PageRequest { page: 4, page_size: 100 });
        assert_eq!(normalize_page(Some(4), Some(101)), PageRequest { page: 4, page_size: 20 });
        assert_eq!(normalize_page(Some(2), Some(500)), PageRequest { page: 2, page_size: 20 });
    }
}
