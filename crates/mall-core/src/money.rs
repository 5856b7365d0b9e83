//! # Money
//!
//! Every amount in the mall is an `i64` count of fen (0.01 CNY). Floats never
//! appear: prices, line totals, order totals and payment amounts are added,
//! compared and signed as integers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  One amount, three spellings                                            │
//! │                                                                         │
//! │    storage / domain        9900        Money(9900)                      │
//! │    WeChat total_fee        "9900"      integer fen                      │
//! │    Alipay total_amount     "99.00"     decimal yuan, two places         │
//! │                                                                         │
//! │  to_decimal_string / parse_decimal convert exactly, no rounding.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use mall_core::money::Money;
//!
//! let line = Money::from_cents(9900).checked_mul_quantity(3).unwrap();
//! assert_eq!(line.to_decimal_string(), "297.00");
//! assert_eq!(Money::parse_decimal("297.00").unwrap(), line);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use ts_rs::TS;

use crate::error::ValidationError;

const FEN_PER_YUAN: i64 = 100;

/// An amount in fen. Serializes as the bare integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Unit price times quantity; `None` when the line would overflow.
    #[inline]
    pub fn checked_mul_quantity(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Money)
    }

    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    #[inline]
    pub fn checked_sub(self, other: Money) -> Option<Self> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// `"99.00"`, `"0.05"`, `"-5.50"`: Alipay's `total_amount` format, also
    /// used for amounts in API responses.
    pub fn to_decimal_string(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = FEN_PER_YUAN as u64;
        format!("{}{}.{:02}", sign, abs / per, abs % per)
    }

    /// Parses a non-negative yuan amount with at most two fraction digits.
    ///
    /// Accepts `"99"`, `"99.5"`, `"99.00"`. Rejects signs, exponents,
    /// whitespace, a bare `"."` on either side, and a third fraction digit.
    pub fn parse_decimal(input: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

        let (yuan, fen) = match input.split_once('.') {
            Some((_, "")) => return Err(invalid("missing fraction digits")),
            Some(parts) => parts,
            None => (input, ""),
        };
        if yuan.is_empty() || !all_digits(yuan) {
            return Err(invalid("expected digits before the decimal point"));
        }
        if fen.len() > 2 || !all_digits(fen) {
            return Err(invalid("expected at most two fraction digits"));
        }

        let yuan: i64 = yuan.parse().map_err(|_| invalid("amount too large"))?;
        // "5" after the point is fifty fen.
        let fen = format!("{:0<2}", fen).parse::<i64>().unwrap_or(0);

        yuan.checked_mul(FEN_PER_YUAN)
            .and_then(|cents| cents.checked_add(fen))
            .map(Money)
            .ok_or_else(|| invalid("amount too large"))
    }
}

/// `¥99.00`, for logs and messages.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decimal = self.to_decimal_string();
        match decimal.strip_prefix('-') {
            Some(abs) => write!(f, "-¥{}", abs),
            None => write!(f, "¥{}", decimal),
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}
