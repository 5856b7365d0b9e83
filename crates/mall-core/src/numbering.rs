//! # Business Numbers
//!
//! Order and payment numbers, plus provider nonces.
//!
//! ## Format
//! ```text
//! ORD 20261019153045 123456 K7Q2ZD
//! ─┬─ ──────┬─────── ──┬─── ──┬───
//!  │        │          │      └── 6 random [A-Z0-9]
//!  │        │          └── microseconds
//!  │        └── UTC wall clock, second precision
//!  └── prefix (ORD = order, PAY = payment)
//! ```
//!
//! 29 characters, inside the 32-character merchant order id limit of both
//! providers. Numbers sort by creation time; the random suffix separates
//! numbers minted in the same microsecond. Uniqueness is finally enforced
//! by a UNIQUE index.
//!
//! The clock and RNG are passed in so callers and tests control them.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Prefix of order numbers.
pub const ORDER_PREFIX: &str = "ORD";

/// Prefix of payment numbers.
pub const PAYMENT_PREFIX: &str = "PAY";

const SUFFIX_LEN: usize = 6;

const UPPER_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MIXED_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates an order number.
pub fn order_no<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    business_no(ORDER_PREFIX, now, rng)
}

/// Generates a payment number (the provider-facing `out_trade_no`).
pub fn payment_no<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    business_no(PAYMENT_PREFIX, now, rng)
}

/// Random mixed-case alphanumeric string, as used for `nonce_str`.
pub fn nonce<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    random_from(rng, MIXED_ALNUM, len)
}

fn business_no<R: Rng + ?Sized>(prefix: &str, now: DateTime<Utc>, rng: &mut R) -> String {
    format!(
        "{}{}{}",
        prefix,
        now.format("%Y%m%d%H%M%S%6f"),
        random_from(rng, UPPER_ALNUM, SUFFIX_LEN)
    )
}

fn random_from<R: Rng + ?Sized>(rng: &mut R, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 30, 45).unwrap()
            + chrono::Duration::microseconds(123_456)
    }

    #[test]
    fn test_order_no_layout() {
        let mut rng = StdRng::seed_from_u64(7);
        let no = order_no(at(), &mut rng);
        assert_eq!(no.len(), 29);
        assert!(no.starts_with("ORD20261019153045123456"));
        assert!(no[23..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_payment_no_prefix() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(payment_no(at(), &mut rng).starts_with("PAY2026"));
    }

    #[test]
    fn test_same_instant_numbers_differ() {
        let mut rng = StdRng::seed_from_u64(42);
        let numbers: HashSet<String> = (0..1000).map(|_| order_no(at(), &mut rng)).collect();
        assert_eq!(numbers.len(), 1000);
    }

    #[test]
    fn test_nonce_length() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = nonce(&mut rng, 32);
        assert_eq!(n.len(), 32);
        assert!(n.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
