//! Subtotal computation. All money is integer minor-currency units; no
//! floating point enters the pricing path.

use crate::dates::DateSpan;
use crate::error::{Error, Result};

/// `subtotal = price per day × inclusive day count`.
///
/// A 3-day range charges 3 days, not 2: 50200/day over
/// 2023-10-27..2023-10-29 is 150600.
pub fn order_subtotal_cents(price_cents: i64, span: &DateSpan) -> Result<i64> {
    if price_cents < 0 {
        return Err(Error::validation(format!(
            "price per day must be non-negative, got {price_cents}"
        )));
    }
    price_cents
        .checked_mul(span.days())
        .ok_or_else(|| Error::validation("subtotal overflows 64-bit cents"))
}
