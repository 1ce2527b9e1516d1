//! # Money Module
//!
//! Provides the `Money` type used by every price, discount and total.
//!
//! ## Minor Units, Never Floats
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Display layer:   "190.80"                                              │
//! │                      ▲                                                  │
//! │                      │ Display                                          │
//! │  Money:           Money(19080)      ← all arithmetic happens here       │
//! │                      ▲                                                  │
//! │                      │ from_cents                                       │
//! │  Catalog / cart:  unitPrice = 10000 (100.00)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Percentages are basis points (1000 = 10%). Percentage math rounds
//! half-up to the nearest minor unit, which is the only rounding that ever
//! happens in a cart summary.
//!
//! ## Usage
//! ```rust
//! use storefront_core::money::Money;
//!
//! let unit = Money::from_cents(10000);      // 100.00
//! let line = unit.multiply_quantity(2);     // 200.00
//! assert_eq!(line.percentage(1000).cents(), 2000); // 10% = 20.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in one whole (100%).
pub const BPS_SCALE: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// The currency itself is carried next to the value (on the line item or
/// the summary), never inside it, so two `Money` values can only be mixed
/// once the caller has checked the currencies agree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(190, 80).cents(), 19080);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        Money(major * 100 + minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, saturating at the i64 bounds.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies a unit price by a quantity, `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns `bps` basis points of this amount, rounded half-up.
    ///
    /// ## Rounding
    /// `(amount × bps + 5000) / 10000` in i128 so large carts can't
    /// overflow. Callers only pass non-negative amounts, where adding half
    /// the divisor before truncating is exactly round-half-up.
    ///
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// // 10.00 at 8.25% = 0.825 → 0.83
    /// assert_eq!(Money::from_cents(1000).percentage(825).cents(), 83);
    /// // 180.00 at 6% = 10.80
    /// assert_eq!(Money::from_cents(18000).percentage(600).cents(), 1080);
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        let scale = BPS_SCALE as i128;
        let value = (self.0 as i128 * bps as i128 + scale / 2) / scale;
        Money(value as i64)
    }

    /// Clamps negative values to zero.
    #[inline]
    pub fn non_negative(self) -> Money {
        Money(self.0.max(0))
    }

    /// Subtracts without going below zero.
    #[inline]
    pub fn saturating_sub(self, other: Money) -> Money {
        (self - other).non_negative()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering ("190.80"). Currency symbols and localisation
/// belong to the UI layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
