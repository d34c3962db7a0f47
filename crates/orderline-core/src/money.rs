//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With floats:  0.1 + 0.2 = 0.30000000000000004                          │
//! │                                                                         │
//! │  Order totals are sums of price × quantity over many lines, and the    │
//! │  shift reconciliation sums every cash payment of a day. Any drift      │
//! │  shows up as a phantom over/short at the cash drawer.                  │
//! │                                                                         │
//! │  OUR SOLUTION: integer minor units (cents, sen, ...)                   │
//! │    15000 × 2 = 30000, exactly, every time                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use orderline_core::money::Money;
//!
//! let price = Money::from_minor(1099);
//! let line = price.checked_multiply_quantity(3).unwrap();
//! assert_eq!(line.minor(), 3297);
//!
//! let total = line + Money::from_minor(500);
//! assert_eq!(total.minor(), 3797);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: variance on shift close can be negative (cash short)
/// - **Currency agnostic**: the store decides what a minor unit is
/// - **Checked multiplication**: price × quantity must never wrap silently
///
/// ## Where Money Flows
/// ```text
/// Product.price ──► OrderItem.product_price ──► OrderItem.total_price
///                                                      │
///                                   Σ ─────────────────┘
///                                   ▼
///               Order.total_amount ──► Order.final_amount ──► Payment.amount
///                                                                  │
///                          Shift.expected_cash ◄── Σ CASH ─────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies a unit price by a quantity, returning `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use orderline_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(15_000);
    /// assert_eq!(unit_price.checked_multiply_quantity(2), Some(Money::from_minor(30_000)));
    /// assert_eq!(Money::from_minor(i64::MAX).checked_multiply_quantity(2), None);
    /// ```
    #[inline]
    pub fn checked_multiply_quantity(&self, qty: i32) -> Option<Self> {
        self.0.checked_mul(i64::from(qty)).map(Money)
    }

    /// Adds two values, returning `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders as `major.minor` with two decimals. Debug/logging only; terminals
/// format with the store's locale and currency.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl From<i64> for Money {
    fn from(minor: i64) -> Self {
        Money(minor)
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
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
