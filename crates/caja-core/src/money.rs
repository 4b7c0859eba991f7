//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With floats:                                                           │
//! │    1000.0 * 0.9 * 2 * 0.19 = 341.99999999999994  ❌                     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    180000 cents * 1900 bps / 10000 = 34200 cents  ✅                    │
//! │                                                                         │
//! │  Decimal input (1000.00, 0.19) is converted ONCE at the boundary and   │
//! │  converted back only for display/serialization.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::money::Money;
//!
//! let price = Money::from_cents(100_000); // 1000.00
//! let total = price.checked_add(Money::from_cents(19_000)).unwrap();
//! assert_eq!(total.cents(), 119_000);
//!
//! // Overflow is reported, never wrapped
//! assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::types::TaxRate;
use crate::BPS_SCALE;

/// Number of decimal places carried by money values.
pub const MONEY_DECIMALS: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► PricedLine.subtotal ──► PricedLine.iva_amount  │
/// │                                   │                                     │
/// │                                   ▼                                     │
/// │                Sale.net_amount / iva_total / total_amount               │
/// │                                   │                                     │
/// │                                   ▼                                     │
/// │                         DailyReport sums                                │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the value as a two-decimal `Decimal` (for serialization).
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(180000).to_decimal().to_string(), "1800.00");
    /// ```
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MONEY_DECIMALS)
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Calculates tax on this amount, rounding half-up to the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * rate + 5000) / 10000`.
    /// The +5000 provides rounding (5000/10000 = 0.5). Amounts in this
    /// system are never negative (refunds are out of scope), so adding the
    /// half before truncating is exactly round-half-up.
    ///
    /// Returns `None` when the tax does not fit in `i64` cents.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    /// use caja_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_cents(180000); // 1800.00
    /// let rate = TaxRate::from_bps(1900);       // 19%
    /// assert_eq!(subtotal.calculate_tax(rate).unwrap().cents(), 34200);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Option<Money> {
        let scale = BPS_SCALE as i128;
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + scale / 2) / scale;
        i64::try_from(tax_cents).ok().map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display for logs and error messages only; the frontend formats currency.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.to_decimal())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
