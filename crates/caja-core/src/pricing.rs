//! # Pricing Engine
//!
//! Turns (product snapshot, quantity, tax rate) into a priced line, and a
//! set of priced lines into sale totals. Pure: the tax rate is a parameter,
//! read once per sale by the caller.
//!
//! ## Line Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  subtotal   = round½↑( price × quantity × (1 − discount) )             │
//! │  iva_amount = 0                              if exempt                  │
//! │             = round½↑( subtotal × rate )     otherwise                  │
//! │  line_total = subtotal + iva_amount                                     │
//! │                                                                         │
//! │  Integer form (no floats, one rounding per value):                      │
//! │                                                                         │
//! │  subtotal_cents = ⌊ (cents × milli × (10000 − disc_bps)                 │
//! │                      + 5_000_000) / 10_000_000 ⌋                        │
//! │                                                                         │
//! │  Example: 1000.00 × 2 units, 10% off, IVA 19%                           │
//! │    100000 × 2000 × 9000 / 10^7 = 180000  → 1800.00                     │
//! │    180000 × 1900 / 10^4        =  34200  →  342.00                     │
//! │    line_total                  = 214200  → 2142.00                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sale Totals
//! Totals are sums of already-rounded line values, never a rounding of the
//! unrounded sum, so the header always reconciles with its lines.
//!
//! Every amount is computed in `i128` and narrowed with a checked
//! conversion: a value that does not fit in `i64` cents is a
//! `ValidationError::OutOfRange`, never a wrapped number.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{Category, Discount, Product, TaxRate, UnitModel};
use crate::{BPS_SCALE, MILLI_PER_UNIT};

// =============================================================================
// Inputs
// =============================================================================

/// The money-affecting facts of a product at the instant of sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: i64,
    pub price: Money,
    pub discount: Discount,
    pub is_iva_exempt: bool,
    pub unit_model: UnitModel,
}

impl ProductSnapshot {
    /// Captures a snapshot from the stored product and its category.
    pub fn capture(product: &Product, category: &Category) -> Self {
        ProductSnapshot {
            product_id: product.id,
            price: product.price(),
            discount: product.discount(),
            is_iva_exempt: product.is_iva_exempt,
            unit_model: category.unit_model(),
        }
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// A fully priced sale line, ready to be written to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub discount: Discount,
    pub is_iva_exempt: bool,
    /// Rate actually applied: zero for exempt products.
    pub applied_rate: TaxRate,
    pub subtotal: Money,
    pub iva_amount: Money,
    pub line_total: Money,
}

/// Header totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SaleTotals {
    pub net_amount: Money,
    pub iva_total: Money,
    pub total_amount: Money,
}

impl SaleTotals {
    /// Sums already-rounded line values.
    ///
    /// Fails with `OutOfRange` when a sum does not fit in `i64` cents.
    pub fn from_lines<'a, I>(lines: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = &'a PricedLine>,
    {
        let mut totals = SaleTotals::default();
        for line in lines {
            totals.net_amount = checked_sum(totals.net_amount, line.subtotal, "net_amount")?;
            totals.iva_total = checked_sum(totals.iva_total, line.iva_amount, "iva_total")?;
        }
        totals.total_amount = checked_sum(totals.net_amount, totals.iva_total, "total_amount")?;
        Ok(totals)
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Prices one line.
///
/// ## Errors
/// - `Validation` when the quantity is non-positive, too large or too precise
/// - `QuantityGranularityMismatch` when a unit product gets a fraction
/// - `Validation(OutOfRange)` when an amount does not fit in `i64` cents
///
/// ## Example
/// ```rust
/// use caja_core::money::Money;
/// use caja_core::pricing::{price_line, ProductSnapshot};
/// use caja_core::types::{Discount, TaxRate, UnitModel};
/// use rust_decimal::Decimal;
///
/// let snapshot = ProductSnapshot {
///     product_id: 1,
///     price: Money::from_cents(100_000),
///     discount: Discount::from_bps(1000),
///     is_iva_exempt: false,
///     unit_model: UnitModel::Unit,
/// };
/// let line = price_line(&snapshot, Decimal::from(2), TaxRate::from_bps(1900)).unwrap();
/// assert_eq!(line.line_total.cents(), 214_200);
/// ```
pub fn price_line(
    snapshot: &ProductSnapshot,
    quantity: Decimal,
    rate: TaxRate,
) -> CoreResult<PricedLine> {
    let quantity = Quantity::for_product(snapshot.product_id, quantity, snapshot.unit_model)?;

    let subtotal = discounted_subtotal(snapshot.price, quantity.milli(), snapshot.discount)?;

    let applied_rate = if snapshot.is_iva_exempt {
        TaxRate::zero()
    } else {
        rate
    };
    let iva_amount = subtotal
        .calculate_tax(applied_rate)
        .ok_or_else(|| out_of_range("iva_amount"))?;
    let line_total = checked_sum(subtotal, iva_amount, "line_total")?;

    Ok(PricedLine {
        product_id: snapshot.product_id,
        quantity,
        unit_price: snapshot.price,
        discount: snapshot.discount,
        is_iva_exempt: snapshot.is_iva_exempt,
        applied_rate,
        subtotal,
        iva_amount,
        line_total,
    })
}

/// `price × quantity × (1 − discount)`, rounded half-up once.
fn discounted_subtotal(
    price: Money,
    quantity_milli: i64,
    discount: Discount,
) -> Result<Money, ValidationError> {
    let keep_bps = (BPS_SCALE - discount.bps().min(BPS_SCALE)) as i128;
    let numerator = price.cents() as i128 * quantity_milli as i128 * keep_bps;
    let denominator = MILLI_PER_UNIT as i128 * BPS_SCALE as i128;

    i64::try_from((numerator + denominator / 2) / denominator)
        .map(Money::from_cents)
        .map_err(|_| out_of_range("subtotal"))
}

fn checked_sum(a: Money, b: Money, field: &str) -> Result<Money, ValidationError> {
    a.checked_add(b).ok_or_else(|| out_of_range(field))
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use rust_decimal_macros::dec;

    const IVA: TaxRate = TaxRate::from_bps(1900);

    fn snapshot(price_cents: i64, discount_bps: u32, exempt: bool, model: UnitModel) -> ProductSnapshot {
        ProductSnapshot {
            product_id: 1,
            price: Money::from_cents(price_cents),
            discount: Discount::from_bps(discount_bps),
            is_iva_exempt: exempt,
            unit_model: model,
        }
    }

    #[test]
    fn test_discounted_unit_line() {
        // 1000.00, 10% off, 2 units, IVA 19%
        let line = price_line(&snapshot(100_000, 1000, false, UnitModel::Unit), dec!(2), IVA).unwrap();

        assert_eq!(line.subtotal.cents(), 180_000);
        assert_eq!(line.iva_amount.cents(), 34_200);
        assert_eq!(line.line_total.cents(), 214_200);
        assert_eq!(line.applied_rate, IVA);
        assert_eq!(line.quantity, Quantity::Units(2));
    }

    #[test]
    fn test_exempt_weighted_line() {
        // 2000.00/kg, 1.5 kg, exempt
        let line =
            price_line(&snapshot(200_000, 0, true, UnitModel::Weight), dec!(1.5), IVA).unwrap();

        assert_eq!(line.subtotal.cents(), 300_000);
        assert!(line.iva_amount.is_zero());
        assert_eq!(line.line_total.cents(), 300_000);
        assert!(line.applied_rate.is_zero());
    }

    #[test]
    fn test_fraction_on_unit_product_fails() {
        let err = price_line(&snapshot(200_000, 0, false, UnitModel::Unit), dec!(1.5), IVA)
            .unwrap_err();
        assert!(matches!(err, CoreError::QuantityGranularityMismatch { .. }));
    }

    #[test]
    fn test_zero_quantity_fails() {
        let err = price_line(&snapshot(100, 0, false, UnitModel::Unit), dec!(0), IVA).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_rounding_applied_once_per_line() {
        // 0.33/kg × 0.333 kg = 0.10989 → 0.11, not 0.33 rounded per gram
        let line =
            price_line(&snapshot(33, 0, false, UnitModel::Weight), dec!(0.333), IVA).unwrap();
        assert_eq!(line.subtotal.cents(), 11);
        // 0.11 × 0.19 = 0.0209 → 0.02
        assert_eq!(line.iva_amount.cents(), 2);
    }

    #[test]
    fn test_subtotal_rounds_half_up() {
        // 0.05 × 0.5 kg = 0.025 → 0.03
        let line = price_line(&snapshot(5, 0, true, UnitModel::Weight), dec!(0.5), IVA).unwrap();
        assert_eq!(line.subtotal.cents(), 3);

        // 0.05 × 0.3 kg = 0.015 → 0.02 ; 0.05 × 0.29 kg = 0.0145 → 0.01
        let line = price_line(&snapshot(5, 0, true, UnitModel::Weight), dec!(0.3), IVA).unwrap();
        assert_eq!(line.subtotal.cents(), 2);
        let line = price_line(&snapshot(5, 0, true, UnitModel::Weight), dec!(0.29), IVA).unwrap();
        assert_eq!(line.subtotal.cents(), 1);
    }

    #[test]
    fn test_full_discount_is_free() {
        let line = price_line(&snapshot(1999, 10_000, false, UnitModel::Unit), dec!(3), IVA).unwrap();
        assert!(line.subtotal.is_zero());
        assert!(line.line_total.is_zero());
    }

    #[test]
    fn test_totals_are_sum_of_rounded_lines() {
        // Each line is 0.11 + 0.02 after rounding; the unrounded IVA sum
        // would be 0.0627.
        let s = snapshot(33, 0, false, UnitModel::Weight);
        let lines: Vec<PricedLine> = [dec!(0.333), dec!(0.333), dec!(0.333)]
            .into_iter()
            .map(|q| price_line(&s, q, IVA).unwrap())
            .collect();

        let totals = SaleTotals::from_lines(&lines).unwrap();
        assert_eq!(totals.net_amount.cents(), 33);
        assert_eq!(totals.iva_total.cents(), 6);
        assert_eq!(totals.total_amount.cents(), 39);
    }

    #[test]
    fn test_totals_reconcile_for_mixed_sales() {
        let snapshots = [
            snapshot(100_000, 1000, false, UnitModel::Unit),
            snapshot(200_000, 0, true, UnitModel::Weight),
            snapshot(1_299, 1250, false, UnitModel::Weight),
            snapshot(7, 0, false, UnitModel::Unit),
            snapshot(45_990, 333, false, UnitModel::Unit),
        ];
        let quantities = [dec!(2), dec!(1.5), dec!(0.437), dec!(13), dec!(999)];

        for rate in [TaxRate::zero(), TaxRate::from_bps(1900), TaxRate::from_bps(2345)] {
            let lines: Vec<PricedLine> = snapshots
                .iter()
                .zip(quantities)
                .map(|(s, q)| price_line(s, q, rate).unwrap())
                .collect();
            let totals = SaleTotals::from_lines(&lines).unwrap();

            let net: i64 = lines.iter().map(|l| l.subtotal.cents()).sum();
            let iva: i64 = lines.iter().map(|l| l.iva_amount.cents()).sum();
            assert_eq!(totals.net_amount.cents(), net);
            assert_eq!(totals.iva_total.cents(), iva);
            assert_eq!(totals.total_amount.cents(), net + iva);
            for line in &lines {
                assert_eq!(
                    line.line_total.cents(),
                    line.subtotal.cents() + line.iva_amount.cents()
                );
            }
        }
    }

    #[test]
    fn test_subtotal_overflow_is_rejected() {
        // 1e14.00 × 999 units would wrap to a negative i64
        let huge = snapshot(10_000_000_000_000_000, 0, true, UnitModel::Unit);
        let err = price_line(&huge, dec!(999), IVA).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "subtotal"
        ));

        // One unit still prices
        let line = price_line(&huge, dec!(1), IVA).unwrap();
        assert_eq!(line.subtotal.cents(), 10_000_000_000_000_000);
    }

    #[test]
    fn test_tax_overflow_is_rejected() {
        // Subtotal fits, subtotal + 19% does not
        let s = snapshot(9_000_000_000_000_000, 0, false, UnitModel::Unit);
        let err = price_line(&s, dec!(1), IVA).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "line_total"
        ));
    }

    #[test]
    fn test_totals_overflow_is_rejected() {
        // Each line fits on its own, their sum does not
        let s = snapshot(5_000_000_000_000_000, 0, true, UnitModel::Unit);
        let line = price_line(&s, dec!(1), IVA).unwrap();

        let err = SaleTotals::from_lines(&[line, line]).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "net_amount"));
    }

    #[test]
    fn test_max_price_and_quantity_fits() {
        let s = snapshot(crate::MAX_PRICE_CENTS, 0, false, UnitModel::Unit);
        let line = price_line(&s, dec!(999), IVA).unwrap();
        let lines = vec![line; crate::MAX_SALE_LINES];

        let totals = SaleTotals::from_lines(&lines).unwrap();
        assert_eq!(totals.net_amount.cents(), crate::MAX_PRICE_CENTS * 999 * 100);
    }
}
