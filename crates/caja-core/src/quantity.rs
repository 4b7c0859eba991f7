//! # Quantity Module
//!
//! A sale line's quantity is either a count of discrete items or a weight.
//! Which one is decided by the product's category, never by the caller.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request quantity (Decimal, untrusted)                                  │
//! │       │                                                                 │
//! │       ├── ≤ 0 ──────────────────────────────► ValidationError           │
//! │       │                                                                 │
//! │       ├── Unit category, fractional ────────► QuantityGranularityMismatch│
//! │       │                                                                 │
//! │       ├── > 999 ────────────────────────────► ValidationError           │
//! │       │                                                                 │
//! │       ├── Weight, more than 3 decimals ─────► ValidationError           │
//! │       │                                                                 │
//! │       └── OK: Quantity::Units(2) | Quantity::Weight { grams: 1500 }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both variants are stored the same way: thousandths of a unit ("milli").
//! For weights the thousandth of a kilogram is a gram.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::UnitModel;
use crate::{MAX_ITEM_QUANTITY, MILLI_PER_UNIT};

/// Decimal places a weight may carry (grams).
pub const QUANTITY_DECIMALS: u32 = 3;

/// A validated, strictly positive sale quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// Whole number of items.
    Units(i64),
    /// Weight in grams (thousandths of a kilogram).
    Weight { grams: i64 },
}

impl Quantity {
    /// Validates a requested quantity against the product's unit model.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::quantity::Quantity;
    /// use caja_core::types::UnitModel;
    /// use rust_decimal::Decimal;
    ///
    /// let q = Quantity::for_product(1, Decimal::new(15, 1), UnitModel::Weight).unwrap();
    /// assert_eq!(q, Quantity::Weight { grams: 1500 });
    ///
    /// assert!(Quantity::for_product(1, Decimal::new(15, 1), UnitModel::Unit).is_err());
    /// ```
    pub fn for_product(product_id: i64, value: Decimal, model: UnitModel) -> CoreResult<Self> {
        if value <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        if model == UnitModel::Unit && !value.fract().is_zero() {
            return Err(CoreError::QuantityGranularityMismatch {
                product_id,
                quantity: value.normalize(),
            });
        }

        if value > Decimal::from(MAX_ITEM_QUANTITY) {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 0,
                max: MAX_ITEM_QUANTITY,
            }
            .into());
        }

        let milli = to_milli(value, "quantity")?;

        Ok(Self::from_milli(model, milli))
    }

    /// Rebuilds a quantity from its stored thousandths.
    #[inline]
    pub fn from_milli(model: UnitModel, milli: i64) -> Self {
        match model {
            UnitModel::Unit => Quantity::Units(milli / MILLI_PER_UNIT),
            UnitModel::Weight => Quantity::Weight { grams: milli },
        }
    }

    /// Quantity in thousandths, the stored form.
    #[inline]
    pub fn milli(&self) -> i64 {
        match *self {
            Quantity::Units(n) => n * MILLI_PER_UNIT,
            Quantity::Weight { grams } => grams,
        }
    }

    #[inline]
    pub fn unit_model(&self) -> UnitModel {
        match self {
            Quantity::Units(_) => UnitModel::Unit,
            Quantity::Weight { .. } => UnitModel::Weight,
        }
    }

    /// Quantity as a decimal (2 units → 2, 1500 g → 1.5).
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Self::milli_to_decimal(self.milli())
    }

    /// Converts stored thousandths into a normalized decimal.
    #[inline]
    pub fn milli_to_decimal(milli: i64) -> Decimal {
        Decimal::new(milli, QUANTITY_DECIMALS).normalize()
    }
}

/// Converts a decimal amount of units or kilograms into thousandths,
/// rejecting values finer than a thousandth.
pub fn to_milli(value: Decimal, field: &str) -> Result<i64, ValidationError> {
    if value.round_dp(QUANTITY_DECIMALS) != value {
        return Err(ValidationError::TooPrecise {
            field: field.to_string(),
            max_decimals: QUANTITY_DECIMALS,
        });
    }

    (value * Decimal::from(MILLI_PER_UNIT))
        .to_i64()
        .ok_or_else(|| ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX / MILLI_PER_UNIT,
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unit_quantity() {
        let q = Quantity::for_product(1, dec!(2), UnitModel::Unit).unwrap();
        assert_eq!(q, Quantity::Units(2));
        assert_eq!(q.milli(), 2000);
        assert_eq!(q.to_decimal(), dec!(2));
    }

    #[test]
    fn test_unit_quantity_accepts_trailing_zero_scale() {
        // 2.000 is still a whole number
        let q = Quantity::for_product(1, dec!(2.000), UnitModel::Unit).unwrap();
        assert_eq!(q, Quantity::Units(2));
    }

    #[test]
    fn test_weight_quantity() {
        let q = Quantity::for_product(1, dec!(1.5), UnitModel::Weight).unwrap();
        assert_eq!(q, Quantity::Weight { grams: 1500 });
        assert_eq!(q.to_decimal(), dec!(1.5));
        assert_eq!(q.unit_model(), UnitModel::Weight);
    }

    #[test]
    fn test_fraction_on_unit_product_is_granularity_mismatch() {
        let err = Quantity::for_product(9, dec!(1.5), UnitModel::Unit).unwrap_err();
        match err {
            CoreError::QuantityGranularityMismatch { product_id, quantity } => {
                assert_eq!(product_id, 9);
                assert_eq!(quantity, dec!(1.5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        for value in [dec!(0), dec!(-1), dec!(-0.5)] {
            let err = Quantity::for_product(1, value, UnitModel::Weight).unwrap_err();
            assert!(matches!(
                err,
                CoreError::Validation(ValidationError::MustBePositive { .. })
            ));
        }
    }

    #[test]
    fn test_quantity_limit() {
        assert!(Quantity::for_product(1, dec!(999), UnitModel::Unit).is_ok());
        assert!(Quantity::for_product(1, dec!(1000), UnitModel::Unit).is_err());
        assert!(Quantity::for_product(1, dec!(999.001), UnitModel::Weight).is_err());
    }

    #[test]
    fn test_weight_finer_than_a_gram_rejected() {
        let err = Quantity::for_product(1, dec!(0.0005), UnitModel::Weight).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::TooPrecise { max_decimals: 3, .. })
        ));
    }

    #[test]
    fn test_from_milli_round_trips_stored_values() {
        assert_eq!(Quantity::from_milli(UnitModel::Unit, 3000), Quantity::Units(3));
        assert_eq!(
            Quantity::from_milli(UnitModel::Weight, 250),
            Quantity::Weight { grams: 250 }
        );
    }
}
