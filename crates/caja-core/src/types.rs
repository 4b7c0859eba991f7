//! # Domain Types
//!
//! Core domain types used throughout Caja POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Category     │   │    Product      │   │    TaxRate      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  category_id    │   │  bps (u32)      │       │
//! │  │  name (unique)  │   │  price_cents    │   │  1900 = 19%     │       │
//! │  │  is_weighted    │   │  stock_milli    │   └─────────────────┘       │
//! │  └─────────────────┘   │  discount_bps   │                              │
//! │                        │  is_iva_exempt  │                              │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────────────────────┐        │
//! │  │      Sale       │   │            SaleDetail                │        │
//! │  │  ─────────────  │   │  ──────────────────────────────────  │        │
//! │  │  id             │◄──│  sale_id, line_no, product_id        │        │
//! │  │  sale_date      │   │  price_at_sale_cents     (snapshot)  │        │
//! │  │  cashier_id     │   │  discount_at_sale_bps    (snapshot)  │        │
//! │  │  net / iva /    │   │  iva_percentage_at_sale  (snapshot)  │        │
//! │  │  total (cents)  │   │  subtotal / iva / line_total         │        │
//! │  └─────────────────┘   └──────────────────────────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage Units
//! - Money: cents (`i64`)
//! - Tax rates and discounts: basis points (`u32`, 10000 = 100%)
//! - Stock and quantities: thousandths of a unit or kilogram (`i64`)

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::BPS_SCALE;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1900 bps = 19% (Chilean IVA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Decimal places a rate fraction may carry (0.1234 = 1234 bps).
    pub const FRACTION_DECIMALS: u32 = 4;

    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a fraction in `0.0..=1.0` (0.19 = 19%).
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::types::TaxRate;
    /// use rust_decimal::Decimal;
    ///
    /// let rate = TaxRate::from_fraction(Decimal::new(19, 2)).unwrap();
    /// assert_eq!(rate.bps(), 1900);
    /// assert!(TaxRate::from_fraction(Decimal::new(15, 1)).is_err());
    /// ```
    pub fn from_fraction(fraction: Decimal) -> Result<Self, ValidationError> {
        if fraction.is_sign_negative() || fraction > Decimal::ONE {
            return Err(ValidationError::OutOfRange {
                field: "rate".to_string(),
                min: 0,
                max: 1,
            });
        }

        if fraction.round_dp(Self::FRACTION_DECIMALS) != fraction {
            return Err(ValidationError::TooPrecise {
                field: "rate".to_string(),
                max_decimals: Self::FRACTION_DECIMALS,
            });
        }

        let bps = (fraction * Decimal::from(BPS_SCALE))
            .to_u32()
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "rate".to_string(),
                min: 0,
                max: 1,
            })?;

        Ok(TaxRate(bps))
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a fraction (1900 bps → 0.19).
    #[inline]
    pub fn fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, Self::FRACTION_DECIMALS).normalize()
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Discount
// =============================================================================

/// Per-product price discount in basis points of the unit price.
///
/// Entered as a percentage (10 = 10% off), stored as bps (1000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount(u32);

impl Discount {
    /// Decimal places a discount percentage may carry (12.5% is fine).
    pub const PERCENT_DECIMALS: u32 = 2;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Discount(bps)
    }

    /// A missing discount behaves as 0%.
    #[inline]
    pub fn from_optional_bps(bps: Option<u32>) -> Self {
        Discount(bps.unwrap_or(0))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the discount as a percentage (1000 bps → 10).
    #[inline]
    pub fn percent(&self) -> Decimal {
        Decimal::new(self.0 as i64, Self::PERCENT_DECIMALS).normalize()
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Unit Model
// =============================================================================

/// How a product's quantity is measured, derived from its category's
/// `is_weighted` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UnitModel {
    /// Discrete items; quantities must be whole numbers.
    Unit,
    /// Sold by weight (kg); quantities may be fractional.
    Weight,
}

impl UnitModel {
    #[inline]
    pub const fn from_is_weighted(is_weighted: bool) -> Self {
        if is_weighted {
            UnitModel::Weight
        } else {
            UnitModel::Unit
        }
    }

    #[inline]
    pub const fn is_weighted(&self) -> bool {
        matches!(self, UnitModel::Weight)
    }
}

// =============================================================================
// Category
// =============================================================================

/// A product category. `is_weighted` decides the unit model of every
/// product in it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: i64,
    /// Unique display name.
    pub name: String,
    pub is_weighted: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Category {
    #[inline]
    pub fn unit_model(&self) -> UnitModel {
        UnitModel::from_is_weighted(self.is_weighted)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,

    /// Owning category (decides unit vs. weight).
    pub category_id: i64,

    /// Barcode (EAN-13 etc.), optional.
    pub bar_code: Option<String>,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub description: Option<String>,

    pub brand: Option<String>,

    /// Current stock in thousandths (units or kg).
    pub stock_milli: i64,

    /// Restocking threshold in thousandths.
    pub min_stock_milli: i64,

    /// Price in cents, per unit or per kilogram.
    pub price_cents: i64,

    /// Discount in basis points of the price (1000 = 10% off).
    pub discount_bps: Option<u32>,

    pub is_iva_exempt: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn discount(&self) -> Discount {
        Discount::from_optional_bps(self.discount_bps)
    }

    /// Current stock as a decimal quantity.
    #[inline]
    pub fn stock(&self) -> Decimal {
        Quantity::milli_to_decimal(self.stock_milli)
    }

    #[inline]
    pub fn min_stock(&self) -> Decimal {
        Quantity::milli_to_decimal(self.min_stock_milli)
    }

    /// True when stock has fallen to or below the restocking threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock_milli <= self.min_stock_milli
    }
}

// =============================================================================
// Tax Rate Registry Records
// =============================================================================

/// Current value of one tax kind (e.g. "iva").
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TaxRateSetting {
    pub kind: String,
    pub rate_bps: u32,
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl TaxRateSetting {
    #[inline]
    pub fn rate(&self) -> TaxRate {
        TaxRate::from_bps(self.rate_bps)
    }
}

/// One append-only entry in a tax kind's history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TaxRateChange {
    pub id: i64,
    pub kind: String,
    pub rate_bps: u32,
    /// Absent for the first value ever recorded for this kind.
    pub previous_bps: Option<u32>,
    #[ts(as = "String")]
    pub changed_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    /// Client-supplied idempotency key, if any.
    pub request_id: Option<String>,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    pub cashier_id: i64,
    pub net_amount_cents: i64,
    pub iva_total_cents: i64,
    pub total_amount_cents: i64,
    /// Lines in request order; loaded separately from the header row.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub details: Vec<SaleDetail>,
}

impl Sale {
    #[inline]
    pub fn net_amount(&self) -> Money {
        Money::from_cents(self.net_amount_cents)
    }

    #[inline]
    pub fn iva_total(&self) -> Money {
        Money::from_cents(self.iva_total_cents)
    }

    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Header totals equal the sums of the stored line values and
    /// `total == net + iva`.
    pub fn reconciles(&self) -> bool {
        let net: i64 = self.details.iter().map(|d| d.subtotal_cents).sum();
        let iva: i64 = self.details.iter().map(|d| d.iva_amount_cents).sum();

        net == self.net_amount_cents
            && iva == self.iva_total_cents
            && self.total_amount_cents == self.net_amount_cents + self.iva_total_cents
    }
}

// =============================================================================
// Sale Detail
// =============================================================================

/// A line of a committed sale.
/// Every `*_at_sale` field is a snapshot frozen at commit time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleDetail {
    pub id: i64,
    pub sale_id: i64,
    /// Position within the sale, starting at 1.
    pub line_no: i64,
    pub product_id: i64,
    pub unit_model: UnitModel,
    /// Quantity sold in thousandths.
    pub quantity_milli: i64,
    pub price_at_sale_cents: i64,
    pub discount_at_sale_bps: u32,
    pub is_iva_exempt_at_sale: bool,
    /// Rate actually applied to this line: 0 when exempt.
    pub iva_percentage_at_sale_bps: u32,
    pub subtotal_cents: i64,
    pub iva_amount_cents: i64,
    pub line_total_cents: i64,
}

impl SaleDetail {
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.unit_model, self.quantity_milli)
    }

    #[inline]
    pub fn price_at_sale(&self) -> Money {
        Money::from_cents(self.price_at_sale_cents)
    }

    #[inline]
    pub fn discount_at_sale(&self) -> Discount {
        Discount::from_bps(self.discount_at_sale_bps)
    }

    #[inline]
    pub fn iva_percentage_at_sale(&self) -> TaxRate {
        TaxRate::from_bps(self.iva_percentage_at_sale_bps)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn iva_amount(&self) -> Money {
        Money::from_cents(self.iva_amount_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Sale Request
// =============================================================================

/// One requested line: which product and how much of it.
///
/// The quantity is untrusted; it is checked against the product's unit
/// model when the sale is priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: i64,
    pub quantity: Decimal,
}

/// Input to `CreateSale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    pub cashier_id: i64,
    pub lines: Vec<SaleLineRequest>,
    /// Optional idempotency key (UUID); a replay returns the first sale.
    #[serde(default)]
    pub request_id: Option<String>,
}

// =============================================================================
// Reports
// =============================================================================

/// Per-cashier slice of a daily report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashierTotals {
    pub count: i64,
    pub total_amount_cents: i64,
}

/// Aggregate of every committed sale whose `sale_date` falls on one
/// calendar day in a fixed UTC offset.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyReport {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub utc_offset_minutes: i32,
    pub total_sales_count: i64,
    pub total_net_amount_cents: i64,
    pub total_iva_amount_cents: i64,
    pub total_gross_amount_cents: i64,
    pub cashier_breakdown: BTreeMap<i64, CashierTotals>,
}

impl DailyReport {
    /// A report for a day without sales.
    pub fn empty(date: NaiveDate, utc_offset_minutes: i32) -> Self {
        DailyReport {
            date,
            utc_offset_minutes,
            total_sales_count: 0,
            total_net_amount_cents: 0,
            total_iva_amount_cents: 0,
            total_gross_amount_cents: 0,
            cashier_breakdown: BTreeMap::new(),
        }
    }

    /// Folds one committed sale into the report.
    pub fn add_sale(&mut self, sale: &Sale) {
        self.total_sales_count += 1;
        self.total_net_amount_cents += sale.net_amount_cents;
        self.total_iva_amount_cents += sale.iva_total_cents;
        self.total_gross_amount_cents += sale.total_amount_cents;

        let cashier = self.cashier_breakdown.entry(sale.cashier_id).or_default();
        cashier.count += 1;
        cashier.total_amount_cents += sale.total_amount_cents;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
