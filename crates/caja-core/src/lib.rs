//! # caja-core: Pure Business Logic for Caja POS
//!
//! This crate holds the rules that turn a cart of product references into a
//! tax-correct sale: money, tax rates, discounts, the unit/weight quantity
//! model, and the Pricing Engine. Everything here is a pure function.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 caja-server (axum HTTP API)                     │   │
//! │  │    POST /sales/ ─ GET /admin/reports ─ PUT /admin/tax_rate      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          caja-db (SQLite, SaleProcessor, repositories)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │  money   │ │ quantity │ │ pricing  │          │   │
//! │  │   │ Product  │ │  Money   │ │  Units   │ │price_line│          │   │
//! │  │   │  Sale    │ │ TaxCalc  │ │  Weight  │ │ totals   │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Category, Sale, TaxRate, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`quantity`] - Unit vs. weight quantities
//! - [`pricing`] - Line pricing and sale totals
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use caja_core::money::Money;
//! use caja_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(180_000); // 1800.00
//! let iva = subtotal.calculate_tax(TaxRate::from_bps(1900)).unwrap();
//! assert_eq!(iva.cents(), 34_200); // 342.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod quantity;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{price_line, PricedLine, ProductSnapshot, SaleTotals};
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tax kind used for sales when none is configured.
pub const DEFAULT_TAX_KIND: &str = "iva";

/// Maximum lines allowed in a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity on a single line (units or kilograms).
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum unit price in cents (1,000,000,000.00).
///
/// A full sale at this price and the maximum quantity on every line stays
/// well inside `i64` cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Stored quantities are thousandths of a unit or kilogram.
pub const MILLI_PER_UNIT: i64 = 1000;

/// 10000 basis points = 100%.
pub const BPS_SCALE: u32 = 10_000;
