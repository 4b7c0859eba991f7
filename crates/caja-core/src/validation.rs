//! # Validation Module
//!
//! Input validation utilities for Caja POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (caja-server)                                   │
//! │  ├── Type validation (JSON deserialization)                            │
//! │  └── Decimal → integer conversion (precision checks)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE + Quantity::for_product                          │
//! │  ├── Request shape (lines, cashier, request id)                        │
//! │  └── Catalog field rules                                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock_milli >= 0), CHECK (total = net + iva)               │
//! │  ├── UNIQUE constraints (category name, request id)                    │
//! │  └── Append-only triggers on the ledger                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::validation::{validate_category_name, validate_price_cents};
//!
//! validate_category_name("Frutas y Verduras").unwrap();
//! validate_price_cents(1099).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::SaleRequest;
use crate::{BPS_SCALE, MAX_PRICE_CENTS, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 200 characters
///
/// ## Example
/// ```rust
/// use caja_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Manzana Fuji").is_ok());
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, 200)
}

/// Validates a category name (1..=100 characters).
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, 100)
}

/// Validates a tax kind key such as `iva`.
///
/// ## Rules
/// - 1..=32 characters
/// - lowercase ASCII letters, digits and underscores only
pub fn validate_tax_kind(kind: &str) -> ValidationResult<()> {
    validate_required_text("kind", kind, 32)?;

    if !kind
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "kind".to_string(),
            reason: "must contain only lowercase letters, digits, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional barcode.
///
/// ## Rules
/// - Absent is fine
/// - At most 50 characters
/// - Letters, digits and hyphens only
pub fn validate_bar_code(bar_code: Option<&str>) -> ValidationResult<()> {
    let Some(code) = bar_code else {
        return Ok(());
    };

    validate_required_text("bar_code", code, 50)?;

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "bar_code".to_string(),
            reason: "must contain only letters, numbers, and hyphens".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents.
///
/// ## Rules
/// - Must be strictly positive; free items are modeled with a 100% discount
/// - At most [`MAX_PRICE_CENTS`](crate::MAX_PRICE_CENTS)
///
/// ## Example
/// ```rust
/// use caja_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_err());
/// assert!(validate_price_cents(-100).is_err());
/// assert!(validate_price_cents(i64::MAX).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 1,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a stock-like amount in thousandths (stock, min_stock).
pub fn validate_stock_milli(field: &str, milli: i64) -> ValidationResult<()> {
    if milli < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    validate_bps("rate", bps)
}

/// Validates a discount in basis points (0% to 100%).
pub fn validate_discount_bps(bps: Option<u32>) -> ValidationResult<()> {
    match bps {
        Some(bps) => validate_bps("discount", bps),
        None => Ok(()),
    }
}

fn validate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: BPS_SCALE as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Sale Request Validators
// =============================================================================

/// Validates the shape of a sale request before any lookup happens.
///
/// ## Rules
/// - `cashier_id` present (positive)
/// - 1..=100 lines
/// - `request_id`, when given, is a UUID
///
/// Quantities are checked per line once the product's unit model is known.
pub fn validate_sale_request(request: &SaleRequest) -> ValidationResult<()> {
    if request.cashier_id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "cashier_id".to_string(),
        });
    }

    validate_sale_line_count(request.lines.len())?;

    if let Some(request_id) = request.request_id.as_deref() {
        validate_uuid("request_id", request_id)?;
    }

    Ok(())
}

/// Validates the number of lines in a sale.
pub fn validate_sale_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "details".to_string(),
        });
    }

    if lines > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "details".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use caja_core::validation::validate_uuid;
///
/// assert!(validate_uuid("request_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("request_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
