//! # caja-db: Database Layer for Caja POS
//!
//! SQLite persistence for the catalog, the tax rate registry and the sale
//! ledger, plus the checkout transaction that ties them together.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (POST /sales/)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ SaleProcessor │───►│  Repositories │    │  Migrations  │  │   │
//! │  │   │ (checkout.rs) │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Products      │    │ 001_init.sql │  │   │
//! │  │   │ StockLocks    │    │ Categories    │    │ 002_ledger   │  │   │
//! │  │   │ (locks.rs)    │    │ TaxRates      │    │              │  │   │
//! │  │   └───────┬───────┘    │ SaleLedger    │    └──────────────┘  │   │
//! │  │           │            │ Reports       │                      │   │
//! │  │           ▼            └───────┬───────┘                      │   │
//! │  │   ┌───────────────────────────▼────────┐                      │   │
//! │  │   │      Database (pool.rs) SqlitePool │                      │   │
//! │  │   └────────────────────────────────────┘                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and checkout error types
//! - [`locks`] - Per-product stock locks
//! - [`repository`] - Repository implementations
//! - [`checkout`] - The `CreateSale` transaction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/caja.db")).await?;
//!
//! let sale = db.sale_processor("iva").create_sale(&request).await?;
//! let report = db.reports().daily_report(date, offset).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::SaleProcessor;
pub use error::{CheckoutError, CheckoutResult, DbError, DbResult};
pub use locks::{StockGuard, StockLocks};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::product::{NewProduct, ProductRepository, ProductUpdate, StockOutcome};
pub use repository::report::ReportRepository;
pub use repository::sale::{NewSale, SaleLedger};
pub use repository::tax_rate::{TaxRateRepository, TaxRateUpdate};
