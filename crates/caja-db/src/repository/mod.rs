//! # Repository Module
//!
//! Database repository implementations for Caja POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP Handler                                                          │
//! │       │                                                                 │
//! │       │  db.tax_rates().current("iva")                                 │
//! │       ▼                                                                 │
//! │  TaxRateRepository                                                     │
//! │  ├── current(&self, kind)                                              │
//! │  ├── update(&self, kind, rate)                                         │
//! │  └── history(&self, kind)                                              │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  The ledger repository has no update or delete methods at all;         │
//! │  the schema triggers refuse them as well.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`](category::CategoryRepository) - Categories and their unit model
//! - [`ProductRepository`](product::ProductRepository) - Catalog and stock
//! - [`TaxRateRepository`](tax_rate::TaxRateRepository) - Tax rate registry and history
//! - [`SaleLedger`](sale::SaleLedger) - Append-only sales and sale details
//! - [`ReportRepository`](report::ReportRepository) - Daily aggregates

pub mod category;
pub mod product;
pub mod report;
pub mod sale;
pub mod tax_rate;
