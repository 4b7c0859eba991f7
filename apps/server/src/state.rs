//! Shared handler state.

use chrono::FixedOffset;

use caja_db::{Database, SaleProcessor};

/// Cloned into every handler. All fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub processor: SaleProcessor,
    /// Offset that cuts report days
    pub report_offset: FixedOffset,
}

impl AppState {
    pub fn new(db: Database, tax_kind: impl Into<String>, report_offset: FixedOffset) -> Self {
        let processor = db.sale_processor(tax_kind);
        AppState {
            db,
            processor,
            report_offset,
        }
    }
}
