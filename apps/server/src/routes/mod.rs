//! # HTTP Routes
//!
//! ```text
//! POST /sales/                          create a sale (201)
//! GET  /sales/{id}                      committed sale
//! GET  /admin/reports/daily_sales       ?target_date=YYYY-MM-DD (default today)
//! GET  /admin/reports/low_stock         products at or below min_stock
//! GET  /admin/tax_rate/{kind}           current rate
//! PUT  /admin/tax_rate/{kind}           {"rate": 0.19}
//! GET  /admin/tax_rate/{kind}/history   changes, newest first
//! GET  /health                          OK / 503
//! ```

pub mod health;
pub mod reports;
pub mod sales;
pub mod tax_rate;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sales", axum::routing::post(sales::create_sale))
        .route("/sales/", axum::routing::post(sales::create_sale))
        .route("/sales/{id}", get(sales::get_sale))
        .route("/admin/reports/daily_sales", get(reports::daily_sales))
        .route("/admin/reports/low_stock", get(reports::low_stock))
        .route(
            "/admin/tax_rate/{kind}",
            get(tax_rate::get_rate).put(tax_rate::update_rate),
        )
        .route("/admin/tax_rate/{kind}/history", get(tax_rate::history))
        .route("/health", get(health::health_handler))
        .with_state(state)
}
