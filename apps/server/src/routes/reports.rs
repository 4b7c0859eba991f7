//! Admin report endpoints.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use tracing::debug;

use crate::dto::{DailyReportRead, DailySalesQuery, ProductStockRead};
use crate::error::ApiResult;
use crate::state::AppState;

/// `GET /admin/reports/daily_sales?target_date=YYYY-MM-DD`
///
/// Without `target_date` the current day in the report offset is used.
pub async fn daily_sales(
    State(state): State<AppState>,
    query: Result<Query<DailySalesQuery>, QueryRejection>,
) -> ApiResult<Json<DailyReportRead>> {
    let Query(query) = query?;
    let date = query
        .target_date
        .unwrap_or_else(|| Utc::now().with_timezone(&state.report_offset).date_naive());

    debug!(date = %date, "Daily sales report requested");

    let report = state
        .db
        .reports()
        .daily_report(date, state.report_offset)
        .await?;

    Ok(Json(DailyReportRead::from(&report)))
}

/// `GET /admin/reports/low_stock`
pub async fn low_stock(State(state): State<AppState>) -> ApiResult<Json<Vec<ProductStockRead>>> {
    let products = state.db.products().low_stock().await?;

    Ok(Json(products.iter().map(ProductStockRead::from).collect()))
}
