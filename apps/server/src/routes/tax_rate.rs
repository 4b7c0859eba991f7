//! Tax rate administration.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;

use caja_core::TaxRate;
use caja_db::DbError;

use crate::dto::{TaxRateChangeRead, TaxRateRead, TaxRateUpdateBody, TaxRateUpdateRead};
use crate::error::ApiResult;
use crate::state::AppState;

/// `GET /admin/tax_rate/{kind}`
pub async fn get_rate(
    State(state): State<AppState>,
    kind: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<TaxRateRead>> {
    let Path(kind) = kind?;
    let setting = state.db.tax_rates().current(&kind).await?;

    Ok(Json(TaxRateRead::from(&setting)))
}

/// `PUT /admin/tax_rate/{kind}` with `{"rate": 0.19}`.
///
/// Sales already committed keep the rate they were priced with.
pub async fn update_rate(
    State(state): State<AppState>,
    kind: Result<Path<String>, PathRejection>,
    body: Result<Json<TaxRateUpdateBody>, JsonRejection>,
) -> ApiResult<Json<TaxRateUpdateRead>> {
    let Path(kind) = kind?;
    let Json(body) = body?;

    let rate = TaxRate::from_fraction(body.rate).map_err(DbError::from)?;
    let update = state.db.tax_rates().update(&kind, rate).await?;

    Ok(Json(TaxRateUpdateRead::from(&update)))
}

/// `GET /admin/tax_rate/{kind}/history`
pub async fn history(
    State(state): State<AppState>,
    kind: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Vec<TaxRateChangeRead>>> {
    let Path(kind) = kind?;
    let repo = state.db.tax_rates();

    // Unknown kinds are a 404, not an empty list
    repo.current(&kind).await?;
    let changes = repo.history(&kind).await?;

    Ok(Json(changes.iter().map(TaxRateChangeRead::from).collect()))
}
