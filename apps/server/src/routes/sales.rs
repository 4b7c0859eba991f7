//! Sale endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use caja_core::SaleRequest;
use caja_db::DbError;

use crate::dto::{SaleCreate, SaleRead};
use crate::error::ApiResult;
use crate::state::AppState;

/// `POST /sales/`
///
/// A replayed `request_id` answers with the sale it first created.
pub async fn create_sale(
    State(state): State<AppState>,
    body: Result<Json<SaleCreate>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SaleRead>)> {
    let Json(body) = body?;
    let request = SaleRequest::from(body);

    let sale = state.processor.create_sale(&request).await?;

    Ok((StatusCode::CREATED, Json(SaleRead::from(&sale))))
}

/// `GET /sales/{id}`
pub async fn get_sale(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<SaleRead>> {
    let Path(id) = id?;

    let sale = state
        .db
        .sales()
        .get_by_id(id)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))?;

    Ok(Json(SaleRead::from(&sale)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::{send, test_app};

    #[tokio::test]
    async fn test_create_sale_prices_and_snapshots() {
        let app = test_app().await;

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/sales/",
            Some(json!({
                "cashier_id": 7,
                "details": [
                    { "product_id": app.soap.id, "quantity": 2 },
                    { "product_id": app.apples.id, "quantity": 1.5 }
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["cashier_id"], 7);
        assert_eq!(body["net_amount"], 4800.0);
        assert_eq!(body["iva_total"], 342.0);
        assert_eq!(body["total_amount"], 5142.0);

        let soap = &body["details"][0];
        assert_eq!(soap["unit_model"], "unit");
        assert_eq!(soap["price_at_sale"], 1000.0);
        assert_eq!(soap["discount_at_sale"], 10.0);
        assert_eq!(soap["iva_percentage_at_sale"], 0.19);
        assert_eq!(soap["subtotal"], 1800.0);
        assert_eq!(soap["iva_amount"], 342.0);
        assert_eq!(soap["line_total"], 2142.0);

        let apples = &body["details"][1];
        assert_eq!(apples["unit_model"], "weight");
        assert_eq!(apples["quantity"], 1.5);
        assert_eq!(apples["is_iva_exempt_at_sale"], true);
        assert_eq!(apples["iva_amount"], 0.0);
        assert_eq!(apples["line_total"], 3000.0);

        let id = body["id"].as_i64().unwrap();
        let (status, fetched) = send(&app.router, Method::GET, &format!("/sales/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["total_amount"], body["total_amount"]);
        assert_eq!(fetched["details"], body["details"]);
    }

    #[tokio::test]
    async fn test_create_sale_errors() {
        let app = test_app().await;

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/sales",
            Some(json!({ "cashier_id": 1, "details": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/sales/",
            Some(json!({ "cashier_id": 1, "details": [{ "product_id": app.soap.id, "quantity": 1.5 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "QUANTITY_GRANULARITY_MISMATCH");
        assert_eq!(body["product_id"], app.soap.id);

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/sales/",
            Some(json!({ "cashier_id": 1, "details": [
                { "product_id": app.soap.id, "quantity": 1 },
                { "product_id": 9999, "quantity": 1 }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "PRODUCT_NOT_FOUND");

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/sales/",
            Some(json!({ "cashier_id": 1, "details": [{ "product_id": app.apples.id, "quantity": 5.5 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["available"], 5.0);
        assert_eq!(body["requested"], 5.5);

        // Nothing above touched stock or the ledger
        let soap = app.db.products().get_by_id(app.soap.id).await.unwrap().unwrap();
        assert_eq!(soap.stock_milli, 10_000);
        assert_eq!(app.db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_request() {
        let app = test_app().await;

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/sales/",
            Some(json!({ "cashier": 1 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_request_id_replay_returns_first_sale() {
        let app = test_app().await;
        let payload = json!({
            "cashier_id": 2,
            "request_id": "4f9c2a57-7f43-4a4b-9a43-1f3b2d2c8e10",
            "details": [{ "product_id": app.soap.id, "quantity": 3 }]
        });

        let (_, first) = send(&app.router, Method::POST, "/sales/", Some(payload.clone())).await;
        let (status, second) = send(&app.router, Method::POST, "/sales/", Some(payload)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["id"], second["id"]);

        let soap = app.db.products().get_by_id(app.soap.id).await.unwrap().unwrap();
        assert_eq!(soap.stock_milli, 7_000);
    }

    #[tokio::test]
    async fn test_unknown_sale() {
        let app = test_app().await;

        let (status, body) = send(&app.router, Method::GET, "/sales/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, _) = send(&app.router, Method::GET, "/sales/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
