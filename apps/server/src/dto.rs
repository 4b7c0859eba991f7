//! # Wire Types
//!
//! JSON bodies of the HTTP surface. Storage keeps integer cents, basis
//! points and thousandths; these types carry plain decimal numbers:
//!
//! ```text
//! price_at_sale           1000.0    (money)
//! discount_at_sale        10.0      (percent, 0-100)
//! iva_percentage_at_sale  0.19      (fraction, 0-1)
//! quantity                1.5       (units or kg)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use caja_core::{
    CashierTotals, DailyReport, Money, Product, Quantity, Sale, SaleDetail, SaleLineRequest,
    SaleRequest, TaxRateChange, TaxRateSetting, UnitModel,
};
use caja_db::TaxRateUpdate;

// =============================================================================
// Sales
// =============================================================================

/// `POST /sales/` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SaleCreate {
    pub cashier_id: i64,
    pub details: Vec<SaleDetailCreate>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleDetailCreate {
    pub product_id: i64,
    pub quantity: Decimal,
}

impl From<SaleCreate> for SaleRequest {
    fn from(body: SaleCreate) -> Self {
        SaleRequest {
            cashier_id: body.cashier_id,
            lines: body
                .details
                .into_iter()
                .map(|d| SaleLineRequest {
                    product_id: d.product_id,
                    quantity: d.quantity,
                })
                .collect(),
            request_id: body.request_id,
        }
    }
}

/// A committed sale.
#[derive(Debug, Clone, Serialize)]
pub struct SaleRead {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub sale_date: DateTime<Utc>,
    pub cashier_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub iva_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub details: Vec<SaleDetailRead>,
}

/// One line of a committed sale, every money field as snapshotted.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetailRead {
    pub id: i64,
    pub line_no: i64,
    pub product_id: i64,
    pub unit_model: UnitModel,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_at_sale: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_at_sale: Decimal,
    pub is_iva_exempt_at_sale: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub iva_percentage_at_sale: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub iva_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

impl From<&SaleDetail> for SaleDetailRead {
    fn from(d: &SaleDetail) -> Self {
        SaleDetailRead {
            id: d.id,
            line_no: d.line_no,
            product_id: d.product_id,
            unit_model: d.unit_model,
            quantity: d.quantity().to_decimal(),
            price_at_sale: d.price_at_sale().to_decimal(),
            discount_at_sale: d.discount_at_sale().percent(),
            is_iva_exempt_at_sale: d.is_iva_exempt_at_sale,
            iva_percentage_at_sale: d.iva_percentage_at_sale().fraction(),
            subtotal: d.subtotal().to_decimal(),
            iva_amount: d.iva_amount().to_decimal(),
            line_total: d.line_total().to_decimal(),
        }
    }
}

impl From<&Sale> for SaleRead {
    fn from(sale: &Sale) -> Self {
        SaleRead {
            id: sale.id,
            request_id: sale.request_id.clone(),
            sale_date: sale.sale_date,
            cashier_id: sale.cashier_id,
            net_amount: sale.net_amount().to_decimal(),
            iva_total: sale.iva_total().to_decimal(),
            total_amount: sale.total_amount().to_decimal(),
            details: sale.details.iter().map(SaleDetailRead::from).collect(),
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// `GET /admin/reports/daily_sales` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailySalesQuery {
    pub target_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashierTotalsRead {
    pub count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

impl From<&CashierTotals> for CashierTotalsRead {
    fn from(totals: &CashierTotals) -> Self {
        CashierTotalsRead {
            count: totals.count,
            total_amount: Money::from_cents(totals.total_amount_cents).to_decimal(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReportRead {
    pub date: NaiveDate,
    pub utc_offset_minutes: i32,
    pub total_sales_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_net_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_iva_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_gross_amount: Decimal,
    pub cashier_breakdown: BTreeMap<i64, CashierTotalsRead>,
}

impl From<&DailyReport> for DailyReportRead {
    fn from(report: &DailyReport) -> Self {
        DailyReportRead {
            date: report.date,
            utc_offset_minutes: report.utc_offset_minutes,
            total_sales_count: report.total_sales_count,
            total_net_amount: Money::from_cents(report.total_net_amount_cents).to_decimal(),
            total_iva_amount: Money::from_cents(report.total_iva_amount_cents).to_decimal(),
            total_gross_amount: Money::from_cents(report.total_gross_amount_cents).to_decimal(),
            cashier_breakdown: report
                .cashier_breakdown
                .iter()
                .map(|(id, totals)| (*id, CashierTotalsRead::from(totals)))
                .collect(),
        }
    }
}

/// A product at or below its minimum stock.
#[derive(Debug, Clone, Serialize)]
pub struct ProductStockRead {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_code: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub stock: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_stock: Decimal,
}

impl From<&Product> for ProductStockRead {
    fn from(p: &Product) -> Self {
        ProductStockRead {
            id: p.id,
            name: p.name.clone(),
            category_id: p.category_id,
            bar_code: p.bar_code.clone(),
            stock: Quantity::milli_to_decimal(p.stock_milli),
            min_stock: Quantity::milli_to_decimal(p.min_stock_milli),
        }
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// `PUT /admin/tax_rate/{kind}` body.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxRateUpdateBody {
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxRateRead {
    pub kind: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl From<&TaxRateSetting> for TaxRateRead {
    fn from(setting: &TaxRateSetting) -> Self {
        TaxRateRead {
            kind: setting.kind.clone(),
            rate: setting.rate().fraction(),
            last_updated: setting.last_updated,
        }
    }
}

/// Response to a rate update: the new rate plus the one it replaced.
#[derive(Debug, Clone, Serialize)]
pub struct TaxRateUpdateRead {
    #[serde(flatten)]
    pub current: TaxRateRead,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub previous_rate: Option<Decimal>,
}

impl From<&TaxRateUpdate> for TaxRateUpdateRead {
    fn from(update: &TaxRateUpdate) -> Self {
        TaxRateUpdateRead {
            current: TaxRateRead::from(&update.current),
            previous_rate: update.previous.map(|rate| rate.fraction()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxRateChangeRead {
    pub id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub previous_rate: Option<Decimal>,
    pub changed_at: DateTime<Utc>,
}

impl From<&TaxRateChange> for TaxRateChangeRead {
    fn from(change: &TaxRateChange) -> Self {
        TaxRateChangeRead {
            id: change.id,
            rate: caja_core::TaxRate::from_bps(change.rate_bps).fraction(),
            previous_rate: change
                .previous_bps
                .map(|bps| caja_core::TaxRate::from_bps(bps).fraction()),
            changed_at: change.changed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sale_create_accepts_json_numbers() {
        let body: SaleCreate = serde_json::from_str(
            r#"{"cashier_id": 3, "details": [{"product_id": 1, "quantity": 1.5}, {"product_id": 2, "quantity": 2}]}"#,
        )
        .unwrap();

        let request = SaleRequest::from(body);
        assert_eq!(request.cashier_id, 3);
        assert_eq!(request.lines[0].quantity, dec!(1.5));
        assert_eq!(request.lines[1].quantity, dec!(2));
        assert!(request.request_id.is_none());
    }

    #[test]
    fn test_update_read_flattens_current() {
        let json = serde_json::to_value(TaxRateUpdateRead {
            current: TaxRateRead {
                kind: "iva".into(),
                rate: dec!(0.2),
                last_updated: Utc::now(),
            },
            previous_rate: Some(dec!(0.19)),
        })
        .unwrap();

        assert_eq!(json["kind"], "iva");
        assert_eq!(json["rate"], 0.2);
        assert_eq!(json["previous_rate"], 0.19);
    }
}
