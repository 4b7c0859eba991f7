//! # Reporting Aggregator
//!
//! Rolls committed sales up by calendar day. Reads only the stored totals,
//! never the current catalog or tax rates, so a past day's report does not
//! move when prices or rates change.

use chrono::{Duration, FixedOffset, NaiveDate, Utc};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::sale::SaleLedger;
use caja_core::DailyReport;

/// Read-only report queries over the sale ledger.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    ledger: SaleLedger,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(ledger: SaleLedger) -> Self {
        ReportRepository { ledger }
    }

    /// Totals of every sale dated on `date`, where the day runs from local
    /// midnight to local midnight in `offset`.
    pub async fn daily_report(&self, date: NaiveDate, offset: FixedOffset) -> DbResult<DailyReport> {
        let start = date
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| midnight.and_local_timezone(offset).single())
            .ok_or_else(|| DbError::Internal(format!("no local midnight for {date}")))?
            .with_timezone(&Utc);
        let end = start + Duration::days(1);

        debug!(%date, offset = %offset, %start, %end, "Building daily report");

        let sales = self.ledger.list_between(start, end).await?;

        let mut report = DailyReport::empty(date, offset.local_minus_utc() / 60);
        for sale in &sales {
            report.add_sale(sale);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use crate::repository::sale::NewSale;
    use caja_core::{price_line, ProductSnapshot, TaxRate};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    async fn db_with_sales(dates: &[(i64, chrono::DateTime<Utc>)]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = db.categories().insert("Bebidas", false).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct::new(category.id, "Agua 1.5L", 1_000))
            .await
            .unwrap();
        let snapshot = ProductSnapshot::capture(&product, &category);
        let line = price_line(&snapshot, dec!(1), TaxRate::from_bps(1900)).unwrap();

        for (cashier_id, at) in dates {
            let mut sale = NewSale::new(*cashier_id, vec![line], None).unwrap();
            sale.sale_date = *at;
            db.sales().append(&sale).await.unwrap();
        }
        db
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[tokio::test]
    async fn test_empty_day() {
        let db = db_with_sales(&[]).await;
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let report = db.reports().daily_report(date, utc()).await.unwrap();
        assert_eq!(report.total_sales_count, 0);
        assert_eq!(report.total_gross_amount_cents, 0);
        assert!(report.cashier_breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_sums_stored_totals_per_day_and_cashier() {
        let day = |d, h| Utc.with_ymd_and_hms(2024, 3, d, h, 30, 0).unwrap();
        let db = db_with_sales(&[(1, day(1, 9)), (1, day(1, 18)), (2, day(1, 23)), (1, day(2, 0))])
            .await;

        // Later rate changes must not move the report
        db.tax_rates().update("iva", TaxRate::from_bps(2500)).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let report = db.reports().daily_report(date, utc()).await.unwrap();

        assert_eq!(report.total_sales_count, 3);
        assert_eq!(report.total_net_amount_cents, 3_000);
        assert_eq!(report.total_iva_amount_cents, 570);
        assert_eq!(report.total_gross_amount_cents, 3_570);
        assert_eq!(report.cashier_breakdown[&1].count, 2);
        assert_eq!(report.cashier_breakdown[&2].total_amount_cents, 1_190);
    }

    #[tokio::test]
    async fn test_day_boundaries_follow_offset() {
        // 02:00 UTC on the 2nd is 22:00 on the 1st at UTC-4
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap();
        let db = db_with_sales(&[(1, at)]).await;
        let santiago = FixedOffset::west_opt(4 * 3600).unwrap();

        let first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let second = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let local = db.reports().daily_report(first, santiago).await.unwrap();
        assert_eq!(local.total_sales_count, 1);
        assert_eq!(local.utc_offset_minutes, -240);

        assert_eq!(db.reports().daily_report(second, santiago).await.unwrap().total_sales_count, 0);
        assert_eq!(db.reports().daily_report(second, utc()).await.unwrap().total_sales_count, 1);
    }
}
