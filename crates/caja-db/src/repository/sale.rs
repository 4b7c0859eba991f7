//! # Sale Ledger
//!
//! Append-only store of committed sales and their line details.
//!
//! ## Append
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Ledger Append (one transaction)                      │
//! │                                                                         │
//! │  INSERT sales (header, totals)  ──► sale id                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT sale_details × N (line_no 1..N, every *_at_sale snapshot)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ──► header and lines become visible together                   │
//! │                                                                         │
//! │  There is no update or delete here, and the schema triggers abort      │
//! │  any that reach the tables some other way.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use caja_core::{PricedLine, Sale, SaleDetail, SaleTotals, ValidationError};

const SALE_COLUMNS: &str =
    "id, request_id, sale_date, cashier_id, net_amount_cents, iva_total_cents, total_amount_cents";

const DETAIL_COLUMNS: &str = "id, sale_id, line_no, product_id, unit_model, quantity_milli, \
     price_at_sale_cents, discount_at_sale_bps, is_iva_exempt_at_sale, \
     iva_percentage_at_sale_bps, subtotal_cents, iva_amount_cents, line_total_cents";

/// A priced sale ready to be written.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub request_id: Option<String>,
    pub sale_date: DateTime<Utc>,
    pub cashier_id: i64,
    pub totals: SaleTotals,
    pub lines: Vec<PricedLine>,
}

impl NewSale {
    /// Builds a sale dated now, with totals summed from the lines.
    ///
    /// Fails when the totals do not fit in `i64` cents.
    pub fn new(
        cashier_id: i64,
        lines: Vec<PricedLine>,
        request_id: Option<String>,
    ) -> Result<Self, ValidationError> {
        Ok(NewSale {
            request_id,
            sale_date: Utc::now(),
            cashier_id,
            totals: SaleTotals::from_lines(&lines)?,
            lines,
        })
    }
}

/// Append-only sale repository.
#[derive(Debug, Clone)]
pub struct SaleLedger {
    pool: SqlitePool,
}

impl SaleLedger {
    /// Creates a new SaleLedger.
    pub fn new(pool: SqlitePool) -> Self {
        SaleLedger { pool }
    }

    /// Appends a sale in its own transaction.
    pub async fn append(&self, sale: &NewSale) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;
        let sale = append_in(&mut tx, sale).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(sale)
    }

    /// Gets a committed sale with its details.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        self.with_details(sale).await
    }

    /// Gets the sale committed under an idempotency key.
    pub async fn get_by_request_id(&self, request_id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE request_id = ?1");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;

        self.with_details(sale).await
    }

    /// Sale headers (no details) dated in `[start, end)`, oldest first.
    pub async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Sale>> {
        debug!(%start, %end, "Listing sales");

        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales
             WHERE sale_epoch_ms >= ?1 AND sale_epoch_ms < ?2
             ORDER BY sale_epoch_ms, id"
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(start.timestamp_millis())
            .bind(end.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Number of committed sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn with_details(&self, sale: Option<Sale>) -> DbResult<Option<Sale>> {
        let Some(mut sale) = sale else {
            return Ok(None);
        };

        let sql =
            format!("SELECT {DETAIL_COLUMNS} FROM sale_details WHERE sale_id = ?1 ORDER BY line_no");
        sale.details = sqlx::query_as::<_, SaleDetail>(&sql)
            .bind(sale.id)
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(sale))
    }
}

/// Writes the header and every line on the caller's connection.
///
/// Used by checkout inside the transaction that also moved the stock.
pub(crate) async fn append_in(conn: &mut SqliteConnection, sale: &NewSale) -> DbResult<Sale> {
    debug!(
        cashier_id = sale.cashier_id,
        lines = sale.lines.len(),
        total_cents = sale.totals.total_amount.cents(),
        "Appending sale"
    );

    let sql = format!(
        "INSERT INTO sales (
            request_id, sale_date, sale_epoch_ms, cashier_id,
            net_amount_cents, iva_total_cents, total_amount_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING {SALE_COLUMNS}"
    );

    let mut header = sqlx::query_as::<_, Sale>(&sql)
        .bind(sale.request_id.as_deref())
        .bind(sale.sale_date)
        .bind(sale.sale_date.timestamp_millis())
        .bind(sale.cashier_id)
        .bind(sale.totals.net_amount.cents())
        .bind(sale.totals.iva_total.cents())
        .bind(sale.totals.total_amount.cents())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("request_id", sale.request_id.clone().unwrap_or_default())
            }
            other => other,
        })?;

    let detail_sql = format!(
        "INSERT INTO sale_details (
            sale_id, line_no, product_id, unit_model, quantity_milli,
            price_at_sale_cents, discount_at_sale_bps, is_iva_exempt_at_sale,
            iva_percentage_at_sale_bps, subtotal_cents, iva_amount_cents, line_total_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        RETURNING {DETAIL_COLUMNS}"
    );

    let mut details = Vec::with_capacity(sale.lines.len());
    for (line_no, line) in (1_i64..).zip(&sale.lines) {
        let detail = sqlx::query_as::<_, SaleDetail>(&detail_sql)
            .bind(header.id)
            .bind(line_no)
            .bind(line.product_id)
            .bind(line.quantity.unit_model())
            .bind(line.quantity.milli())
            .bind(line.unit_price.cents())
            .bind(line.discount.bps())
            .bind(line.is_iva_exempt)
            .bind(line.applied_rate.bps())
            .bind(line.subtotal.cents())
            .bind(line.iva_amount.cents())
            .bind(line.line_total.cents())
            .fetch_one(&mut *conn)
            .await?;
        details.push(detail);
    }

    header.details = details;
    Ok(header)
}

// =============================================================================
// Unit Tests
// =============================================================================
