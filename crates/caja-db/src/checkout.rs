//! # Checkout
//!
//! `SaleProcessor::create_sale` turns a cart of product references into a
//! committed, priced sale, or fails without leaving a trace.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_sale(request)                             │
//! │                                                                         │
//! │  Validating   request shape, line count, request_id format             │
//! │       │       replayed request_id? → return the committed sale         │
//! │       ▼                                                                 │
//! │  Pricing      read the tax rate ONCE                                   │
//! │       │       resolve product + category per line (snapshot)          │
//! │       │       price_line() for every line                              │
//! │       ▼                                                                 │
//! │  Reserving    lock products in ascending id order                      │
//! │       │       BEGIN                                                     │
//! │       │       conditional decrement per product ─── short? ──► ROLLBACK │
//! │       ▼                                                                 │
//! │  Committing   append header + details in the same transaction          │
//! │       │       COMMIT                                                    │
//! │       ▼                                                                 │
//! │  Committed    locks released, sale returned                            │
//! │                                                                         │
//! │  Every failure (or a dropped future) before COMMIT rolls the           │
//! │  transaction back: no stock moved, no ledger row.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::error::{CheckoutResult, DbError};
use crate::pool::Database;
use crate::repository::product::{decrement_stock_in, StockOutcome};
use crate::repository::sale::{append_in, NewSale};
use caja_core::validation::validate_sale_request;
use caja_core::{
    price_line, Category, CoreError, PricedLine, Product, ProductSnapshot, Quantity, Sale,
    SaleRequest, TaxRate,
};

/// Runs the checkout transaction.
///
/// ## Usage
/// ```rust,ignore
/// let processor = db.sale_processor("iva");
/// let sale = processor.create_sale(&request).await?;
/// assert!(sale.reconciles());
/// ```
#[derive(Debug, Clone)]
pub struct SaleProcessor {
    db: Database,
    tax_kind: String,
}

impl SaleProcessor {
    /// Creates a processor pricing sales with the rate of `tax_kind`.
    pub fn new(db: Database, tax_kind: impl Into<String>) -> Self {
        SaleProcessor {
            db,
            tax_kind: tax_kind.into(),
        }
    }

    /// The tax kind applied to every sale.
    pub fn tax_kind(&self) -> &str {
        &self.tax_kind
    }

    /// Prices, reserves and commits a sale atomically.
    ///
    /// ## Errors
    /// * `CheckoutError::Rejected` - invalid request, unknown or inactive
    ///   product, missing category, fractional quantity for a unit product,
    ///   insufficient stock
    /// * `CheckoutError::Storage` - database failure; nothing was written
    pub async fn create_sale(&self, request: &SaleRequest) -> CheckoutResult<Sale> {
        validate_sale_request(request).map_err(CoreError::from)?;

        if let Some(request_id) = request.request_id.as_deref() {
            if let Some(existing) = self.db.sales().get_by_request_id(request_id).await? {
                info!(sale_id = existing.id, request_id = %request_id, "Replayed sale request");
                return Ok(existing);
            }
        }

        let rate = self.db.tax_rates().current(&self.tax_kind).await?.rate();
        let lines = self.price_lines(request, rate).await?;
        let new_sale = NewSale::new(request.cashier_id, lines, request.request_id.clone())
            .map_err(CoreError::from)?;

        let mut required: BTreeMap<i64, i64> = BTreeMap::new();
        for line in &new_sale.lines {
            *required.entry(line.product_id).or_default() += line.quantity.milli();
        }

        let _guard = self.db.stock_locks().acquire(required.keys().copied()).await;

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        for (&product_id, &requested_milli) in &required {
            match decrement_stock_in(&mut tx, product_id, requested_milli).await? {
                StockOutcome::Decremented { remaining_milli } => {
                    debug!(product_id, remaining_milli, "Stock reserved");
                }
                StockOutcome::Insufficient { available_milli } => {
                    tx.rollback().await.map_err(DbError::from)?;
                    warn!(
                        product_id,
                        available_milli,
                        requested_milli,
                        cashier_id = request.cashier_id,
                        "Sale rejected: insufficient stock"
                    );
                    return Err(CoreError::InsufficientStock {
                        product_id,
                        available: Quantity::milli_to_decimal(available_milli),
                        requested: Quantity::milli_to_decimal(requested_milli),
                    }
                    .into());
                }
                StockOutcome::NotFound => {
                    tx.rollback().await.map_err(DbError::from)?;
                    warn!(product_id, "Sale rejected: product removed during checkout");
                    return Err(CoreError::ProductNotFound(product_id).into());
                }
            }
        }

        let sale = match append_in(&mut tx, &new_sale).await {
            Ok(sale) => sale,
            Err(DbError::UniqueViolation { .. }) if new_sale.request_id.is_some() => {
                // Lost a race with the same request_id
                tx.rollback().await.map_err(DbError::from)?;
                let request_id = new_sale.request_id.as_deref().unwrap_or_default();
                let existing = self
                    .db
                    .sales()
                    .get_by_request_id(request_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Sale", request_id))?;
                info!(sale_id = existing.id, request_id = %request_id, "Replayed sale request");
                return Ok(existing);
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = sale.id,
            cashier_id = sale.cashier_id,
            lines = sale.details.len(),
            total_cents = sale.total_amount_cents,
            "Sale committed"
        );

        Ok(sale)
    }

    /// Snapshots every referenced product and prices each line at `rate`.
    async fn price_lines(
        &self,
        request: &SaleRequest,
        rate: TaxRate,
    ) -> CheckoutResult<Vec<PricedLine>> {
        let products = self.db.products();
        let categories = self.db.categories();

        let mut resolved: HashMap<i64, Product> = HashMap::new();
        let mut category_of: HashMap<i64, Category> = HashMap::new();
        let mut lines = Vec::with_capacity(request.lines.len());

        for requested in &request.lines {
            let product_id = requested.product_id;

            if !resolved.contains_key(&product_id) {
                let product = products
                    .get_active(product_id)
                    .await?
                    .ok_or(CoreError::ProductNotFound(product_id))?;
                resolved.insert(product_id, product);
            }
            let product = &resolved[&product_id];

            if !category_of.contains_key(&product.category_id) {
                let category = categories
                    .get_by_id(product.category_id)
                    .await?
                    .ok_or(CoreError::CategoryNotFound(product.category_id))?;
                category_of.insert(product.category_id, category);
            }
            let category = &category_of[&product.category_id];

            let snapshot = ProductSnapshot::capture(product, category);
            lines.push(price_line(&snapshot, requested.quantity, rate)?);
        }

        debug!(lines = lines.len(), rate_bps = rate.bps(), "Sale priced");
        Ok(lines)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckoutError;
    use crate::pool::DbConfig;
    use crate::repository::product::{NewProduct, ProductUpdate};
    use caja_core::{SaleLineRequest, UnitModel, ValidationError};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        db: Database,
        units: i64,
        /// Unit category product: $1000.00, 10% off, taxed.
        soap: i64,
        /// Weighted category product: $2000.00/kg, exempt.
        apples: i64,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        fixture_on(db).await
    }

    async fn fixture_on(db: Database) -> Fixture {
        let units = db.categories().insert("Aseo", false).await.unwrap();
        let weighted = db.categories().insert("Frutas", true).await.unwrap();

        let soap = db
            .products()
            .insert(&NewProduct {
                stock_milli: 10_000,
                discount_bps: Some(1000),
                ..NewProduct::new(units.id, "Jabón", 100_000)
            })
            .await
            .unwrap();
        let apples = db
            .products()
            .insert(&NewProduct {
                stock_milli: 5_000,
                is_iva_exempt: true,
                ..NewProduct::new(weighted.id, "Manzana", 200_000)
            })
            .await
            .unwrap();

        Fixture {
            db,
            units: units.id,
            soap: soap.id,
            apples: apples.id,
        }
    }

    fn request(lines: &[(i64, Decimal)]) -> SaleRequest {
        SaleRequest {
            cashier_id: 3,
            lines: lines
                .iter()
                .map(|&(product_id, quantity)| SaleLineRequest {
                    product_id,
                    quantity,
                })
                .collect(),
            request_id: None,
        }
    }

    async fn stock(db: &Database, id: i64) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock_milli
    }

    #[tokio::test]
    async fn test_unit_line_priced_and_committed() {
        let f = fixture().await;

        let sale = f
            .db
            .sale_processor("iva")
            .create_sale(&request(&[(f.soap, dec!(2))]))
            .await
            .unwrap();

        let detail = &sale.details[0];
        assert_eq!(detail.subtotal_cents, 180_000);
        assert_eq!(detail.iva_amount_cents, 34_200);
        assert_eq!(detail.line_total_cents, 214_200);
        assert_eq!(detail.unit_model, UnitModel::Unit);
        assert_eq!(sale.total_amount_cents, 214_200);
        assert!(sale.reconciles());

        assert_eq!(stock(&f.db, f.soap).await, 8_000);
    }

    #[tokio::test]
    async fn test_weighted_exempt_line() {
        let f = fixture().await;

        let sale = f
            .db
            .sale_processor("iva")
            .create_sale(&request(&[(f.apples, dec!(1.5))]))
            .await
            .unwrap();

        let detail = &sale.details[0];
        assert_eq!(detail.subtotal_cents, 300_000);
        assert_eq!(detail.iva_amount_cents, 0);
        assert_eq!(detail.line_total_cents, 300_000);
        assert!(detail.is_iva_exempt_at_sale);
        assert_eq!(detail.quantity_milli, 1_500);

        assert_eq!(stock(&f.db, f.apples).await, 3_500);
    }

    #[tokio::test]
    async fn test_fractional_units_rejected_without_side_effects() {
        let f = fixture().await;

        let err = f
            .db
            .sale_processor("iva")
            .create_sale(&request(&[(f.apples, dec!(1)), (f.soap, dec!(1.5))]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Rejected(CoreError::QuantityGranularityMismatch { .. })
        ));
        assert_eq!(stock(&f.db, f.apples).await, 5_000);
        assert_eq!(f.db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_aborts_whole_sale() {
        let f = fixture().await;

        let err = f
            .db
            .sale_processor("iva")
            .create_sale(&request(&[(f.soap, dec!(1)), (9_999, dec!(1))]))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Rejected(CoreError::ProductNotFound(9_999))));
        assert!(!err.is_retryable());
        assert_eq!(stock(&f.db, f.soap).await, 10_000);
        assert_eq!(f.db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_earlier_lines() {
        let f = fixture().await;

        // Soap has the lower id, so it is decremented before apples come up short
        let err = f
            .db
            .sale_processor("iva")
            .create_sale(&request(&[(f.soap, dec!(1)), (f.apples, dec!(6))]))
            .await
            .unwrap_err();

        match err {
            CheckoutError::Rejected(CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            }) => {
                assert_eq!(product_id, f.apples);
                assert_eq!(available, dec!(5));
                assert_eq!(requested, dec!(6));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(stock(&f.db, f.soap).await, 10_000);
        assert_eq!(stock(&f.db, f.apples).await, 5_000);
        assert_eq!(f.db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_product_lines_share_stock() {
        let f = fixture().await;
        let processor = f.db.sale_processor("iva");

        let err = processor
            .create_sale(&request(&[(f.soap, dec!(6)), (f.soap, dec!(5))]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(CoreError::InsufficientStock { .. })
        ));

        let sale = processor
            .create_sale(&request(&[(f.soap, dec!(6)), (f.soap, dec!(4))]))
            .await
            .unwrap();
        assert_eq!(sale.details.len(), 2);
        assert_eq!(stock(&f.db, f.soap).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let f = fixture().await;
        let processor = f.db.sale_processor("iva");

        let empty = processor.create_sale(&request(&[])).await.unwrap_err();
        assert!(matches!(
            empty,
            CheckoutError::Rejected(CoreError::Validation(ValidationError::Required { .. }))
        ));

        let zero = processor
            .create_sale(&request(&[(f.soap, dec!(0))]))
            .await
            .unwrap_err();
        assert!(matches!(zero, CheckoutError::Rejected(CoreError::Validation(_))));

        let mut bad_cashier = request(&[(f.soap, dec!(1))]);
        bad_cashier.cashier_id = 0;
        assert!(processor.create_sale(&bad_cashier).await.is_err());

        assert_eq!(stock(&f.db, f.soap).await, 10_000);
    }

    #[tokio::test]
    async fn test_inactive_product_is_not_sellable() {
        let f = fixture().await;
        f.db.products().soft_delete(f.soap).await.unwrap();

        let err = f
            .db
            .sale_processor("iva")
            .create_sale(&request(&[(f.soap, dec!(1))]))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Rejected(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_committed_sale_ignores_later_catalog_and_rate_changes() {
        let f = fixture().await;

        let sale = f
            .db
            .sale_processor("iva")
            .create_sale(&request(&[(f.soap, dec!(2)), (f.apples, dec!(0.75))]))
            .await
            .unwrap();

        let soap = f.db.products().get_by_id(f.soap).await.unwrap().unwrap();
        let mut update = ProductUpdate::from(&soap);
        update.price_cents = 150_000;
        update.discount_bps = None;
        update.is_iva_exempt = true;
        f.db.products().update(f.soap, &update).await.unwrap();

        let apples = f.db.products().get_by_id(f.apples).await.unwrap().unwrap();
        f.db
            .categories()
            .set_weighting(apples.category_id, false)
            .await
            .unwrap();
        f.db.tax_rates().update("iva", TaxRate::from_bps(2500)).await.unwrap();

        let read = f.db.sales().get_by_id(sale.id).await.unwrap().unwrap();
        assert_eq!(read.total_amount_cents, sale.total_amount_cents);
        for (before, after) in sale.details.iter().zip(&read.details) {
            assert_eq!(before.price_at_sale_cents, after.price_at_sale_cents);
            assert_eq!(before.discount_at_sale_bps, after.discount_at_sale_bps);
            assert_eq!(before.is_iva_exempt_at_sale, after.is_iva_exempt_at_sale);
            assert_eq!(before.iva_percentage_at_sale_bps, after.iva_percentage_at_sale_bps);
            assert_eq!(before.unit_model, after.unit_model);
            assert_eq!(before.line_total_cents, after.line_total_cents);
        }
        assert_eq!(read.details[0].iva_percentage_at_sale_bps, 1900);
        assert_eq!(read.details[1].unit_model, UnitModel::Weight);
    }

    #[tokio::test]
    async fn test_request_id_replay_returns_first_sale() {
        let f = fixture().await;
        let processor = f.db.sale_processor("iva");

        let mut req = request(&[(f.soap, dec!(1))]);
        req.request_id = Some("0b6f3c1e-8a2d-4f5b-9c7e-1d2e3f4a5b6c".to_string());

        let first = processor.create_sale(&req).await.unwrap();
        let replay = processor.create_sale(&req).await.unwrap();

        assert_eq!(first.id, replay.id);
        assert_eq!(replay.details.len(), 1);
        assert_eq!(stock(&f.db, f.soap).await, 9_000);
        assert_eq!(f.db.sales().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tax_kind_is_storage_failure() {
        let f = fixture().await;

        let err = f
            .db
            .sale_processor("ila")
            .create_sale(&request(&[(f.soap, dec!(1))]))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Storage(DbError::NotFound { .. })));
        assert_eq!(stock(&f.db, f.soap).await, 10_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        const N: usize = 16;

        let f = fixture().await;
        let product = f
            .db
            .products()
            .insert(&NewProduct {
                stock_milli: (N as i64 - 1) * 1_000,
                ..NewProduct::new(f.units, "Pan", 1_500)
            })
            .await
            .unwrap()
            .id;

        let processor = f.db.sale_processor("iva");
        let mut handles = Vec::new();
        for _ in 0..N {
            let processor = processor.clone();
            handles.push(tokio::spawn(async move {
                processor
                    .create_sale(&request(&[(product, dec!(1))]))
                    .await
            }));
        }

        let mut committed = 0;
        let mut short = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(CheckoutError::Rejected(CoreError::InsufficientStock { .. })) => short += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(committed, N - 1);
        assert_eq!(short, 1);
        assert_eq!(stock(&f.db, product).await, 0);
        assert_eq!(f.db.sales().count().await.unwrap(), (N - 1) as i64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_on_file_database() {
        let path = std::env::temp_dir().join(format!("caja-checkout-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let f = fixture_on(db).await;

        let processor = f.db.sale_processor("iva");
        let mut handles = Vec::new();
        for i in 0..12 {
            let processor = processor.clone();
            let (soap, apples) = (f.soap, f.apples);
            handles.push(tokio::spawn(async move {
                // Overlapping product sets in both orders
                let lines = if i % 2 == 0 {
                    [(soap, dec!(1)), (apples, dec!(0.5))]
                } else {
                    [(apples, dec!(0.5)), (soap, dec!(1))]
                };
                processor.create_sale(&request(&lines)).await
            }));
        }

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                committed += 1;
            }
        }

        // Apples (5 kg at 0.5 kg per sale) run out first
        assert_eq!(committed, 10);
        assert_eq!(stock(&f.db, f.apples).await, 0);
        assert_eq!(stock(&f.db, f.soap).await, 0);

        f.db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_sales_keep_stock_and_ledger_in_step() {
        const INITIAL_MILLI: i64 = 1_000_000;

        let path = std::env::temp_dir().join(format!("caja-cancel-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let f = fixture_on(db).await;
        let product = f
            .db
            .products()
            .insert(&NewProduct {
                stock_milli: INITIAL_MILLI,
                ..NewProduct::new(f.units, "Pan", 1_500)
            })
            .await
            .unwrap()
            .id;

        let processor = f.db.sale_processor("iva");
        let req = request(&[(product, dec!(1))]);

        for i in 0..120u64 {
            // Deadlines from "before the first query" up to "around commit"
            let deadline = Duration::from_micros((i * 37) % 4_000);
            let _ = tokio::time::timeout(deadline, processor.create_sale(&req)).await;

            // Let a dropped transaction roll back
            tokio::time::sleep(Duration::from_millis(25)).await;

            let sold = f.db.sales().count().await.unwrap();
            assert_eq!(INITIAL_MILLI - stock(&f.db, product).await, sold * 1_000);
        }

        // No lock or connection leaked by the cancelled attempts
        let sale = tokio::time::timeout(Duration::from_secs(5), processor.create_sale(&req))
            .await
            .expect("sale after cancellations timed out")
            .unwrap();
        assert_eq!(sale.details.len(), 1);
        let sold = f.db.sales().count().await.unwrap();
        assert_eq!(INITIAL_MILLI - stock(&f.db, product).await, sold * 1_000);

        f.db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected_without_side_effects() {
        let f = fixture().await;

        // A stored price beyond what validation accepts today
        sqlx::query("UPDATE products SET price_cents = ? WHERE id = ?")
            .bind(10_000_000_000_000_000_i64)
            .bind(f.soap)
            .execute(f.db.pool())
            .await
            .unwrap();

        let err = f
            .db
            .sale_processor("iva")
            .create_sale(&request(&[(f.soap, dec!(999))]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(stock(&f.db, f.soap).await, 10_000);
        assert_eq!(f.db.sales().count().await.unwrap(), 0);
    }
}
