//! # Product Repository
//!
//! Database operations for products: the catalog read side used by
//! checkout, the administrative write side, and the stock field.
//!
//! ## Stock Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Conditional Decrement                                │
//! │                                                                         │
//! │  UPDATE products                                                       │
//! │     SET stock_milli = stock_milli - :qty                               │
//! │   WHERE id = :id AND is_active = 1 AND stock_milli >= :qty             │
//! │  RETURNING stock_milli                                                 │
//! │       │                                                                 │
//! │       ├── 1 row  → Decremented { remaining }                           │
//! │       │                                                                 │
//! │       └── 0 rows → look the product up again                           │
//! │                     ├── active  → Insufficient { available }           │
//! │                     └── missing → NotFound                              │
//! │                                                                         │
//! │  Never clamps: a decrement either fits entirely or changes nothing.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use caja_core::validation::{
    validate_bar_code, validate_discount_bps, validate_price_cents, validate_product_name,
    validate_stock_milli,
};
use caja_core::{Product, ValidationError, MILLI_PER_UNIT};

const PRODUCT_COLUMNS: &str = "id, category_id, bar_code, name, description, brand, \
     stock_milli, min_stock_milli, price_cents, discount_bps, is_iva_exempt, is_active, \
     created_at, updated_at";

// =============================================================================
// Write Models
// =============================================================================

/// Fields for a new catalog entry.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category_id: i64,
    pub bar_code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub stock_milli: i64,
    pub min_stock_milli: i64,
    pub price_cents: i64,
    pub discount_bps: Option<u32>,
    pub is_iva_exempt: bool,
}

impl NewProduct {
    /// A product with no stock, no discount and no descriptive fields.
    pub fn new(category_id: i64, name: impl Into<String>, price_cents: i64) -> Self {
        NewProduct {
            category_id,
            bar_code: None,
            name: name.into(),
            description: None,
            brand: None,
            stock_milli: 0,
            min_stock_milli: 0,
            price_cents,
            discount_bps: None,
            is_iva_exempt: false,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_product_name(&self.name)?;
        validate_bar_code(self.bar_code.as_deref())?;
        validate_price_cents(self.price_cents)?;
        validate_discount_bps(self.discount_bps)?;
        validate_stock_milli("stock", self.stock_milli)?;
        validate_stock_milli("min_stock", self.min_stock_milli)?;
        Ok(())
    }
}

/// Editable catalog fields. Stock only moves through sales and [`ProductRepository::restock`].
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub bar_code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub min_stock_milli: i64,
    pub price_cents: i64,
    pub discount_bps: Option<u32>,
    pub is_iva_exempt: bool,
}

impl From<&Product> for ProductUpdate {
    fn from(p: &Product) -> Self {
        ProductUpdate {
            bar_code: p.bar_code.clone(),
            name: p.name.clone(),
            description: p.description.clone(),
            brand: p.brand.clone(),
            min_stock_milli: p.min_stock_milli,
            price_cents: p.price_cents,
            discount_bps: p.discount_bps,
            is_iva_exempt: p.is_iva_exempt,
        }
    }
}

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockOutcome {
    Decremented { remaining_milli: i64 },
    Insufficient { available_milli: i64 },
    NotFound,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_active(7).await?;
/// let low = repo.low_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product with generated id and timestamps
    /// * `Err(DbError::NotFound)` - Category doesn't exist
    /// * `Err(DbError::UniqueViolation)` - Barcode already exists
    /// * `Err(DbError::Validation)` - Fractional stock in a unit category, bad price, ...
    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        product.validate()?;

        let is_weighted = self.category_weighting(product.category_id).await?;
        check_granularity(is_weighted, "stock", product.stock_milli)?;
        check_granularity(is_weighted, "min_stock", product.min_stock_milli)?;

        debug!(name = %product.name, category_id = product.category_id, "Inserting product");

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO products (
                category_id, bar_code, name, description, brand,
                stock_milli, min_stock_milli, price_cents, discount_bps,
                is_iva_exempt, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?11)
            RETURNING {PRODUCT_COLUMNS}"
        );

        sqlx::query_as::<_, Product>(&sql)
            .bind(product.category_id)
            .bind(product.bar_code.as_deref())
            .bind(product.name.trim())
            .bind(product.description.as_deref())
            .bind(product.brand.as_deref())
            .bind(product.stock_milli)
            .bind(product.min_stock_milli)
            .bind(product.price_cents)
            .bind(product.discount_bps)
            .bind(product.is_iva_exempt)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => {
                    DbError::duplicate("bar_code", product.bar_code.clone().unwrap_or_default())
                }
                other => other,
            })
    }

    /// Updates the editable fields of an active product.
    ///
    /// Committed sales keep the price, discount and exemption they were
    /// sold with.
    pub async fn update(&self, id: i64, update: &ProductUpdate) -> DbResult<Product> {
        validate_product_name(&update.name)?;
        validate_bar_code(update.bar_code.as_deref())?;
        validate_price_cents(update.price_cents)?;
        validate_discount_bps(update.discount_bps)?;
        validate_stock_milli("min_stock", update.min_stock_milli)?;

        debug!(product_id = id, "Updating product");

        let sql = format!(
            "UPDATE products SET
                bar_code = ?1, name = ?2, description = ?3, brand = ?4,
                min_stock_milli = ?5, price_cents = ?6, discount_bps = ?7,
                is_iva_exempt = ?8, updated_at = ?9
            WHERE id = ?10 AND is_active = 1
            RETURNING {PRODUCT_COLUMNS}"
        );

        sqlx::query_as::<_, Product>(&sql)
            .bind(update.bar_code.as_deref())
            .bind(update.name.trim())
            .bind(update.description.as_deref())
            .bind(update.brand.as_deref())
            .bind(update.min_stock_milli)
            .bind(update.price_cents)
            .bind(update.discount_bps)
            .bind(update.is_iva_exempt)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by its ID, active or not.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a sellable product. Soft-deleted products read as absent.
    pub async fn get_active(&self, id: i64) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND is_active = 1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists active products by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Active products at or below their minimum stock, lowest first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE is_active = 1 AND stock_milli <= min_stock_milli
             ORDER BY stock_milli, id"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Low stock products");
        Ok(products)
    }

    /// Adds stock to an active product.
    pub async fn restock(&self, id: i64, delta_milli: i64) -> DbResult<Product> {
        if delta_milli <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let product = self
            .get_active(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        let is_weighted = self.category_weighting(product.category_id).await?;
        check_granularity(is_weighted, "quantity", delta_milli)?;

        debug!(product_id = id, delta_milli, "Restocking product");

        let sql = format!(
            "UPDATE products SET stock_milli = stock_milli + ?1, updated_at = ?2
             WHERE id = ?3 AND is_active = 1
             RETURNING {PRODUCT_COLUMNS}"
        );

        sqlx::query_as::<_, Product>(&sql)
            .bind(delta_milli)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Marks a product inactive. Rows referenced by sale details are never
    /// deleted.
    pub async fn soft_delete(&self, id: i64) -> DbResult<()> {
        debug!(product_id = id, "Soft deleting product");

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Decrements stock outside any caller transaction.
    pub async fn decrement_stock(&self, id: i64, quantity_milli: i64) -> DbResult<StockOutcome> {
        let mut conn = self.pool.acquire().await?;
        decrement_stock_in(&mut conn, id, quantity_milli).await
    }

    async fn category_weighting(&self, category_id: i64) -> DbResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT is_weighted FROM categories WHERE id = ?1")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Category", category_id))
    }
}

/// Conditional decrement on the caller's connection, usually inside the
/// checkout transaction.
pub(crate) async fn decrement_stock_in(
    conn: &mut SqliteConnection,
    id: i64,
    quantity_milli: i64,
) -> DbResult<StockOutcome> {
    debug!(product_id = id, quantity_milli, "Decrementing stock");

    let remaining: Option<i64> = sqlx::query_scalar(
        "UPDATE products SET stock_milli = stock_milli - ?1, updated_at = ?2
         WHERE id = ?3 AND is_active = 1 AND stock_milli >= ?1
         RETURNING stock_milli",
    )
    .bind(quantity_milli)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(remaining_milli) = remaining {
        return Ok(StockOutcome::Decremented { remaining_milli });
    }

    let available: Option<i64> =
        sqlx::query_scalar("SELECT stock_milli FROM products WHERE id = ?1 AND is_active = 1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(match available {
        Some(available_milli) => StockOutcome::Insufficient { available_milli },
        None => StockOutcome::NotFound,
    })
}

/// Unit categories hold whole units only.
fn check_granularity(is_weighted: bool, field: &str, milli: i64) -> Result<(), ValidationError> {
    if !is_weighted && milli % MILLI_PER_UNIT != 0 {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a whole number of units".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let units = db.categories().insert("Abarrotes", false).await.unwrap();
        let weighted = db.categories().insert("Frutas", true).await.unwrap();
        (db, units.id, weighted.id)
    }

    fn new_product(category_id: i64, stock_milli: i64) -> NewProduct {
        NewProduct {
            stock_milli,
            min_stock_milli: 2_000,
            ..NewProduct::new(category_id, "Arroz 1kg", 1_290)
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (db, units, _) = setup().await;
        let repo = db.products();

        let p = repo.insert(&new_product(units, 5_000)).await.unwrap();
        assert_eq!(p.stock_milli, 5_000);
        assert!(p.is_active);

        let fetched = repo.get_active(p.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Arroz 1kg");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_unknown_category() {
        let (db, _, _) = setup().await;

        let err = db.products().insert(&new_product(999, 0)).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fractional_stock_only_for_weighted() {
        let (db, units, weighted) = setup().await;
        let repo = db.products();

        let err = repo.insert(&new_product(units, 1_500)).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let p = repo.insert(&new_product(weighted, 1_500)).await.unwrap();
        assert_eq!(p.stock_milli, 1_500);
    }

    #[tokio::test]
    async fn test_duplicate_bar_code() {
        let (db, units, _) = setup().await;
        let repo = db.products();

        let mut p = new_product(units, 0);
        p.bar_code = Some("7801234567890".to_string());
        repo.insert(&p).await.unwrap();

        let err = repo.insert(&p).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_decrement_never_clamps() {
        let (db, units, _) = setup().await;
        let repo = db.products();
        let p = repo.insert(&new_product(units, 3_000)).await.unwrap();

        assert_eq!(
            repo.decrement_stock(p.id, 2_000).await.unwrap(),
            StockOutcome::Decremented { remaining_milli: 1_000 }
        );
        assert_eq!(
            repo.decrement_stock(p.id, 2_000).await.unwrap(),
            StockOutcome::Insufficient { available_milli: 1_000 }
        );
        assert_eq!(
            repo.decrement_stock(p.id + 50, 1_000).await.unwrap(),
            StockOutcome::NotFound
        );

        let p = repo.get_by_id(p.id).await.unwrap().unwrap();
        assert_eq!(p.stock_milli, 1_000);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_product() {
        let (db, units, _) = setup().await;
        let repo = db.products();
        let p = repo.insert(&new_product(units, 3_000)).await.unwrap();

        assert_eq!(repo.list_active(10).await.unwrap().len(), 1);
        repo.soft_delete(p.id).await.unwrap();

        assert!(repo.list_active(10).await.unwrap().is_empty());
        assert!(repo.get_active(p.id).await.unwrap().is_none());
        assert!(repo.get_by_id(p.id).await.unwrap().is_some());
        assert_eq!(
            repo.decrement_stock(p.id, 1_000).await.unwrap(),
            StockOutcome::NotFound
        );
        assert!(matches!(
            repo.soft_delete(p.id).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_restock_and_low_stock() {
        let (db, units, _) = setup().await;
        let repo = db.products();
        let low = repo.insert(&new_product(units, 1_000)).await.unwrap();
        let fine = repo.insert(&new_product(units, 10_000)).await.unwrap();
        assert!(low.is_low_stock());
        assert!(!fine.is_low_stock());

        let ids: Vec<i64> = repo.low_stock().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![low.id]);

        let restocked = repo.restock(low.id, 5_000).await.unwrap();
        assert_eq!(restocked.stock_milli, 6_000);
        assert!(repo.low_stock().await.unwrap().is_empty());

        assert!(repo.restock(fine.id, 0).await.is_err());
        assert!(repo.restock(fine.id, 500).await.is_err());
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let (db, units, _) = setup().await;
        let repo = db.products();
        let p = repo.insert(&new_product(units, 4_000)).await.unwrap();

        let mut update = ProductUpdate::from(&p);
        update.price_cents = 1_490;
        update.discount_bps = Some(500);
        update.is_iva_exempt = true;

        let updated = repo.update(p.id, &update).await.unwrap();
        assert_eq!(updated.price_cents, 1_490);
        assert_eq!(updated.discount_bps, Some(500));
        assert!(updated.is_iva_exempt);
        assert_eq!(updated.stock_milli, 4_000);

        update.price_cents = 0;
        assert!(matches!(
            repo.update(p.id, &update).await.unwrap_err(),
            DbError::Validation(_)
        ));
    }
}
