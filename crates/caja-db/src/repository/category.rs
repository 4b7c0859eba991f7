//! # Category Repository
//!
//! A category decides the unit model of its products: weighted categories
//! sell by the kilogram, the rest by the unit.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use caja_core::validation::validate_category_name;
use caja_core::Category;

const CATEGORY_COLUMNS: &str = "id, name, is_weighted, created_at, updated_at";

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Inserts a new category.
    ///
    /// ## Returns
    /// * `Ok(Category)` - Inserted category with its generated id
    /// * `Err(DbError::UniqueViolation)` - Name already taken
    pub async fn insert(&self, name: &str, is_weighted: bool) -> DbResult<Category> {
        let name = name.trim();
        validate_category_name(name)?;

        debug!(name = %name, is_weighted, "Inserting category");

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO categories (name, is_weighted, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?3) RETURNING {CATEGORY_COLUMNS}"
        );

        sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .bind(is_weighted)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::duplicate("category name", name),
                other => other,
            })
    }

    /// Gets a category by its ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1");

        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    /// Lists all categories by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name");

        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(categories)
    }

    /// Switches a category between unit and weight.
    ///
    /// Committed sale details keep the unit model they were sold under.
    pub async fn set_weighting(&self, id: i64, is_weighted: bool) -> DbResult<Category> {
        debug!(id, is_weighted, "Updating category weighting");

        let sql = format!(
            "UPDATE categories SET is_weighted = ?1, updated_at = ?2 \
             WHERE id = ?3 RETURNING {CATEGORY_COLUMNS}"
        );

        sqlx::query_as::<_, Category>(&sql)
            .bind(is_weighted)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }
}
