//! # Tax Rate Registry
//!
//! One current rate per tax kind plus an append-only change history.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update("iva", 0.21)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  writer lock (one update at a time, reads never wait on it)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    INSERT tax_rate_history (rate, previous = current rate)             │
//! │    UPSERT tax_rates                                                     │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Readers see the row before or after the commit, never in between.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use caja_core::validation::{validate_tax_kind, validate_tax_rate_bps};
use caja_core::{TaxRate, TaxRateChange, TaxRateSetting};

/// Outcome of [`TaxRateRepository::update`].
#[derive(Debug, Clone)]
pub struct TaxRateUpdate {
    /// Rate before the update; `None` when the kind was created.
    pub previous: Option<TaxRate>,
    pub current: TaxRateSetting,
}

/// Repository for the tax rate registry.
#[derive(Debug, Clone)]
pub struct TaxRateRepository {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl TaxRateRepository {
    /// Creates a new TaxRateRepository sharing the given writer lock.
    pub fn new(pool: SqlitePool, writer: Arc<Mutex<()>>) -> Self {
        TaxRateRepository { pool, writer }
    }

    /// Gets the current rate of a kind, if it exists.
    pub async fn get(&self, kind: &str) -> DbResult<Option<TaxRateSetting>> {
        let setting = sqlx::query_as::<_, TaxRateSetting>(
            "SELECT kind, rate_bps, last_updated FROM tax_rates WHERE kind = ?1",
        )
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    /// Gets the current rate of a kind.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Unknown kind
    pub async fn current(&self, kind: &str) -> DbResult<TaxRateSetting> {
        debug!(kind = %kind, "Reading tax rate");

        self.get(kind)
            .await?
            .ok_or_else(|| DbError::not_found("Tax rate", kind))
    }

    /// Replaces the current rate of a kind, creating the kind if needed,
    /// and records the change.
    pub async fn update(&self, kind: &str, rate: TaxRate) -> DbResult<TaxRateUpdate> {
        validate_tax_kind(kind)?;
        validate_tax_rate_bps(rate.bps())?;

        let _writer = self.writer.lock().await;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // First statement writes, so the transaction holds the write lock
        // from the start.
        let previous_bps: Option<u32> = sqlx::query_scalar(
            "INSERT INTO tax_rate_history (kind, rate_bps, previous_bps, changed_at)
             VALUES (?1, ?2, (SELECT rate_bps FROM tax_rates WHERE kind = ?1), ?3)
             RETURNING previous_bps",
        )
        .bind(kind)
        .bind(rate.bps())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let current = sqlx::query_as::<_, TaxRateSetting>(
            "INSERT INTO tax_rates (kind, rate_bps, last_updated) VALUES (?1, ?2, ?3)
             ON CONFLICT(kind) DO UPDATE SET
                rate_bps = excluded.rate_bps,
                last_updated = excluded.last_updated
             RETURNING kind, rate_bps, last_updated",
        )
        .bind(kind)
        .bind(rate.bps())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            kind = %kind,
            previous_bps = ?previous_bps,
            rate_bps = rate.bps(),
            "Tax rate updated"
        );

        Ok(TaxRateUpdate {
            previous: previous_bps.map(TaxRate::from_bps),
            current,
        })
    }

    /// Change history of a kind, newest first.
    pub async fn history(&self, kind: &str) -> DbResult<Vec<TaxRateChange>> {
        let changes = sqlx::query_as::<_, TaxRateChange>(
            "SELECT id, kind, rate_bps, previous_bps, changed_at
             FROM tax_rate_history WHERE kind = ?1 ORDER BY id DESC",
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(changes)
    }
}
