//! # Stock Locks
//!
//! Per-product mutual exclusion for checkout.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale A: products {7, 3}        Sale B: products {3, 9, 7}              │
//! │                                                                         │
//! │  sorted → lock 3, lock 7        sorted → lock 3, lock 7, lock 9         │
//! │                                                                         │
//! │  Both sales take product 3 first, so neither can hold 7 while          │
//! │  waiting for 3: no lock cycle, no deadlock.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The locks only serialize checkouts inside one process. The conditional
//! `UPDATE ... WHERE stock_milli >= ?` in the checkout transaction is what
//! keeps stock non-negative across processes.
//!
//! A product's entry lives only while some sale holds or waits for it; the
//! last guard to release it removes it from the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type Registry = Arc<StdMutex<HashMap<i64, Arc<Mutex<()>>>>>;

/// Registry of one async mutex per product id.
#[derive(Debug, Clone, Default)]
pub struct StockLocks {
    inner: Registry,
}

/// Holds the locks of every product in one sale until dropped.
#[derive(Debug)]
pub struct StockGuard {
    registry: Registry,
    product_ids: Vec<i64>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl StockGuard {
    /// Locked product ids, ascending.
    pub fn product_ids(&self) -> &[i64] {
        &self.product_ids
    }
}

impl Drop for StockGuard {
    fn drop(&mut self) {
        self.guards.clear();

        // Clones are only taken under the map lock, so a count of one means
        // nobody else holds or waits for this mutex.
        let mut map = lock_registry(&self.registry);
        for id in &self.product_ids {
            if map.get(id).is_some_and(|m| Arc::strong_count(m) == 1) {
                map.remove(id);
            }
        }
    }
}

impl StockLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every distinct id in ascending order.
    ///
    /// Dropping the returned guard (including by cancelling the future
    /// that holds it) releases all of them.
    pub async fn acquire<I>(&self, product_ids: I) -> StockGuard
    where
        I: IntoIterator<Item = i64>,
    {
        let mut ids: Vec<i64> = product_ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        // Built up front so a cancelled acquire still releases and prunes
        let mut guard = StockGuard {
            registry: self.inner.clone(),
            guards: Vec::with_capacity(ids.len()),
            product_ids: ids,
        };
        for i in 0..guard.product_ids.len() {
            let mutex = self.mutex_for(guard.product_ids[i]);
            guard.guards.push(mutex.lock_owned().await);
        }

        debug!(products = ?guard.product_ids, "Stock locks acquired");
        guard
    }

    fn mutex_for(&self, product_id: i64) -> Arc<Mutex<()>> {
        lock_registry(&self.inner).entry(product_id).or_default().clone()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        lock_registry(&self.inner).len()
    }
}

fn lock_registry(registry: &Registry) -> MutexGuard<'_, HashMap<i64, Arc<Mutex<()>>>> {
    // Every update is a single insert or remove, so a poisoned map is still whole.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
