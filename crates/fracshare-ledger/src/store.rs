//! Row store with per-row exclusive locks.
//!
//! Every row lives behind its own `tokio::sync::Mutex`. A transaction locks
//! the rows it touches in the fixed global order
//!
//! ```text
//! Hold | Reservation → Order → ParkAccount → Wallets (ascending UserId)
//!                                            → Holdings (ascending (UserId, PropertyId))
//! ```
//!
//! mutates *staged* copies through [`RowGuard`], appends its audit batch and
//! only then commits the staged copies back. Dropping a guard without
//! committing discards the staged copy, so any `?` before the commit point
//! leaves the store untouched.
//!
//! Lock acquisition is bounded by the configured lock timeout and surfaces
//! as [`FracshareError::LockTimeout`].

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use fracshare_types::{
    FracshareError, Hold, HoldId, Holding, Order, OrderId, ParkAccount, PropertyId, Reservation,
    ReservationId, Result, UserId, Wallet,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::audit_log::AuditLog;

/// Key of a holding row and of a park account row.
pub type PositionKey = (UserId, PropertyId);

/// Exclusive lock on one row plus a staged copy of it.
///
/// Reads and writes go to the staged copy. [`RowGuard::commit`] publishes
/// it; dropping the guard discards it.
pub struct RowGuard<T> {
    guard: OwnedMutexGuard<T>,
    staged: T,
}

impl<T: Clone> RowGuard<T> {
    fn new(guard: OwnedMutexGuard<T>) -> Self {
        let staged = guard.clone();
        Self { guard, staged }
    }

    /// The row as last committed.
    pub fn committed(&self) -> &T {
        &self.guard
    }

    /// Publish the staged copy and release the lock.
    pub fn commit(self) {
        let Self { mut guard, staged } = self;
        *guard = staged;
    }
}

impl<T> Deref for RowGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.staged
    }
}

impl<T> DerefMut for RowGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.staged
    }
}

/// One table: an ordered map of individually locked rows.
///
/// The map lock is only held long enough to clone a row handle; nobody
/// waits on a row lock while holding it.
pub struct Table<K, V> {
    name: &'static str,
    rows: RwLock<BTreeMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> Table<K, V>
where
    K: Ord + Copy + Debug,
    V: Clone,
{
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    async fn handle(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.rows.read().await.get(key).cloned()
    }

    async fn handle_or_insert_with(&self, key: K, init: impl FnOnce() -> V) -> Arc<Mutex<V>> {
        if let Some(handle) = self.handle(&key).await {
            return handle;
        }
        self.rows
            .write()
            .await
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    async fn acquire(&self, key: &K, handle: Arc<Mutex<V>>, timeout: Duration) -> Result<RowGuard<V>> {
        match tokio::time::timeout(timeout, handle.lock_owned()).await {
            Ok(guard) => Ok(RowGuard::new(guard)),
            Err(_) => {
                tracing::warn!(table = self.name, key = ?key, "Row lock timed out");
                Err(FracshareError::LockTimeout {
                    resource: format!("{}:{key:?}", self.name),
                })
            }
        }
    }

    /// Lock an existing row. `Ok(None)` if the key is absent.
    pub async fn lock(&self, key: &K, timeout: Duration) -> Result<Option<RowGuard<V>>> {
        match self.handle(key).await {
            Some(handle) => self.acquire(key, handle, timeout).await.map(Some),
            None => Ok(None),
        }
    }

    /// Lock a row, creating it from `init` first if absent.
    pub async fn lock_or_insert_with(
        &self,
        key: K,
        timeout: Duration,
        init: impl FnOnce() -> V,
    ) -> Result<RowGuard<V>> {
        let handle = self.handle_or_insert_with(key, init).await;
        self.acquire(&key, handle, timeout).await
    }

    /// Insert a brand new row. Returns `false` if the key already exists.
    pub async fn insert_new(&self, key: K, value: V) -> bool {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&key) {
            return false;
        }
        rows.insert(key, Arc::new(Mutex::new(value)));
        true
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.rows.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Committed copy of one row, waiting at most `timeout` for its lock.
    pub async fn get(&self, key: &K, timeout: Duration) -> Result<Option<V>> {
        Ok(self.lock(key, timeout).await?.map(|row| row.committed().clone()))
    }

    /// Committed copies of every row, in key order.
    ///
    /// Rows are read one at a time, so the result is only a consistent
    /// snapshot when no transaction is in flight.
    pub async fn snapshot(&self, timeout: Duration) -> Result<Vec<V>> {
        let handles: Vec<(K, Arc<Mutex<V>>)> = self
            .rows
            .read()
            .await
            .iter()
            .map(|(k, h)| (*k, h.clone()))
            .collect();
        let mut out = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            out.push(self.acquire(&key, handle, timeout).await?.committed().clone());
        }
        Ok(out)
    }

    /// Keys of up to `limit` rows matching `pred`, in key order.
    ///
    /// Rows currently locked by a transaction are skipped; the caller
    /// re-checks every candidate under its lock anyway.
    pub async fn scan(&self, limit: usize, pred: impl Fn(&V) -> bool) -> Vec<K> {
        let handles: Vec<(K, Arc<Mutex<V>>)> = self
            .rows
            .read()
            .await
            .iter()
            .map(|(k, h)| (*k, h.clone()))
            .collect();
        let mut out = Vec::new();
        for (key, handle) in handles {
            if out.len() >= limit {
                break;
            }
            if let Ok(row) = handle.try_lock() {
                if pred(&row) {
                    out.push(key);
                }
            }
        }
        out
    }
}

/// All engine state.
pub struct Store {
    pub wallets: Table<UserId, Wallet>,
    /// `None` marks a holding that was emptied by a sale.
    pub holdings: Table<PositionKey, Option<Holding>>,
    pub orders: Table<OrderId, Order>,
    pub parks: Table<PositionKey, ParkAccount>,
    pub holds: Table<HoldId, Hold>,
    pub reservations: Table<ReservationId, Reservation>,
    pub audit: AuditLog,
    lock_timeout: Duration,
}

impl Store {
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            wallets: Table::new("wallet"),
            holdings: Table::new("holding"),
            orders: Table::new("order"),
            parks: Table::new("park"),
            holds: Table::new("hold"),
            reservations: Table::new("reservation"),
            audit: AuditLog::new(),
            lock_timeout,
        }
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub async fn lock_order(&self, id: OrderId) -> Result<RowGuard<Order>> {
        self.orders
            .lock(&id, self.lock_timeout)
            .await?
            .ok_or(FracshareError::OrderNotFound(id))
    }

    pub async fn lock_hold(&self, id: HoldId) -> Result<RowGuard<Hold>> {
        self.holds
            .lock(&id, self.lock_timeout)
            .await?
            .ok_or(FracshareError::HoldNotFound(id))
    }

    pub async fn lock_reservation(&self, id: ReservationId) -> Result<RowGuard<Reservation>> {
        self.reservations
            .lock(&id, self.lock_timeout)
            .await?
            .ok_or(FracshareError::ReservationNotFound(id))
    }

    /// The park account of `(seller, property)`, created empty on first use.
    pub async fn lock_park(&self, seller: UserId, property: PropertyId) -> Result<RowGuard<ParkAccount>> {
        self.parks
            .lock_or_insert_with((seller, property), self.lock_timeout, || {
                ParkAccount::new(seller, property)
            })
            .await
    }

    /// # Errors
    /// `WalletNotFound` if the user has no wallet. Callers reach this only
    /// for users that passed authentication, so it is an integrity fault.
    pub async fn lock_wallet(&self, user: UserId) -> Result<RowGuard<Wallet>> {
        self.wallets
            .lock(&user, self.lock_timeout)
            .await?
            .ok_or(FracshareError::WalletNotFound(user))
    }

    /// Lock two distinct wallets, lower id first. Returned as `(a, b)`.
    pub async fn lock_wallet_pair(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<(RowGuard<Wallet>, RowGuard<Wallet>)> {
        if a == b {
            return Err(FracshareError::SelfTrade);
        }
        if a < b {
            let first = self.lock_wallet(a).await?;
            let second = self.lock_wallet(b).await?;
            Ok((first, second))
        } else {
            let first = self.lock_wallet(b).await?;
            let second = self.lock_wallet(a).await?;
            Ok((second, first))
        }
    }

    /// Lock a holding slot, creating an empty one if absent.
    pub async fn lock_holding(&self, key: PositionKey) -> Result<RowGuard<Option<Holding>>> {
        self.holdings
            .lock_or_insert_with(key, self.lock_timeout, || None)
            .await
    }

    /// Lock two distinct holding slots in key order. Returned as `(a, b)`.
    pub async fn lock_holding_pair(
        &self,
        a: PositionKey,
        b: PositionKey,
    ) -> Result<(RowGuard<Option<Holding>>, RowGuard<Option<Holding>>)> {
        if a == b {
            return Err(FracshareError::SelfTrade);
        }
        if a < b {
            let first = self.lock_holding(a).await?;
            let second = self.lock_holding(b).await?;
            Ok((first, second))
        } else {
            let first = self.lock_holding(b).await?;
            let second = self.lock_holding(a).await?;
            Ok((second, first))
        }
    }

    /// Committed holding of `user` in `property`, if any.
    pub async fn holding(&self, user: UserId, property: PropertyId) -> Result<Option<Holding>> {
        Ok(self
            .holdings
            .get(&(user, property), self.lock_timeout)
            .await?
            .flatten())
    }
}
