//! Pools shared across threads
//!
//! A [`SharedPool`] wraps a [`Pool`] in `Arc<RwLock<_>>`. Quotes and route
//! searches take read locks; committing a route takes the write lock of every
//! routed pool for the whole compute-then-execute sequence, so no other writer
//! can move reserves between the split being computed and being applied.
//! Read and write locks are always acquired in address order so concurrent
//! searches and routes over overlapping pool sets cannot deadlock.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AmmError, Result};
use crate::pool::Pool;
use crate::pool_traits::{PoolHandle, PoolView};
use crate::router::{RouteSplit, Router};
use crate::trade::{Direction, PoolState, SwapQuote, TradeRecord};

/// Cloneable handle to a pool behind a read/write lock
#[derive(Debug, Clone)]
pub struct SharedPool {
    inner: Arc<RwLock<Pool>>,
}

impl SharedPool {
    pub fn new(pool: Pool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(pool)),
        }
    }

    pub fn name(&self) -> String {
        self.inner.read().name().to_string()
    }

    pub fn state(&self) -> PoolState {
        self.inner.read().state()
    }

    /// Detached copy of the pool as it is now
    pub fn snapshot(&self) -> Pool {
        self.inner.read().clone()
    }

    pub fn quote(&self, direction: Direction, amount_in: Decimal) -> Result<SwapQuote> {
        self.inner.read().quote(direction, amount_in)
    }

    pub fn execute(
        &self,
        direction: Direction,
        amount_in: Decimal,
        timestamp: u64,
    ) -> Result<TradeRecord> {
        self.inner.write().execute(direction, amount_in, timestamp)
    }

    fn lock_order(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl From<Pool> for SharedPool {
    fn from(pool: Pool) -> Self {
        Self::new(pool)
    }
}

impl Router {
    /// Compute a split over shared pools under read locks
    pub fn compute_split_shared(
        &self,
        total: Decimal,
        direction: Direction,
        pools: &[SharedPool],
    ) -> Result<RouteSplit> {
        let guards = read_all(pools)?;
        let views: Vec<&Pool> = guards.iter().map(|guard| &**guard).collect();
        self.compute_split(total, direction, &views)
    }

    /// Compute and commit a split atomically with respect to other writers
    pub fn route_shared(
        &self,
        total: Decimal,
        direction: Direction,
        pools: &[SharedPool],
        timestamp: u64,
    ) -> Result<(RouteSplit, Vec<TradeRecord>)> {
        let mut guards = lock_all(pools)?;
        let mut handles: Vec<&mut Pool> = guards.iter_mut().map(|guard| &mut **guard).collect();

        let (split, records) = self.route_and_execute(total, direction, &mut handles, timestamp)?;
        debug!(
            pools = pools.len(),
            legs = records.len(),
            "Committed route over shared pools"
        );
        Ok((split, records))
    }
}

/// Indices of `pools` in lock acquisition order, rejecting repeats
///
/// Readers and writers share this order: parking_lot locks are fair, so a
/// queued writer blocks new readers and any other order can deadlock.
fn lock_sequence(pools: &[SharedPool]) -> Result<Vec<usize>> {
    let mut order: Vec<usize> = (0..pools.len()).collect();
    order.sort_by_key(|&index| pools[index].lock_order());

    if let Some(pair) = order
        .windows(2)
        .find(|w| pools[w[0]].lock_order() == pools[w[1]].lock_order())
    {
        return Err(AmmError::DuplicatePool {
            pool: pools[pair[0]].name(),
        });
    }
    Ok(order)
}

/// Read-lock every pool in address order, returning guards in input order
fn read_all(pools: &[SharedPool]) -> Result<Vec<RwLockReadGuard<'_, Pool>>> {
    let mut slots: Vec<Option<RwLockReadGuard<'_, Pool>>> =
        (0..pools.len()).map(|_| None).collect();
    for index in lock_sequence(pools)? {
        slots[index] = Some(pools[index].inner.read());
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Write-lock every pool in address order, returning guards in input order
fn lock_all(pools: &[SharedPool]) -> Result<Vec<RwLockWriteGuard<'_, Pool>>> {
    let mut slots: Vec<Option<RwLockWriteGuard<'_, Pool>>> =
        (0..pools.len()).map(|_| None).collect();
    for index in lock_sequence(pools)? {
        slots[index] = Some(pools[index].inner.write());
    }
    Ok(slots.into_iter().flatten().collect())
}
