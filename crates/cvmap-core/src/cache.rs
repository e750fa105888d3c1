//! Per-operation cache for idempotent, accession-keyed term-service lookups.
//!
//! A single mutex guards every slot of one cache instance. A miss parks a
//! `Pending` slot that concurrent readers of the same key wait on; the
//! caller that owns the miss must either fill it or cancel it. Cancellation
//! happens automatically when the [`PendingSlot`] guard is dropped unfilled,
//! so an error (or a panic) in the uncached computation can never leave a
//! key in flight.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};

use serde::Serialize;
use tracing::debug;

use crate::error::{CvError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: &'static str,
    ontology: String,
    accession: String,
    depth: Option<i32>,
}

impl CacheKey {
    pub fn new(operation: &'static str, ontology: &str, accession: &str) -> Self {
        Self {
            operation,
            ontology: ontology.to_string(),
            accession: accession.to_string(),
            depth: None,
        }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: i32) -> Self {
        self.depth = Some(depth);
        self
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.operation, self.ontology, self.accession)?;
        if let Some(depth) = self.depth {
            write!(f, ":{depth}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub cancellations: u64,
}

#[derive(Debug)]
enum Slot<V> {
    Pending,
    Ready(V),
}

#[derive(Debug)]
struct CacheState<V> {
    slots: HashMap<CacheKey, Slot<V>>,
    stats: CacheStats,
}

#[derive(Debug)]
pub struct QueryCache<V> {
    name: &'static str,
    state: Mutex<CacheState<V>>,
    settled: Condvar,
}

pub enum Lookup<'a, V: Clone> {
    Hit(V),
    Miss(PendingSlot<'a, V>),
}

/// Ownership of an in-flight miss. Resolve it with [`PendingSlot::fill`];
/// dropping it cancels the slot.
pub struct PendingSlot<'a, V: Clone> {
    cache: &'a QueryCache<V>,
    key: Option<CacheKey>,
}

impl<V: Clone> PendingSlot<'_, V> {
    pub fn fill(mut self, value: V) {
        if let Some(key) = self.key.take() {
            self.cache.settle(key, Some(value));
        }
    }

    pub fn cancel(mut self) {
        if let Some(key) = self.key.take() {
            self.cache.settle(key, None);
        }
    }
}

impl<V: Clone> Drop for PendingSlot<'_, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.cache.settle(key, None);
        }
    }
}

impl<V: Clone> QueryCache<V> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(CacheState {
                slots: HashMap::new(),
                stats: CacheStats::default(),
            }),
            settled: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState<V>>> {
        self.state
            .lock()
            .map_err(|_| CvError::mutex_poisoned(self.name))
    }

    /// Reads `key`. On a miss the caller receives the slot and must settle it;
    /// if another caller already owns the miss, this waits for it to settle.
    pub fn lookup(&self, key: CacheKey) -> Result<Lookup<'_, V>> {
        let mut state = self.lock()?;
        loop {
            match state.slots.get(&key) {
                Some(Slot::Ready(value)) => {
                    let value = value.clone();
                    state.stats.hits += 1;
                    return Ok(Lookup::Hit(value));
                }
                Some(Slot::Pending) => {
                    state = self
                        .settled
                        .wait(state)
                        .map_err(|_| CvError::mutex_poisoned(self.name))?;
                }
                None => {
                    state.slots.insert(key.clone(), Slot::Pending);
                    state.stats.misses += 1;
                    debug!(cache = self.name, key = %key, "cache miss");
                    return Ok(Lookup::Miss(PendingSlot {
                        cache: self,
                        key: Some(key),
                    }));
                }
            }
        }
    }

    /// Cached read with fallback to `compute`. A failed computation cancels
    /// the pending slot and propagates the error untouched.
    pub fn get_or_try_insert_with<F>(&self, key: CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        match self.lookup(key)? {
            Lookup::Hit(value) => Ok(value),
            Lookup::Miss(slot) => {
                let value = compute()?;
                slot.fill(value.clone());
                Ok(value)
            }
        }
    }

    fn settle(&self, key: CacheKey, value: Option<V>) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        match value {
            Some(value) => {
                state.slots.insert(key, Slot::Ready(value));
            }
            None => {
                if matches!(state.slots.get(&key), Some(Slot::Pending)) {
                    state.slots.remove(&key);
                }
                state.stats.cancellations += 1;
                debug!(cache = self.name, key = %key, "cache slot cancelled");
            }
        }
        drop(state);
        self.settled.notify_all();
    }

    /// Drops every settled entry. Pending slots stay with their owners.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock()?;
        state
            .slots
            .retain(|_, slot| matches!(slot, Slot::Pending));
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let state = self.lock()?;
        Ok(state
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        Ok(self.lock()?.stats)
    }
}
