//! Value and hash caches
//!
//! `ValueCache` is the single piece of cross-thread mutable state in the
//! engine. It maps `(plug, fingerprint)` to an immutable, reference-counted
//! value and coalesces concurrent computations of the same key: the first
//! caller computes, every other caller blocks until that result (or error)
//! is published.
//!
//! Because the key is a content fingerprint, entries never go stale. The
//! LRU bound only trades memory against recomputation.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::cancel::Canceller;
use crate::error::{PlugGraphError, Result};
use crate::graph::PlugId;
use crate::hash::Fingerprint;
use crate::value::PlugValue;

/// Key of a cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub plug: PlugId,
    pub hash: Fingerprint,
}

/// Statistics about a value cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookups answered from stored entries
    pub hits: u64,
    /// Lookups that ran a computation
    pub misses: u64,
    /// Lookups that joined another thread's in-flight computation
    pub coalesced: u64,
    /// Entries currently stored
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

type Published = Option<Result<Arc<PlugValue>>>;

/// A computation in progress for one key
struct InFlight {
    result: Mutex<Published>,
    ready: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn publish(&self, result: Result<Arc<PlugValue>>) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    /// Block until published, waking every `poll` to check `canceller`
    fn wait(&self, canceller: &Canceller, poll: Duration) -> Result<Arc<PlugValue>> {
        let mut result = self.result.lock();
        loop {
            if let Some(published) = result.as_ref() {
                return published.clone();
            }
            canceller.check()?;
            self.ready.wait_for(&mut result, poll);
        }
    }
}

struct CacheState {
    entries: LruCache<CacheKey, Arc<PlugValue>>,
    in_flight: HashMap<CacheKey, Arc<InFlight>>,
}

enum Lookup {
    Hit(Arc<PlugValue>),
    Join(Arc<InFlight>),
    Compute(Arc<InFlight>),
}

/// Bounded cache of computed plug values with per-key coalescing
pub struct ValueCache {
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

impl ValueCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(non_zero(capacity)),
                in_flight: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Look up a stored value without computing
    pub fn get(&self, key: &CacheKey) -> Option<Arc<PlugValue>> {
        self.state.lock().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains(key)
    }

    /// Return the value for `key`, running `compute` if it is neither stored
    /// nor being computed by another thread.
    ///
    /// Errors are published to every waiter but never stored. A waiter whose
    /// own `canceller` fires stops waiting with `Cancelled`; the computing
    /// thread is unaffected.
    pub fn get_or_compute<F>(
        &self,
        key: CacheKey,
        canceller: &Canceller,
        poll: Duration,
        compute: F,
    ) -> Result<Arc<PlugValue>>
    where
        F: FnOnce() -> Result<PlugValue>,
    {
        let lookup = {
            let mut state = self.state.lock();
            if let Some(value) = state.entries.get(&key) {
                Lookup::Hit(value.clone())
            } else if let Some(flight) = state.in_flight.get(&key) {
                Lookup::Join(flight.clone())
            } else {
                let flight = Arc::new(InFlight::new());
                state.in_flight.insert(key, flight.clone());
                Lookup::Compute(flight)
            }
        };

        match lookup {
            Lookup::Hit(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("Cache hit for {:?} ({})", key.plug, key.hash);
                Ok(value)
            }
            Lookup::Join(flight) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                trace!("Joining in-flight computation of {:?} ({})", key.plug, key.hash);
                flight.wait(canceller, poll)
            }
            Lookup::Compute(flight) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {:?} ({})", key.plug, key.hash);
                let guard = FlightGuard {
                    cache: self,
                    key,
                    flight,
                    finished: false,
                };
                let result = compute().map(Arc::new);
                guard.finish(result)
            }
        }
    }

    /// Drop every stored entry. In-flight computations are unaffected.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Change the entry bound, evicting least-recently-used entries
    pub fn set_capacity(&self, capacity: usize) {
        self.state.lock().entries.resize(non_zero(capacity));
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            entries: state.entries.len(),
            capacity: state.entries.cap().get(),
        }
    }
}

/// Publishes the outcome of an in-flight computation.
///
/// If the computation unwinds, waiters receive an internal error instead of
/// blocking forever.
struct FlightGuard<'c> {
    cache: &'c ValueCache,
    key: CacheKey,
    flight: Arc<InFlight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(mut self, result: Result<Arc<PlugValue>>) -> Result<Arc<PlugValue>> {
        self.complete(result.clone());
        self.finished = true;
        result
    }

    fn complete(&self, result: Result<Arc<PlugValue>>) {
        {
            let mut state = self.cache.state.lock();
            state.in_flight.remove(&self.key);
            if let Ok(value) = &result {
                state.entries.put(self.key, value.clone());
            }
        }
        self.flight.publish(result);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.complete(Err(PlugGraphError::Internal(format!(
                "computation of {:?} panicked",
                self.key.plug
            ))));
        }
    }
}

/// Per-plug memo of computed output hashes.
///
/// Keyed by plug and context fingerprint; an entry is valid only while the
/// plug's dirty count matches the one recorded with it.
pub struct HashCache {
    entries: Mutex<LruCache<(PlugId, Fingerprint), (u64, Fingerprint)>>,
}

impl HashCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(non_zero(capacity))),
        }
    }

    pub fn get(&self, plug: PlugId, context: Fingerprint, dirty_count: u64) -> Option<Fingerprint> {
        let mut entries = self.entries.lock();
        match entries.get(&(plug, context)) {
            Some((count, hash)) if *count == dirty_count => Some(*hash),
            _ => None,
        }
    }

    pub fn insert(&self, plug: PlugId, context: Fingerprint, dirty_count: u64, hash: Fingerprint) {
        self.entries.lock().put((plug, context), (dirty_count, hash));
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
