//! Fragment cache with single-flight computation.
//!
//! [`FragmentCache::get_or_compute`] runs at most one computation per key at
//! a time. Callers that ask for a key while it is being computed block until
//! the first caller finishes and then see the same fragment or the same
//! error. Keys never block each other: the shared state lock is held only
//! for map lookups, never across a computation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rivet_stack::{DeviceConstraints, StackKind, StackOptions, TranspiledFragment};

use crate::error::{TranspileError, TranspileResult};

/// What a cached fragment was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Deep structural hash of the source circuit.
    pub circuit_hash: String,
    /// [`DeviceConstraints::identity`] of the target.
    pub device: String,
    /// Stack that compiled it.
    pub stack: StackKind,
    /// [`StackOptions::cache_fingerprint`] of the call.
    pub options: String,
}

impl CacheKey {
    /// Key for compiling a circuit with hash `circuit_hash`.
    pub fn new(
        circuit_hash: impl Into<String>,
        device: &DeviceConstraints,
        stack: StackKind,
        options: &StackOptions,
    ) -> TranspileResult<Self> {
        Ok(Self {
            circuit_hash: circuit_hash.into(),
            device: device.identity(),
            stack,
            options: options.cache_fingerprint()?,
        })
    }

    fn short_hash(&self) -> &str {
        self.circuit_hash.get(..12).unwrap_or(&self.circuit_hash)
    }
}

/// Counters, as of one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a stored fragment.
    pub hits: u64,
    /// Lookups that started a computation.
    pub misses: u64,
    /// Lookups that waited for another caller's computation.
    pub waits: u64,
    /// Entries dropped by the capacity bound.
    pub evictions: u64,
    /// Stored entries.
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    waits: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone)]
struct Entry {
    fragment: Arc<TranspiledFragment>,
    created_at: DateTime<Utc>,
    last_used: u64,
}

type FlightResult = TranspileResult<Arc<TranspiledFragment>>;

/// One in-progress computation.
#[derive(Debug, Default)]
struct Flight {
    result: Mutex<Option<FlightResult>>,
    done: Condvar,
}

impl Flight {
    fn wait(&self) -> FlightResult {
        let mut result = self.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut result);
        }
    }

    fn complete(&self, result: FlightResult) {
        *self.result.lock() = Some(result);
        self.done.notify_all();
    }
}

#[derive(Debug, Default)]
struct State {
    ready: FxHashMap<CacheKey, Entry>,
    pending: FxHashMap<CacheKey, Arc<Flight>>,
    clock: u64,
}

impl State {
    fn touch(&mut self, key: &CacheKey) -> Option<Arc<TranspiledFragment>> {
        self.clock += 1;
        let clock = self.clock;
        self.ready.get_mut(key).map(|entry| {
            entry.last_used = clock;
            Arc::clone(&entry.fragment)
        })
    }
}

/// Memoised stack results, shared by reference between stitchers and
/// threads.
///
/// Unbounded by default. With a capacity, the least recently used entry is
/// evicted once the bound is exceeded; computations in progress are never
/// evicted.
#[derive(Debug, Default)]
pub struct FragmentCache {
    state: Mutex<State>,
    capacity: Option<usize>,
    counters: Counters,
}

impl FragmentCache {
    /// An unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` fragments.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// A cache with an optional bound.
    pub fn bounded(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// The capacity bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of stored fragments.
    pub fn len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored fragment for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<TranspiledFragment>> {
        self.state.lock().touch(key)
    }

    /// Store a fragment, replacing any previous one.
    pub fn insert(&self, key: CacheKey, fragment: TranspiledFragment) {
        self.insert_at(key, Arc::new(fragment), Utc::now());
    }

    pub(crate) fn insert_at(
        &self,
        key: CacheKey,
        fragment: Arc<TranspiledFragment>,
        created_at: DateTime<Utc>,
    ) {
        let mut state = self.state.lock();
        self.store(&mut state, key, fragment, created_at);
    }

    fn store(
        &self,
        state: &mut State,
        key: CacheKey,
        fragment: Arc<TranspiledFragment>,
        created_at: DateTime<Utc>,
    ) {
        if self.capacity == Some(0) {
            return;
        }
        state.clock += 1;
        let entry = Entry {
            fragment,
            created_at,
            last_used: state.clock,
        };
        state.ready.insert(key, entry);
        let Some(capacity) = self.capacity else {
            return;
        };
        while state.ready.len() > capacity {
            let oldest = state
                .ready
                .iter()
                .min_by(|a, b| (a.1.last_used, a.0).cmp(&(b.1.last_used, b.0)))
                .map(|(k, _)| k.clone());
            let Some(oldest) = oldest else {
                break;
            };
            state.ready.remove(&oldest);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Evicted {}", oldest.short_hash());
        }
    }

    /// Stored entries with their creation time, ordered by key.
    pub fn entries(&self) -> Vec<(CacheKey, Arc<TranspiledFragment>, DateTime<Utc>)> {
        let state = self.state.lock();
        let mut entries: Vec<_> = state
            .ready
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(&e.fragment), e.created_at))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Drop every stored fragment. Computations in progress still finish
    /// and store their result.
    pub fn clear(&self) {
        self.state.lock().ready.clear();
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            waits: self.counters.waits.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// The fragment for `key`, computing it with `compute` if absent.
    ///
    /// Concurrent callers with the same key share one call to `compute`.
    /// A failed computation is not stored; its error is returned to every
    /// caller that waited on it. If `compute` panics, waiters receive
    /// [`TranspileError::ComputationAbandoned`].
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> FlightResult
    where
        F: FnOnce() -> TranspileResult<TranspiledFragment>,
    {
        let flight = {
            let mut state = self.state.lock();
            if let Some(fragment) = state.touch(key) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit: {} on {}", key.short_hash(), key.stack);
                return Ok(fragment);
            }
            if let Some(flight) = state.pending.get(key) {
                let flight = Arc::clone(flight);
                drop(state);
                self.counters.waits.fetch_add(1, Ordering::Relaxed);
                debug!("Waiting for in-flight {}", key.short_hash());
                return flight.wait();
            }
            let flight = Arc::new(Flight::default());
            state.pending.insert(key.clone(), Arc::clone(&flight));
            flight
        };
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss: {} on {}", key.short_hash(), key.stack);

        let mut leader = Leader {
            cache: self,
            key,
            flight: &flight,
            finished: false,
        };
        let result = compute().map(Arc::new);
        leader.finish(result.clone());
        result
    }
}

/// Publishes the outcome of a computation, or abandonment if dropped
/// before [`Leader::finish`].
struct Leader<'a> {
    cache: &'a FragmentCache,
    key: &'a CacheKey,
    flight: &'a Flight,
    finished: bool,
}

impl Leader<'_> {
    fn finish(&mut self, result: FlightResult) {
        self.finished = true;
        {
            let mut state = self.cache.state.lock();
            state.pending.remove(self.key);
            if let Ok(fragment) = &result {
                self.cache
                    .store(&mut state, self.key.clone(), Arc::clone(fragment), Utc::now());
            }
        }
        self.flight.complete(result);
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cache.state.lock().pending.remove(self.key);
            self.flight.complete(Err(TranspileError::ComputationAbandoned));
        }
    }
}
