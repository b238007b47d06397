//! Read-through snapshot cache with an explicit TTL and an injected clock.
//!
//! Successful fetches are stored per symbol and served until they are older
//! than the TTL. Failures are never stored, so the next request retries the
//! underlying source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use swingdesk_core::domain::{InstrumentSnapshot, UniverseMember};

use crate::config::CollectionConfig;
use crate::source::{SnapshotSource, SourceError};

/// Time source for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
}

struct Entry {
    stored_at: Instant,
    snapshot: InstrumentSnapshot,
}

pub struct ReadThroughCache<S: SnapshotSource, C: Clock = SystemClock> {
    source: S,
    clock: C,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl<S: SnapshotSource> ReadThroughCache<S, SystemClock> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self::with_clock(source, ttl, SystemClock)
    }
}

impl<S: SnapshotSource, C: Clock> ReadThroughCache<S, C> {
    pub fn with_clock(source: S, ttl: Duration, clock: C) -> Self {
        Self {
            source,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry older than the TTL.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.stored_at) < self.ttl);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh(&self, symbol: &str, now: Instant) -> Option<InstrumentSnapshot> {
        let entries = self.lock();
        let entry = entries.get(symbol)?;
        (now.duration_since(entry.stored_at) < self.ttl).then(|| entry.snapshot.clone())
    }
}

impl<S: SnapshotSource, C: Clock> SnapshotSource for ReadThroughCache<S, C> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn fetch(&self, member: &UniverseMember) -> Result<InstrumentSnapshot, SourceError> {
        let now = self.clock.now();
        if let Some(snapshot) = self.fresh(&member.symbol, now) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %member.symbol, "Snapshot cache hit");
            return Ok(snapshot);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Fetch outside the lock so concurrent misses on other symbols proceed.
        match self.source.fetch(member) {
            Ok(snapshot) => {
                self.lock().insert(
                    member.symbol.clone(),
                    Entry {
                        stored_at: now,
                        snapshot: snapshot.clone(),
                    },
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    symbol = %member.symbol,
                    source = self.source.name(),
                    error = %e,
                    "Cache miss and fetch failed"
                );
                Err(e)
            }
        }
    }

    fn is_available(&self) -> bool {
        self.source.is_available()
    }
}

/// The source a desk session collects through: `source` behind the
/// configured cache, or `source` itself when caching is off.
///
/// Build one per session and hand it to every run; a cache rebuilt per run
/// never serves a hit.
pub enum DeskSource<S: SnapshotSource> {
    Cached(ReadThroughCache<S>),
    Direct(S),
}

impl<S: SnapshotSource> DeskSource<S> {
    pub fn new(source: S, config: &CollectionConfig) -> Self {
        if config.use_cache {
            DeskSource::Cached(ReadThroughCache::new(
                source,
                Duration::from_secs(config.cache_ttl_secs),
            ))
        } else {
            DeskSource::Direct(source)
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        match self {
            DeskSource::Cached(cache) => Some(cache.stats()),
            DeskSource::Direct(_) => None,
        }
    }
}

impl<S: SnapshotSource> SnapshotSource for DeskSource<S> {
    fn name(&self) -> &str {
        match self {
            DeskSource::Cached(cache) => cache.name(),
            DeskSource::Direct(source) => source.name(),
        }
    }

    fn fetch(&self, member: &UniverseMember) -> Result<InstrumentSnapshot, SourceError> {
        match self {
            DeskSource::Cached(cache) => cache.fetch(member),
            DeskSource::Direct(source) => source.fetch(member),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            DeskSource::Cached(cache) => cache.is_available(),
            DeskSource::Direct(source) => source.is_available(),
        }
    }
}
