//! Deduplicating two-tier fetch cache.
//!
//! ```text
//!  get(locator, variant)
//!        │
//!        ▼
//!  key_codec::encode ──▶ memory tier ──hit──▶ bytes
//!        │ miss
//!        ▼
//!  in-flight map ──existing──▶ join shared load ──▶ bytes | error
//!        │ none
//!        ▼
//!  spawn load: disk tier ──hit──▶ promote to memory
//!              │ miss
//!              ▼
//!          transport.fetch_bytes ──▶ disk (write-once) + memory
//! ```
//!
//! # Concurrency
//!
//! Each key has at most one live load. A load is a spawned tokio task
//! wrapped in [`futures::future::Shared`]; every caller that asks for the
//! key before it settles awaits the same shared future and receives the
//! same bytes (`Arc<[u8]>`, no copies) or a clone of the same error.
//! The task runs to completion even if every waiter goes away.
//!
//! The in-flight map lock only guards map operations; no lock is held
//! across disk or network I/O. A load removes its own map entry after
//! filling the memory tier, so a later caller either hits memory or starts
//! a fresh load. Failures fill neither tier, so the next `get` retries.

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::disk_store::DiskStore;
use crate::error::{Error, Result};
use crate::key_codec::{self, CacheKey};
use crate::models::{ResourceLocator, Variant};
use crate::transport::Transport;

/// Immutable, cheaply cloneable fetched bytes.
pub type ImageBytes = Arc<[u8]>;

type LoadFuture = Shared<BoxFuture<'static, Result<ImageBytes>>>;

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub network_fetches: u64,
    /// Callers that attached to a load started by someone else.
    pub joined: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    network_fetches: AtomicU64,
    joined: AtomicU64,
    failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct Inner {
    transport: Arc<dyn Transport>,
    disk: Option<DiskStore>,
    memory: RwLock<HashMap<CacheKey, ImageBytes>>,
    in_flight: Mutex<HashMap<CacheKey, LoadFuture>>,
    counters: Counters,
}

/// Handle to one process-wide cache. Clones share the same tiers.
#[derive(Clone)]
pub struct FetchCache {
    inner: Arc<Inner>,
}

impl FetchCache {
    /// Create a cache over `transport`. `disk` of `None` disables the cold tier.
    pub fn new(transport: Arc<dyn Transport>, disk: Option<DiskStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                disk,
                memory: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn from_config(config: &CacheConfig, transport: Arc<dyn Transport>) -> Self {
        let disk = config
            .disk
            .then(|| DiskStore::open(&config.resolved_dir()));
        Self::new(transport, disk)
    }

    pub fn disk(&self) -> Option<&DiskStore> {
        self.inner.disk.as_ref()
    }

    /// Bytes for `locator` in the given variant.
    ///
    /// Concurrent calls for the same key share one load. Errors are not
    /// cached; calling again after a failure starts a new load.
    pub async fn get(&self, locator: &ResourceLocator, variant: Variant) -> Result<ImageBytes> {
        let key = key_codec::encode(locator, variant)?;

        if let Some(bytes) = self.inner.memory_get(&key) {
            bump(&self.inner.counters.memory_hits);
            return Ok(bytes);
        }

        let load = {
            let mut in_flight = self.inner.in_flight.lock().unwrap();
            match in_flight.get(&key) {
                Some(load) => {
                    bump(&self.inner.counters.joined);
                    load.clone()
                }
                None => {
                    // The previous load may have settled after the memory probe.
                    if let Some(bytes) = self.inner.memory_get(&key) {
                        bump(&self.inner.counters.memory_hits);
                        return Ok(bytes);
                    }
                    let load = self.spawn_load(key.clone(), locator.clone());
                    in_flight.insert(key, load.clone());
                    load
                }
            }
        };

        load.await
    }

    /// Fetch many locators concurrently, best effort.
    ///
    /// Failed items are logged and left out; the output keeps input order
    /// for the items that succeeded.
    pub async fn get_many(&self, locators: &[ResourceLocator], variant: Variant) -> Vec<ImageBytes> {
        let results = join_all(locators.iter().map(|l| self.get(l, variant))).await;

        results
            .into_iter()
            .zip(locators)
            .filter_map(|(result, locator)| match result {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(%locator, error = %e, "dropping failed item from batch");
                    None
                }
            })
            .collect()
    }

    /// True when the memory tier already holds the entry.
    pub fn contains(&self, locator: &ResourceLocator, variant: Variant) -> bool {
        key_codec::encode(locator, variant)
            .map(|key| self.inner.memory_get(&key).is_some())
            .unwrap_or(false)
    }

    pub fn memory_len(&self) -> usize {
        self.inner.memory.read().unwrap().len()
    }

    /// Number of loads currently outstanding.
    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.lock().unwrap().len()
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            memory_hits: c.memory_hits.load(Ordering::Relaxed),
            disk_hits: c.disk_hits.load(Ordering::Relaxed),
            network_fetches: c.network_fetches.load(Ordering::Relaxed),
            joined: c.joined.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }

    /// Must be called with the in-flight lock held, so the spawned task
    /// cannot remove its entry before it has been inserted.
    fn spawn_load(&self, key: CacheKey, locator: ResourceLocator) -> LoadFuture {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: inner.clone(),
                key: key.clone(),
            };
            let result = inner.load(&key, &locator).await;
            if let Err(e) = &result {
                bump(&inner.counters.failures);
                warn!(%locator, error = %e, "fetch failed");
            }
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(Error::TransportFailure(format!("fetch task failed: {}", e))))
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    fn memory_get(&self, key: &CacheKey) -> Option<ImageBytes> {
        self.memory.read().unwrap().get(key).cloned()
    }

    /// Insert into the memory tier, keeping an existing entry if present.
    fn remember(&self, key: &CacheKey, bytes: Vec<u8>) -> ImageBytes {
        let mut memory = self.memory.write().unwrap();
        memory
            .entry(key.clone())
            .or_insert_with(|| Arc::from(bytes))
            .clone()
    }

    async fn load(&self, key: &CacheKey, locator: &ResourceLocator) -> Result<ImageBytes> {
        if let Some(disk) = &self.disk {
            if let Some(bytes) = disk.get(key.as_str()).await? {
                bump(&self.counters.disk_hits);
                debug!(%key, len = bytes.len(), "disk hit, promoting to memory");
                return Ok(self.remember(key, bytes));
            }
        }

        bump(&self.counters.network_fetches);
        let bytes = self.transport.fetch_bytes(locator).await?;
        if bytes.is_empty() {
            return Err(Error::NoData(locator.to_string()));
        }
        debug!(%key, len = bytes.len(), "fetched from network");

        if let Some(disk) = &self.disk {
            // The bytes are still served from memory if persisting fails.
            if let Err(e) = disk.put(key.as_str(), &bytes).await {
                warn!(%key, error = %e, "failed to persist cache entry");
            }
        }

        Ok(self.remember(key, bytes))
    }
}

/// Removes the in-flight entry when the load task ends, including by panic.
struct InFlightGuard {
    inner: Arc<Inner>,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.inner.in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}
