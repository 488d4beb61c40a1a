/*!
 * Content-addressed cache of composed outputs.
 *
 * Entries are keyed by a fingerprint over the media content, the caption
 * text and the canonical JSON of the resolved style and padding. Concurrent
 * requests for the same fingerprint share a single computation. Only
 * successful results are stored.
 */

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io::Read;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::cancellation::CancellationToken;
use crate::errors::CaptionError;
use crate::padding::PaddingSpec;
use crate::style::Style;

/// Deterministic hash identifying a composition's inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint over media hash, caption text, style and padding
    pub fn compute(media_hash: &str, text: &str, style: &Style, padding: Option<&PaddingSpec>) -> Self {
        let mut hasher = Sha256::new();
        for part in [
            media_hash.to_string(),
            text.to_string(),
            canonical_json(style),
            padding.map(canonical_json).unwrap_or_default(),
        ] {
            // length prefix keeps ("ab", "c") and ("a", "bc") apart
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an already computed hex digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

fn canonical_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Hash text content
pub fn hash_text(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Compute the SHA-256 of a file on the blocking pool
pub async fn hash_file(path: &Path) -> Result<String> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open file for hashing: {:?}", path))?;

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .context("File hashing task panicked")?
}

/// Stored artifact with its lifetime
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub fingerprint: Fingerprint,
    pub artifact: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
    pub entries: usize,
    pub in_flight: usize,
}

type SharedComputation<T> = Shared<BoxFuture<'static, Result<T, CaptionError>>>;

/// Computation running in its own task, shared by every waiter
struct Flight<T: Clone> {
    id: u64,
    future: SharedComputation<T>,
    /// Cancelled once every waiter has gone away
    token: CancellationToken,
    waiters: Arc<AtomicUsize>,
}

impl<T: Clone> Flight<T> {
    /// Register one more waiter unless the last one already left
    fn join(&self) -> Option<WaiterGuard> {
        self.waiters
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n > 0).then_some(n + 1))
            .ok()?;
        Some(WaiterGuard {
            waiters: Arc::clone(&self.waiters),
            token: self.token.clone(),
        })
    }
}

/// Counts a waiter for as long as it is alive
struct WaiterGuard {
    waiters: Arc<AtomicUsize>,
    token: CancellationToken,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if self.waiters.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.token.cancel();
        }
    }
}

/// Memoizes composition results by fingerprint
pub struct CompositionCache<T: Clone + Send + Sync + 'static> {
    entries: Arc<RwLock<HashMap<Fingerprint, CacheEntry<T>>>>,
    in_flight: Arc<Mutex<HashMap<Fingerprint, Flight<T>>>>,
    next_flight: Arc<Mutex<u64>>,
    hits: Arc<RwLock<usize>>,
    misses: Arc<RwLock<usize>>,
    ttl: chrono::Duration,
    enabled: bool,
}

impl<T: Clone + Send + Sync + 'static> Clone for CompositionCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            in_flight: Arc::clone(&self.in_flight),
            next_flight: Arc::clone(&self.next_flight),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
            ttl: self.ttl,
            enabled: self.enabled,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> CompositionCache<T> {
    pub fn new(ttl: Duration, enabled: bool) -> Self {
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_flight: Arc::new(Mutex::new(0)),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
            ttl: chrono::Duration::milliseconds(millis),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fresh artifact for a fingerprint, if any
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<T> {
        let entries = self.entries.read();
        entries
            .get(fingerprint)
            .filter(|e| !e.is_expired(Utc::now()))
            .map(|e| e.artifact.clone())
    }

    /// Return the cached artifact or run `compute` once for all concurrent callers
    ///
    /// The computation runs in a spawned task under a token of its own, which
    /// is cancelled only when every waiter has cancelled or been dropped.
    /// Each caller races `token` against the shared result, so cancelling one
    /// caller never fails another. A failed computation is reported to every
    /// waiter and leaves nothing cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        token: &CancellationToken,
        compute: F,
    ) -> Result<T, CaptionError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, CaptionError>> + Send + 'static,
    {
        if !self.enabled {
            return compute(token.clone()).await;
        }

        if let Some(artifact) = self.get(fingerprint) {
            *self.hits.write() += 1;
            debug!("Cache hit for {}", fingerprint);
            return Ok(artifact);
        }

        let (future, _guard) = {
            let mut in_flight = self.in_flight.lock();
            // a computation may have finished between the lookup and the lock
            if let Some(artifact) = self.get(fingerprint) {
                *self.hits.write() += 1;
                return Ok(artifact);
            }
            let joined = in_flight
                .get(fingerprint)
                .and_then(|flight| flight.join().map(|guard| (flight.future.clone(), guard)));
            match joined {
                Some(joined) => {
                    *self.hits.write() += 1;
                    debug!("Joining in-flight computation for {}", fingerprint);
                    joined
                }
                None => {
                    *self.misses.write() += 1;
                    debug!("Cache miss for {}, computing", fingerprint);
                    let flight = self.launch(fingerprint.clone(), compute);
                    let joined = (flight.future.clone(), WaiterGuard {
                        waiters: Arc::clone(&flight.waiters),
                        token: flight.token.clone(),
                    });
                    in_flight.insert(fingerprint.clone(), flight);
                    joined
                }
            }
        };

        tokio::select! {
            result = future => result,
            err = token.cancelled() => {
                debug!("Caller stopped waiting for {}", fingerprint);
                Err(err)
            }
        }
    }

    /// Spawn the computation; the task stores a success and retires its flight
    fn launch<F, Fut>(&self, fingerprint: Fingerprint, compute: F) -> Flight<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, CaptionError>> + Send + 'static,
    {
        let id = {
            let mut next = self.next_flight.lock();
            *next += 1;
            *next
        };
        let token = CancellationToken::new();
        let work = AssertUnwindSafe(compute(token.clone())).catch_unwind();

        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let result = work
                .await
                .unwrap_or_else(|_| Err(CaptionError::File("composition task panicked".to_string())));

            let mut in_flight = cache.in_flight.lock();
            if in_flight.get(&fingerprint).is_some_and(|f| f.id == id) {
                in_flight.remove(&fingerprint);
            }
            if let Ok(artifact) = &result {
                cache.insert(fingerprint, artifact.clone());
            }
            result
        });

        let future = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(CaptionError::Cancelled(format!("composition task aborted: {}", e))))
        }
        .boxed()
        .shared();

        Flight {
            id,
            future,
            token,
            waiters: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Store an artifact, replacing any previous entry
    pub fn insert(&self, fingerprint: Fingerprint, artifact: T) {
        let now = Utc::now();
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            artifact,
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.entries.write().insert(fingerprint, entry);
    }

    /// Remove expired entries, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Swept {} expired cache entries", removed);
        }
        removed
    }

    /// Periodically sweep expired entries until the handle is aborted
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep_expired();
            }
        })
    }

    /// Remove one entry, or every entry when `fingerprint` is `None`
    pub fn purge(&self, fingerprint: Option<&Fingerprint>) -> usize {
        let mut entries = self.entries.write();
        let removed = match fingerprint {
            Some(fp) => usize::from(entries.remove(fp).is_some()),
            None => {
                let n = entries.len();
                entries.clear();
                n
            }
        };
        info!("Purged {} cache entries", removed);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            hit_rate,
            entries: self.len(),
            in_flight: self.in_flight.lock().len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
