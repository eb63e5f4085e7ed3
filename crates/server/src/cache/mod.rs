//! Time-bounded idempotency cache.
//!
//! Maps a client-supplied `Idempotency-Key` to the response computed for
//! it, so a retried request replays the first answer instead of asking the
//! provider again.
//!
//! # Expiry
//!
//! An entry is live while `now < expires_at`. `get` reads the clock exactly
//! once, under the same lock acquisition that reads the entry, so the
//! liveness decision and the eviction agree. Expired entries are removed on
//! access and by [`IdempotencyCache::sweep`].
//!
//! # Single flight
//!
//! [`IdempotencyCache::lock_key`] hands out an owned async guard per key.
//! Concurrent requests with the same key queue on it; whoever goes second
//! re-checks the cache and replays the first result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};

#[cfg(test)]
mod tests;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15);

#[derive(Debug)]
struct Entry<V> {
	value: V,
	expires_at: Instant,
}

/// Thread-safe, TTL-bounded key/value cache with per-key single flight.
pub struct IdempotencyCache<V> {
	entries: Mutex<HashMap<String, Entry<V>>>,
	in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
	ttl: Duration,
	clock: Arc<dyn Clock>,
}

impl<V: Clone> IdempotencyCache<V> {
	/// Creates a cache on the system clock.
	pub fn new(ttl: Duration) -> Self {
		Self::with_clock(ttl, Arc::new(SystemClock))
	}

	/// Creates a cache reading time from `clock`.
	pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
			in_flight: Mutex::new(HashMap::new()),
			ttl,
			clock,
		}
	}

	/// Lifetime applied by [`set`](Self::set).
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Returns the live value for `key`, evicting it if it has expired.
	pub fn get(&self, key: &str) -> Option<V> {
		let mut entries = self.entries.lock();
		let now = self.clock.now();
		match entries.get(key) {
			Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
			Some(_) => {
				entries.remove(key);
				trace!(key, "cache.expired");
				None
			}
			None => None,
		}
	}

	/// Stores `value` under `key` for the default TTL.
	pub fn set(&self, key: impl Into<String>, value: V) {
		self.set_with_ttl(key, value, self.ttl);
	}

	/// Stores `value` under `key` for `ttl`, replacing any previous entry.
	pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
		let mut entries = self.entries.lock();
		let expires_at = self.clock.now() + ttl;
		entries.insert(key.into(), Entry { value, expires_at });
	}

	/// Waits for exclusive use of `key`.
	///
	/// The guard must be held across the cache re-check, the computation and
	/// the [`set`](Self::set) that stores its result.
	pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
		let slot = {
			let mut in_flight = self.in_flight.lock();
			Arc::clone(in_flight.entry(key.to_owned()).or_default())
		};
		slot.lock_owned().await
	}

	/// Removes every expired entry and idle key lock. Returns the number of
	/// entries removed.
	pub fn sweep(&self) -> usize {
		let removed = {
			let mut entries = self.entries.lock();
			let now = self.clock.now();
			let before = entries.len();
			entries.retain(|_, entry| now < entry.expires_at);
			before - entries.len()
		};
		self.in_flight
			.lock()
			.retain(|_, slot| Arc::strong_count(slot) > 1);
		removed
	}

	/// Drops every entry.
	pub fn clear(&self) {
		self.entries.lock().clear();
	}

	/// Number of stored entries, expired ones included until swept.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns true if nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

impl<V> std::fmt::Debug for IdempotencyCache<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IdempotencyCache")
			.field("entries", &self.entries.lock().len())
			.field("ttl", &self.ttl)
			.finish_non_exhaustive()
	}
}

/// Sweeps `cache` every `interval` until `shutdown` is cancelled.
pub fn spawn_sweeper<V>(
	cache: Arc<IdempotencyCache<V>>,
	interval: Duration,
	shutdown: CancellationToken,
) -> JoinHandle<()>
where
	V: Clone + Send + 'static,
{
	tokio::spawn(async move {
		let mut ticks = tokio::time::interval(interval);
		ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		ticks.tick().await;
		loop {
			tokio::select! {
				_ = shutdown.cancelled() => break,
				_ = ticks.tick() => {
					let removed = cache.sweep();
					if removed > 0 {
						debug!(removed, remaining = cache.len(), "cache.sweep");
					}
				}
			}
		}
		debug!("cache sweeper stopped");
	})
}
